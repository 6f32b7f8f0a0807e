//! Scripted Playthrough demo: records a run, exports it as RON, re-runs it
//! and compares the result against random play.
//!
//! Run with: cargo run --example scripted_playthrough

use ron::ser::PrettyConfig;
use scenario_engine::core::loader::load_from_ron;
use scenario_engine::core::playthrough::Playthrough;
use scenario_engine::core::simulate::Simulator;
use std::path::Path;
use std::sync::Arc;

fn main() {
    let def = Arc::new(
        load_from_ron(Path::new("game_data/launch_week.ron")).expect("Failed to load launch_week"),
    );

    let playthrough = Playthrough::new("launch_week")
        .choose("code_freeze", "ship_feature")
        .choose("outage", "demo_anyway");

    let exported = ron::ser::to_string_pretty(&playthrough, PrettyConfig::default())
        .expect("playthrough serializes");
    println!("--- Recorded playthrough ---\n{}\n", exported);

    let reloaded = Playthrough::parse_ron(&exported).expect("exported RON parses");
    let first = playthrough.run(Arc::clone(&def)).expect("playthrough is valid");
    let second = reloaded.run(Arc::clone(&def)).expect("playthrough is valid");
    assert_eq!(first, second, "same choices always produce the same state");

    let outcome = first.outcome().expect("playthrough finishes the game");
    println!("Ending: {} ({})", outcome.ending.title, outcome.ending.id);
    println!("Meters: {}", outcome.meters);

    // Without the feature shipped, the demo option stays locked.
    let locked = Playthrough::new("launch_week")
        .choose("code_freeze", "hold_line")
        .choose("outage", "demo_anyway")
        .run(Arc::clone(&def));
    if let Err(e) = locked {
        println!("\nLocked choice rejected: {}", e);
    }

    let report = Simulator::new(def).seed(7).runs(1000).run().expect("simulation runs");
    println!("\n--- 1000 random runs ---");
    for (ending, count) in &report.ending_counts {
        println!("  {:<12} {:>5}", ending, count);
    }
}
