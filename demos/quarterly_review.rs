//! Quarterly Review demo: plays the bundled management scenario end to end.
//!
//! Hire senior → book the offsite → let the senior hire fix the incident →
//! honest timeline → cabin party → present the wins.
//!
//! Run with: cargo run --example quarterly_review

use scenario_engine::core::engine::ScenarioEngine;
use scenario_engine::core::session::{Completion, GameSession, Stage};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let engine = ScenarioEngine::builder()
        .games_dir("game_data")
        .reward_dispatcher(|c: &Completion| {
            println!(
                ">> Reward for '{}': {} XP, {} currency",
                c.ending_id, c.reward.xp, c.reward.currency
            );
        })
        .build()
        .expect("Failed to load bundled games");

    let mut session = engine
        .create_session("quarterly_review")
        .expect("quarterly_review is bundled");

    let script = [
        ("hiring", "hire_senior"),
        ("offsite", "book_retreat"),
        ("incident", "senior_fix"),
        ("client", "honest"),
        ("bonuses", "team_party"),
        ("board", "present_wins"),
    ];

    for (decision, option) in script {
        narrate_until_decision(&engine, &mut session);
        show_options(&session);
        println!("> {}", option);
        session
            .choose_option(decision, option)
            .expect("scripted choice is valid");
    }

    while !session.is_complete() {
        narrate(&session);
        engine.advance(&mut session).expect("narration continues");
    }

    let outcome = session.outcome().expect("session is complete");
    println!("\n=== {} ===", outcome.ending.title);
    println!("{}", outcome.ending.description);
    println!("Final meters: {}", outcome.meters);

    // Start over: meters reset, unlocks cleared, gated options locked again.
    let session = session.replay();
    println!("\nAfter replay: {} (unlocks: {})", session.meters(), session.unlocks().len());
}

fn narrate_until_decision(engine: &ScenarioEngine, session: &mut GameSession) {
    while !matches!(session.stage(), Stage::Decision { .. }) {
        narrate(session);
        engine.advance(session).expect("narration continues");
    }
}

fn narrate(session: &GameSession) {
    if let Stage::Opening { phase } = session.stage() {
        println!("\n--- Phase {}: {} ---", phase, session.current_phase().title);
    }
    if let Some(text) = session.narration().filter(|t| !t.is_empty()) {
        println!("{}", text);
    }
}

fn show_options(session: &GameSession) {
    if let Some(decision) = session.current_decision() {
        println!("\n[{}] {}", decision.category, decision.title);
    }
    if let Some(lead_in) = session.narration() {
        println!("{}", lead_in);
    }
    for option in session.available_options() {
        let lock = if option.available { "" } else { " (locked)" };
        println!("  - {}{}", option.choice.label, lock);
    }
}
