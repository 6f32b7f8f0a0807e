//! Playthrough Sim: plays a game many times with random choices and reports
//! the ending distribution and final meter ranges.
//!
//! Usage: playthrough_sim <game.ron> [--runs <n>] [--seed <n>] [--replay <playthrough.ron>]

use scenario_engine::core::loader::load_from_ron;
use scenario_engine::core::playthrough::Playthrough;
use scenario_engine::core::simulate::Simulator;
use scenario_engine::schema::game::GameDefinition;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        process::exit(0);
    }

    let game_path = &args[1];
    let mut runs = 1000usize;
    let mut seed = 42u64;
    let mut replay_path = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--runs" if i + 1 < args.len() => {
                i += 1;
                runs = args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Error: --runs must be a positive number");
                    process::exit(1);
                });
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Error: --seed must be a number");
                    process::exit(1);
                });
            }
            "--replay" if i + 1 < args.len() => {
                i += 1;
                replay_path = Some(args[i].clone());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let def = match load_from_ron(Path::new(game_path)) {
        Ok(def) => Arc::new(def),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    if let Some(path) = replay_path {
        replay(&path, def);
        return;
    }

    let report = match Simulator::new(Arc::clone(&def)).seed(seed).runs(runs).run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    println!("Game: {} ({} runs, seed {})", def.id, report.runs, seed);
    println!("\nEndings:");
    for ending in &def.endings {
        let count = report.ending_counts.get(&ending.id).copied().unwrap_or(0);
        let share = if report.runs == 0 {
            0.0
        } else {
            count as f64 * 100.0 / report.runs as f64
        };
        println!("  {:<24} {:>6}  {:>5.1}%", ending.id, count, share);
    }

    println!("\nFinal meter ranges:");
    for (channel, min) in &report.meter_min {
        let max = report.meter_max.get(channel).copied().unwrap_or(*min);
        println!("  {:<24} {:>3} ..= {:<3}", channel, min, max);
    }

    let unreached = report.unreached_endings();
    if !unreached.is_empty() {
        println!("\nUnreached endings: {}", unreached.join(", "));
    }
}

fn replay(path: &str, def: Arc<GameDefinition>) {
    let playthrough = match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|contents| Playthrough::parse_ron(&contents).map_err(|e| e.to_string()))
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    match playthrough.run(def) {
        Ok(session) => match session.outcome() {
            Some(outcome) => {
                println!("Ending: {} ({})", outcome.ending.title, outcome.ending.id);
                println!("Meters: {}", outcome.meters);
                println!("Unlocks: {}", outcome.unlocks.sorted().join(", "));
            }
            None => {
                let (answered, total) = session.progress();
                println!("Playthrough stops after {}/{} decisions", answered, total);
                println!("Meters: {}", session.meters());
            }
        },
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Usage: playthrough_sim <game.ron> [--runs <n>] [--seed <n>] [--replay <playthrough.ron>]");
}
