//! Game Linter: validates game definitions and checks ending reachability.
//!
//! Usage: game_linter <game.ron | game_dir> [--simulate <runs>] [--seed <n>]

use scenario_engine::core::loader::parse_ron_unchecked;
use scenario_engine::core::simulate::Simulator;
use scenario_engine::core::validate::lint;
use std::path::{Path, PathBuf};
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
        println!("Usage: game_linter <game.ron | game_dir> [--simulate <runs>] [--seed <n>]");
        process::exit(0);
    }

    let options = match parse_options(&args[1..]) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    let target = &options.target;
    let simulate_runs = options.simulate_runs;
    let seed = options.seed;

    let path = Path::new(target);
    let files = if path.is_file() {
        vec![path.to_path_buf()]
    } else if path.is_dir() {
        let mut files = Vec::new();
        collect_ron_files(path, &mut files);
        files.sort();
        files
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target);
        process::exit(1);
    };

    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        println!("\n=== {} ===", file.display());

        let contents = match std::fs::read_to_string(file) {
            Ok(c) => c,
            Err(e) => {
                println!("ERROR: {}", e);
                total_errors += 1;
                continue;
            }
        };
        let def = match parse_ron_unchecked(&contents) {
            Ok(def) => def,
            Err(e) => {
                println!("ERROR: {}", e);
                total_errors += 1;
                continue;
            }
        };

        println!(
            "Game '{}': {} phases, {} decisions, {} endings",
            def.id,
            def.phases.len(),
            def.decision_count(),
            def.endings.len()
        );

        let report = lint(&def);
        let mut warnings = report.warnings;

        // Simulating an invalid definition would only repeat its errors.
        if let (Some(runs), true) = (simulate_runs, report.errors.is_empty()) {
            match Simulator::new(Arc::new(def)).seed(seed).runs(runs).run() {
                Ok(sim) => {
                    for (ending, count) in &sim.ending_counts {
                        println!("  {:<24} {:>6}", ending, count);
                    }
                    warnings.extend(sim.warnings());
                }
                Err(e) => println!("ERROR: simulation failed: {}", e),
            }
        }

        if report.errors.is_empty() && warnings.is_empty() {
            println!("All checks passed!");
        }
        for warning in &warnings {
            println!("WARNING: {}", warning);
        }
        for error in &report.errors {
            println!("ERROR: {}", error);
        }

        total_errors += report.errors.len();
        total_warnings += warnings.len();
    }

    println!(
        "\nSummary: {} files, {} errors, {} warnings",
        files.len(),
        total_errors,
        total_warnings
    );

    if total_errors == 0 {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

#[derive(Debug, PartialEq)]
struct Options {
    target: String,
    simulate_runs: Option<usize>,
    seed: u64,
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut options = Options {
        target: args[0].clone(),
        simulate_runs: None,
        seed: 42,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--simulate" if i + 1 < args.len() => {
                i += 1;
                let runs = args[i]
                    .parse()
                    .map_err(|_| format!("Error: --simulate expects a run count, got '{}'", args[i]))?;
                options.simulate_runs = Some(runs);
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                options.seed = args[i]
                    .parse()
                    .map_err(|_| format!("Error: --seed expects a number, got '{}'", args[i]))?;
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }
    Ok(options)
}

fn collect_ron_files(dir: &Path, files: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_ron_files(&path, files);
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                files.push(path);
            }
        }
    }
}
