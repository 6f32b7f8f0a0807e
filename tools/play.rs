//! Play: interactive terminal shell for a game definition.
//!
//! Usage: play <game.ron>
//!
//! Commands:
//!   <n>        choose option n of the current decision
//!   continue   advance past narration (also: empty line)
//!   replay     start the game over
//!   state      print meters and unlocks
//!   help       list commands
//!   quit       exit

use scenario_engine::core::engine::ScenarioEngine;
use scenario_engine::core::session::{Completion, GameSession, Stage};
use std::io::{self, BufRead, Write};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: play <game.ron>");
        process::exit(0);
    }

    let engine = match ScenarioEngine::builder()
        .game_file(&args[1])
        .reward_dispatcher(|c: &Completion| {
            println!(
                "\n*** Reward: {} XP, {} currency ***",
                c.reward.xp, c.reward.currency
            );
        })
        .build()
    {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    let game_id = match engine.games().first() {
        Some(id) => id.to_string(),
        None => {
            eprintln!("ERROR: no game loaded");
            process::exit(1);
        }
    };
    let mut session = match engine.create_session(&game_id) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    println!("=== {} ===", session.definition().title);
    println!("Type 'help' for commands.\n");
    render(&session);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("play> ");
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let cmd = line.trim().to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "state" | "s" => print_state(&session),
            "replay" | "r" => {
                session = session.replay();
                println!("\n--- Starting over ---\n");
                render(&session);
            }
            "" | "continue" | "c" => {
                if session.is_complete() {
                    println!("The game is over. Type 'replay' to start again.");
                    continue;
                }
                match engine.advance(&mut session) {
                    Ok(_) => render(&session),
                    Err(e) => println!("{}", e),
                }
            }
            other => match other.parse::<usize>() {
                Ok(n) => choose(&mut session, n),
                Err(_) => println!("Unknown command: {} (type 'help')", other),
            },
        }
    }
}

fn choose(session: &mut GameSession, n: usize) {
    let pick = {
        let Some(decision) = session.current_decision() else {
            println!("There is no decision to make right now.");
            return;
        };
        if !matches!(session.stage(), Stage::Decision { .. }) {
            println!("There is no decision to make right now.");
            return;
        }
        match n.checked_sub(1).and_then(|i| decision.options.get(i)) {
            Some(choice) => (decision.id.clone(), choice.id.clone()),
            None => {
                println!("Pick a number between 1 and {}.", decision.options.len());
                return;
            }
        }
    };

    match session.choose_option(&pick.0, &pick.1) {
        Ok(()) => render(session),
        Err(e) => println!("{}", e),
    }
}

fn render(session: &GameSession) {
    let view = session.view();

    match view.stage {
        Stage::Opening { phase } => {
            println!("--- Phase {}: {} ---", phase, view.phase_title.unwrap_or(""));
        }
        Stage::Complete(outcome) => {
            println!("=== Ending: {} ===", outcome.ending.title);
            if !outcome.ending.description.is_empty() {
                println!("{}", outcome.ending.description);
            }
        }
        _ => {}
    }

    if let (Stage::Decision { .. }, Some(decision)) = (view.stage, view.decision) {
        println!(
            "[{}/{}] {}",
            view.answered + 1,
            view.total_decisions,
            decision.title
        );
        if !decision.description.is_empty() {
            println!("{}", decision.description);
        }
    }

    if let Some(text) = view.narration.filter(|t| !t.is_empty()) {
        println!("{}", text);
    }

    if !view.options.is_empty() {
        println!();
        for (i, option) in view.options.iter().enumerate() {
            let lock = if option.available { "" } else { " (locked)" };
            println!("  {}. {}{}", i + 1, option.choice.label, lock);
        }
    }

    println!("\n  meters: {}", view.meters);
    println!();
}

fn print_state(session: &GameSession) {
    let (answered, total) = session.progress();
    println!("Stage:    {}", session.stage().name());
    println!("Progress: {}/{} decisions", answered, total);
    println!("Meters:   {}", session.meters());
    println!("Unlocks:  {}", session.unlocks().sorted().join(", "));
}

fn print_help() {
    println!("Commands:");
    println!("  <n>        choose option n of the current decision");
    println!("  continue   advance past narration (also: empty line)");
    println!("  replay     start the game over");
    println!("  state      print meters and unlocks");
    println!("  help       list commands");
    println!("  quit       exit");
}
