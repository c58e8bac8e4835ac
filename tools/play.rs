/// Play — terminal playthrough of a story directory.
///
/// Usage: play <story_dir> [--auto] [--seed <n>]
///
/// Commands:
///   <number>      — pick a choice
///   state         — print every state variable
///   save <file>   — write a snapshot
///   load <file>   — resume from a snapshot
///   reset         — start over
///   help          — list commands
///   quit          — exit

use dialogue_engine::core::presentation::{PresentationEvent, PresentationSink};
use dialogue_engine::core::session::{Session, SessionPhase, Snapshot, Story};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, BufRead, Write};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Renders events as plain text.
struct Terminal;

impl PresentationSink for Terminal {
    fn present(&mut self, event: &PresentationEvent) {
        match event {
            PresentationEvent::BackdropChanged { to, .. } => {
                println!("\n[{}]", to);
            }
            PresentationEvent::NodeEntered {
                node,
                text,
                choices,
                scene,
            } => {
                println!("\n--- {} ---", node);
                for line in scene {
                    println!("  {}: {}", line.speaker, line.text);
                }
                println!("\n{}\n", text);
                for choice in choices {
                    println!("  {}. {}", choice.index + 1, choice.text);
                }
            }
            PresentationEvent::ChoiceSelected { text, cue, .. } => {
                match cue {
                    Some(cue) => println!("> {} ({})", text, cue),
                    None => println!("> {}", text),
                }
            }
            PresentationEvent::TensionChanged { value, ratio } => {
                println!("  tension {:.0} [{}]", value, bar(*ratio));
            }
            PresentationEvent::EndingReached {
                ending,
                title,
                good,
                text,
            } => {
                let kind = if *good { "good ending" } else { "bad ending" };
                println!("\n=== {} ({}, {}) ===", title, ending, kind);
                println!("{}\n", text);
            }
        }
    }
}

fn bar(ratio: f64) -> String {
    let filled = (ratio.clamp(0.0, 1.0) * 20.0).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(20 - filled))
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let story_dir = &args[1];
    let mut auto = false;
    let mut seed: u64 = 42;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--auto" => auto = true,
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let story = match Story::builder().story_dir(story_dir).build() {
        Ok(story) => story,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = story.session().with_sink(Terminal);
    if let Err(e) = session.start() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }

    if auto {
        autoplay(&mut session, seed);
    } else {
        println!("Type a choice number, or 'help' for commands.");
        interactive(&mut session);
    }
}

fn autoplay(session: &mut Session, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    println!("Seed: {}", seed);
    while session.phase() == SessionPhase::Dialogue {
        let offered = session.available_choices();
        if offered.is_empty() {
            break;
        }
        let pick = offered[rng.gen_range(0..offered.len())].index;
        if let Err(e) = session.select_index(pick) {
            eprintln!("ERROR: {}", e);
            break;
        }
    }
    println!("Finished after {} turns.", session.turns());
}

fn interactive(session: &mut Session) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("play> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "state" => {
                println!("node: {} (turn {})", session.current_node(), session.turns());
                for (name, value) in session.store().to_map() {
                    println!("  {:<24} {}", name, value);
                }
            }
            "reset" => {
                if let Err(e) = session.restart() {
                    println!("ERROR: {}", e);
                }
            }
            "save" => {
                let Some(path) = parts.get(1) else {
                    println!("Usage: save <file>");
                    continue;
                };
                match session.snapshot().to_ron() {
                    Ok(text) => match std::fs::write(path, text) {
                        Ok(()) => println!("Saved to {}", path),
                        Err(e) => println!("ERROR: {}", e),
                    },
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "load" => {
                let Some(path) = parts.get(1) else {
                    println!("Usage: load <file>");
                    continue;
                };
                let snapshot = match std::fs::read_to_string(path) {
                    Ok(text) => Snapshot::from_ron(&text),
                    Err(e) => {
                        println!("ERROR: {}", e);
                        continue;
                    }
                };
                match snapshot {
                    Ok(snapshot) => {
                        if let Err(e) = session.resume(&snapshot) {
                            println!("ERROR: {}", e);
                        }
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            number => match number.parse::<usize>() {
                Ok(n) if n >= 1 => {
                    if let Err(e) = session.select_index(n - 1) {
                        println!("ERROR: {}", e);
                    } else if session.phase() == SessionPhase::Ended {
                        println!("Type 'reset' to play again or 'quit' to leave.");
                    }
                }
                _ => println!("Unknown command: {}. Type 'help' for commands.", number),
            },
        }
    }
}

fn print_usage() {
    println!("Usage: play <story_dir> [--auto] [--seed <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  <number>     pick a choice");
    println!("  state        print every state variable");
    println!("  save <file>  write a snapshot");
    println!("  load <file>  resume from a snapshot");
    println!("  reset        start over");
    println!("  quit         exit");
}
