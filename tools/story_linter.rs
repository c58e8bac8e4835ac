/// Story Linter — validates a story directory before it ships.
///
/// Usage: story_linter <story_dir> [--max-turns <n>]
///
/// Checks graph integrity, variable references, static reachability and
/// explores every choice path looking for loops.

use dialogue_engine::core::explore::explore;
use dialogue_engine::core::session::{SessionError, Story};
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

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
        println!("Usage: story_linter <story_dir> [--max-turns <n>]");
        process::exit(0);
    }

    let story_dir = &args[1];
    let mut max_turns = 200;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--max-turns" && i + 1 < args.len() {
            i += 1;
            max_turns = args[i].parse().unwrap_or(max_turns);
        }
        i += 1;
    }

    let story = match Story::builder().story_dir(story_dir).build() {
        Ok(story) => story,
        Err(SessionError::Graph(e)) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
        Err(SessionError::StrictVariables(issues)) => {
            for issue in &issues {
                eprintln!("ERROR: {}", issue);
            }
            process::exit(1);
        }
        Err(e) => {
            eprintln!("ERROR: Failed to load story: {}", e);
            process::exit(1);
        }
    };

    let graph = story.graph();
    println!(
        "Loaded {} nodes, {} variables (start: {})",
        graph.len(),
        story.schema().len(),
        graph.start_id()
    );

    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    for issue in story.variable_issues() {
        warnings.push(issue.to_string());
    }

    // Ending rule targets are entered without a graph edge.
    let config = story.config();
    for id in graph.unreachable() {
        if !config.ending_targets().any(|t| *t == id) {
            warnings.push(format!("node '{}' is unreachable from the start", id));
        }
    }

    let backdrops = story.backdrops();
    for node in graph.nodes() {
        if !backdrops.lists(node.id.as_str()) {
            warnings.push(format!(
                "node '{}' has no backdrop, falls back to '{}'",
                node.id,
                backdrops.default_backdrop()
            ));
        }
        if node.is_terminal() && !node.is_ending() {
            warnings.push(format!("node '{}' has no choices and no ending metadata", node.id));
        }
        if !node.is_terminal() && node.is_ending() {
            warnings.push(format!("node '{}' has ending metadata but offers choices", node.id));
        }
    }

    let exploration = explore(&story, max_turns);
    for cycle in &exploration.loops {
        let path: Vec<&str> = cycle.iter().map(|n| n.as_str()).collect();
        errors.push(format!("choice loop: {}", path.join(" -> ")));
    }
    if exploration.truncated > 0 {
        errors.push(format!(
            "{} path(s) still running after {} turns",
            exploration.truncated, max_turns
        ));
    }

    println!("\n=== Story Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!("\n--- Exploration ---");
    println!("Paths: {} (longest {} turns)", exploration.paths, exploration.longest);
    for (ending, count) in &exploration.endings {
        let title = graph
            .lookup(ending.as_str())
            .map(|n| n.ending_info().title)
            .unwrap_or_default();
        println!("  {:<6} {:>5}  {}", ending.as_str(), count, title);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if !errors.is_empty() {
        process::exit(1);
    }
}
