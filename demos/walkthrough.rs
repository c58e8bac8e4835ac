/// Walkthrough — plays a scripted route through level one and prints each event.
///
/// Run with: cargo run --example walkthrough

use dialogue_engine::core::presentation::PresentationEvent;
use dialogue_engine::core::session::Story;
use std::sync::mpsc;

fn main() {
    let story = Story::builder()
        .story_dir("story_data/level1")
        .build()
        .expect("level one should load");

    let (tx, rx) = mpsc::channel();
    let mut session = story.session().with_sink(tx);
    session.start().expect("session starts from the menu");

    // Listen first, message Linh, ask her to fetch a teacher, keep talking.
    for index in [0, 1, 1, 0] {
        let outcome = session.select_index(index).expect("scripted choice is valid");
        if outcome.is_ended() {
            break;
        }
    }
    session.close();

    for event in rx.iter() {
        match event {
            PresentationEvent::NodeEntered { node, text, .. } => println!("[{}] {}", node, text),
            PresentationEvent::ChoiceSelected { text, .. } => println!("  > {}", text),
            PresentationEvent::TensionChanged { value, .. } => println!("  (tension {:.0})", value),
            PresentationEvent::BackdropChanged { to, .. } => println!("  ~ {}", to),
            PresentationEvent::EndingReached { title, good, .. } => {
                println!("Ending: {} ({})", title, if good { "good" } else { "bad" })
            }
        }
    }
}
