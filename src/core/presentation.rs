/// Presentation events — everything a view layer needs to render a turn.
use serde::Serialize;
use std::sync::mpsc;

use crate::schema::node::{NodeId, SceneLine};

/// A choice as shown to the player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceView {
    pub index: usize,
    pub text: String,
}

/// Output of the core, self-contained so a renderer never reaches back
/// into engine internals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum PresentationEvent {
    NodeEntered {
        node: NodeId,
        text: String,
        choices: Vec<ChoiceView>,
        scene: Vec<SceneLine>,
    },
    ChoiceSelected {
        node: NodeId,
        index: usize,
        text: String,
        cue: Option<String>,
    },
    TensionChanged {
        value: f64,
        ratio: f64,
    },
    BackdropChanged {
        from: Option<String>,
        to: String,
    },
    EndingReached {
        ending: NodeId,
        title: String,
        good: bool,
        text: String,
    },
}

impl PresentationEvent {
    pub fn is_ending(&self) -> bool {
        matches!(self, Self::EndingReached { .. })
    }
}

/// Receives events as a session produces them.
pub trait PresentationSink {
    fn present(&mut self, event: &PresentationEvent);
}

impl PresentationSink for mpsc::Sender<PresentationEvent> {
    fn present(&mut self, event: &PresentationEvent) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.send(event.clone());
    }
}

/// Collects every event, for tests and headless drivers.
impl PresentationSink for Vec<PresentationEvent> {
    fn present(&mut self, event: &PresentationEvent) {
        self.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_events() {
        let (tx, rx) = mpsc::channel();
        let mut sink: Box<dyn PresentationSink> = Box::new(tx);
        sink.present(&PresentationEvent::TensionChanged {
            value: 50.0,
            ratio: 0.5,
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            PresentationEvent::TensionChanged {
                value: 50.0,
                ratio: 0.5
            }
        );

        drop(rx);
        // Sending into a closed channel is silently ignored.
        sink.present(&PresentationEvent::TensionChanged {
            value: 60.0,
            ratio: 0.6,
        });
    }

    #[test]
    fn ending_detection() {
        let ending = PresentationEvent::EndingReached {
            ending: NodeId::from("E1"),
            title: "Tốt".to_string(),
            good: true,
            text: String::new(),
        };
        assert!(ending.is_ending());
        assert!(!PresentationEvent::TensionChanged {
            value: 0.0,
            ratio: 0.0
        }
        .is_ending());
    }
}
