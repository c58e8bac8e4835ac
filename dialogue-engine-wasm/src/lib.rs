//! WASM bindings for dialogue-engine — drives the level-one story from a web page.

use wasm_bindgen::prelude::*;

use dialogue_engine::core::backdrop::BackdropMap;
use dialogue_engine::core::config::EngineConfig;
use dialogue_engine::core::graph::DialogueGraph;
use dialogue_engine::core::presentation::{ChoiceView, PresentationEvent};
use dialogue_engine::core::session::{Session, SessionPhase, Snapshot, Story};
use dialogue_engine::core::state::StateSchema;
use dialogue_engine::core::turn::{Ending, TurnOutcome};

// ---------------------------------------------------------------------------
// Embedded story data — compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const LEVEL1_NODES: &str = include_str!("../../story_data/level1/nodes.ron");
    pub const LEVEL1_STATE: &str = include_str!("../../story_data/level1/state.ron");
    pub const LEVEL1_CONFIG: &str = include_str!("../../story_data/level1/config.ron");
    pub const LEVEL1_BACKDROPS: &str = include_str!("../../story_data/level1/backdrops.ron");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct TurnView<'a> {
    phase: &'static str,
    events: &'a [PresentationEvent],
    choices: Vec<ChoiceView>,
    skipped: Vec<String>,
    ending: Option<&'a Ending>,
    tension: f64,
}

fn phase_name(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Menu => "menu",
        SessionPhase::Dialogue => "dialogue",
        SessionPhase::Paused => "paused",
        SessionPhase::Ended => "ended",
    }
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

fn load_level1() -> Result<Story, JsError> {
    let config = EngineConfig::parse_ron(data::LEVEL1_CONFIG).map_err(|e| js_err("Config parse error", e))?;
    let schema = StateSchema::parse_ron(data::LEVEL1_STATE).map_err(|e| js_err("State parse error", e))?;
    let graph = DialogueGraph::parse_ron(data::LEVEL1_NODES, config.start_node.clone())
        .map_err(|e| js_err("Graph load error", e))?;
    let backdrops =
        BackdropMap::parse_ron(data::LEVEL1_BACKDROPS).map_err(|e| js_err("Backdrop parse error", e))?;

    Story::builder()
        .with_config(config)
        .with_schema(schema)
        .with_graph(graph)
        .with_backdrops(backdrops)
        .build()
        .map_err(|e| js_err("Story build error", e))
}

// ---------------------------------------------------------------------------
// StorySession — the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StorySession {
    session: Session,
}

#[wasm_bindgen]
impl StorySession {
    /// Load the embedded level-one story, waiting in the menu.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<StorySession, JsError> {
        let story = load_level1()?;
        Ok(StorySession {
            session: story.session(),
        })
    }

    /// Present the start node. Returns a JSON turn view.
    pub fn start(&mut self) -> Result<String, JsError> {
        let events = self.session.start().map_err(|e| js_err("Start error", e))?;
        self.render(&events, None)
    }

    /// Pick the choice at `index` on the current node. Returns a JSON turn view.
    pub fn choose(&mut self, index: usize) -> Result<String, JsError> {
        let outcome = self
            .session
            .select_index(index)
            .map_err(|e| js_err("Choice error", e))?;
        self.render(&outcome.events, Some(&outcome))
    }

    /// Signal that the page finished animating the last turn.
    pub fn presentation_finished(&mut self) {
        self.session.presentation_finished();
    }

    /// Back to the start at baseline state. Returns a JSON turn view.
    pub fn reset(&mut self) -> Result<String, JsError> {
        let events = self.session.restart().map_err(|e| js_err("Reset error", e))?;
        self.render(&events, None)
    }

    /// The current position as a JSON snapshot.
    pub fn snapshot(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.session.snapshot()).map_err(|e| js_err("Serialization error", e))
    }

    /// Continue from a JSON snapshot. Returns a JSON turn view.
    pub fn resume(&mut self, snapshot_json: &str) -> Result<String, JsError> {
        let snapshot: Snapshot =
            serde_json::from_str(snapshot_json).map_err(|e| js_err("Invalid snapshot JSON", e))?;
        let events = self
            .session
            .resume(&snapshot)
            .map_err(|e| js_err("Resume error", e))?;
        self.render(&events, None)
    }

    pub fn phase(&self) -> String {
        phase_name(self.session.phase()).to_string()
    }
}

impl StorySession {
    fn render(&self, events: &[PresentationEvent], outcome: Option<&TurnOutcome>) -> Result<String, JsError> {
        let view = TurnView {
            phase: phase_name(self.session.phase()),
            events,
            choices: self.session.available_choices(),
            skipped: outcome
                .map(|o| o.skipped.iter().map(|e| e.to_string()).collect())
                .unwrap_or_default(),
            ending: outcome.and_then(|o| o.ending.as_ref()),
            tension: self.session.store().tension(),
        };
        serde_json::to_string(&view).map_err(|e| js_err("Serialization error", e))
    }
}
