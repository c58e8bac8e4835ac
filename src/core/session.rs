/// Story content and playthrough sessions.
///
/// A `Story` is the immutable, shareable half: graph, schema, config and
/// backdrops behind `Arc`s. A `Session` is one playthrough over a story,
/// owning its own state, turn controller, phase and presentation sinks.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::core::backdrop::{BackdropError, BackdropMap};
use crate::core::config::{ConfigError, EngineConfig};
use crate::core::graph::{DialogueGraph, GraphError, IntegrityIssue, IntegrityReport, VariableIssue};
use crate::core::presentation::{ChoiceView, PresentationEvent, PresentationSink};
use crate::core::state::{StateError, StateSchema, StateStore};
use crate::core::turn::{TurnController, TurnError, TurnOutcome, TurnPhase};
use crate::schema::choice::ChoiceRef;
use crate::schema::node::NodeId;
use crate::schema::value::Value;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("backdrop error: {0}")]
    Backdrop(#[from] BackdropError),
    #[error("turn error: {0}")]
    Turn(#[from] TurnError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("{} unresolved variable reference(s)", .0.len())]
    StrictVariables(Vec<VariableIssue>),
    #[error("no {0} provided to the story builder")]
    MissingContent(&'static str),
    #[error("session has not been started")]
    NotStarted,
    #[error("session already started")]
    AlreadyStarted,
    #[error("session is paused")]
    Paused,
    #[error("waiting for the presentation of the previous turn to finish")]
    ChoiceInFlight,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot names unknown node '{0}'")]
    UnknownNode(NodeId),
    #[error("snapshot at '{0}' cannot be resumed from")]
    NotResumable(NodeId),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// The immutable content of one story. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Story {
    graph: Arc<DialogueGraph>,
    schema: Arc<StateSchema>,
    config: Arc<EngineConfig>,
    backdrops: Arc<BackdropMap>,
    variable_issues: Arc<Vec<VariableIssue>>,
}

/// Builder for constructing a `Story`.
#[derive(Default)]
pub struct StoryBuilder {
    story_dir: Option<PathBuf>,
    /// Directly provided content (for testing without files).
    graph: Option<DialogueGraph>,
    schema: Option<StateSchema>,
    config: Option<EngineConfig>,
    backdrops: Option<BackdropMap>,
}

impl Story {
    pub fn builder() -> StoryBuilder {
        StoryBuilder::default()
    }

    pub fn graph(&self) -> &Arc<DialogueGraph> {
        &self.graph
    }

    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    pub fn backdrops(&self) -> &Arc<BackdropMap> {
        &self.backdrops
    }

    /// Variable references found unresolvable at build time.
    pub fn variable_issues(&self) -> &[VariableIssue] {
        &self.variable_issues
    }

    /// A turn controller at the start of this story.
    pub fn controller(&self) -> TurnController {
        TurnController::new(
            Arc::clone(&self.graph),
            Arc::clone(&self.schema),
            Arc::clone(&self.config),
        )
    }

    /// A new playthrough in the menu phase.
    pub fn session(&self) -> Session {
        Session {
            story: self.clone(),
            controller: self.controller(),
            sinks: Vec::new(),
            phase: SessionPhase::Menu,
            backdrop: None,
            presenting: false,
        }
    }
}

impl StoryBuilder {
    /// Directory holding `nodes.ron` and `state.ron`, plus optional
    /// `config.ron` and `backdrops.ron`.
    pub fn story_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.story_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Provide a loaded graph. Its start node is used as is.
    pub fn with_graph(mut self, graph: DialogueGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_backdrops(mut self, backdrops: BackdropMap) -> Self {
        self.backdrops = Some(backdrops);
        self
    }

    pub fn build(self) -> Result<Story, SessionError> {
        let dir = self.story_dir.as_deref();
        let file = |name: &str| dir.map(|d| d.join(name)).filter(|p| p.exists());

        let config = match self.config {
            Some(config) => config,
            None => match file("config.ron") {
                Some(path) => EngineConfig::load_from_ron(&path)?,
                None => EngineConfig::default(),
            },
        };

        let schema = match self.schema {
            Some(schema) => schema,
            None => match file("state.ron") {
                Some(path) => StateSchema::load_from_ron(&path)?,
                None => return Err(SessionError::MissingContent("state schema")),
            },
        };

        let graph = match self.graph {
            Some(graph) => {
                if graph.start_id() != &config.start_node {
                    tracing::warn!(
                        graph_start = %graph.start_id(),
                        config_start = %config.start_node,
                        "provided graph overrides configured start node"
                    );
                }
                graph
            }
            None => match file("nodes.ron") {
                Some(path) => DialogueGraph::load_from_ron(&path, config.start_node.clone())?,
                None => return Err(SessionError::MissingContent("dialogue nodes")),
            },
        };

        let backdrops = match self.backdrops {
            Some(backdrops) => backdrops,
            None => match file("backdrops.ron") {
                Some(path) => BackdropMap::load_from_ron(&path)?,
                None => BackdropMap::default(),
            },
        };

        let mut missing: Vec<IntegrityIssue> = Vec::new();
        for id in config.ending_targets() {
            let issue = IntegrityIssue::MissingEnding(id.clone());
            if !graph.contains(id.as_str()) && !missing.contains(&issue) {
                missing.push(issue);
            }
        }
        if !missing.is_empty() {
            return Err(GraphError::Integrity(IntegrityReport(missing)).into());
        }

        let variable_issues = graph.check_variables(&schema);
        if !variable_issues.is_empty() {
            if config.strict_variables {
                return Err(SessionError::StrictVariables(variable_issues));
            }
            for issue in &variable_issues {
                tracing::warn!(%issue, "unresolved variable reference");
            }
        }

        tracing::debug!(
            nodes = graph.len(),
            variables = schema.len(),
            start = %graph.start_id(),
            "story built"
        );
        Ok(Story {
            graph: Arc::new(graph),
            schema: Arc::new(schema),
            config: Arc::new(config),
            backdrops: Arc::new(backdrops),
            variable_issues: Arc::new(variable_issues),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Menu,
    Dialogue,
    Paused,
    Ended,
}

/// Saved position of a playthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub node: NodeId,
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub ending: Option<NodeId>,
    #[serde(default)]
    pub turns: usize,
}

impl Snapshot {
    pub fn to_ron(&self) -> Result<String, SnapshotError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn from_ron(input: &str) -> Result<Snapshot, SnapshotError> {
        Ok(ron::from_str(input)?)
    }
}

/// One playthrough of a story.
pub struct Session {
    story: Story,
    controller: TurnController,
    sinks: Vec<Box<dyn PresentationSink>>,
    phase: SessionPhase,
    backdrop: Option<String>,
    /// Set while the driver is still presenting the last turn.
    presenting: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase)
            .field("node", self.controller.current_node())
            .field("turns", &self.controller.turns())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Session {
    /// Register a sink; it lives as long as the session.
    pub fn with_sink(mut self, sink: impl PresentationSink + 'static) -> Self {
        self.add_sink(Box::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn PresentationSink>) {
        self.sinks.push(sink);
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn turn_phase(&self) -> &TurnPhase {
        self.controller.phase()
    }

    pub fn store(&self) -> &StateStore {
        self.controller.store()
    }

    pub fn current_node(&self) -> &NodeId {
        self.controller.current_node()
    }

    pub fn available_choices(&self) -> Vec<ChoiceView> {
        self.controller.available_choices()
    }

    pub fn turns(&self) -> usize {
        self.controller.turns()
    }

    /// Whether a choice would currently be accepted.
    pub fn accepts_choice(&self) -> bool {
        self.phase == SessionPhase::Dialogue && !self.presenting
    }

    /// Leave the menu and present the start node.
    pub fn start(&mut self) -> Result<Vec<PresentationEvent>, SessionError> {
        if self.phase != SessionPhase::Menu {
            return Err(SessionError::AlreadyStarted);
        }
        tracing::info!(start = %self.controller.current_node(), "session started");
        let events = self.controller.entry_events();
        Ok(self.deliver(events))
    }

    /// Advance by one choice.
    pub fn select_choice(&mut self, choice: &ChoiceRef) -> Result<TurnOutcome, SessionError> {
        match self.phase {
            SessionPhase::Menu => return Err(SessionError::NotStarted),
            SessionPhase::Paused => return Err(SessionError::Paused),
            SessionPhase::Dialogue | SessionPhase::Ended => {}
        }
        if self.presenting && !self.controller.is_ended() {
            tracing::debug!(requested = %choice, "choice rejected while presenting");
            return Err(SessionError::ChoiceInFlight);
        }

        let mut outcome = self.controller.select_choice(choice)?;
        outcome.events = self.deliver(std::mem::take(&mut outcome.events));
        Ok(outcome)
    }

    /// Select the choice at `index` on the current node.
    pub fn select_index(&mut self, index: usize) -> Result<TurnOutcome, SessionError> {
        let choice = ChoiceRef::new(self.controller.current_node().clone(), index);
        self.select_choice(&choice)
    }

    /// The driver finished presenting the last batch of events.
    pub fn presentation_finished(&mut self) {
        self.presenting = false;
    }

    pub fn pause(&mut self) {
        if self.phase == SessionPhase::Dialogue {
            self.phase = SessionPhase::Paused;
            tracing::debug!("session paused");
        }
    }

    pub fn resume_play(&mut self) {
        if self.phase == SessionPhase::Paused {
            self.phase = SessionPhase::Dialogue;
            tracing::debug!("session resumed");
        }
    }

    /// Abandon the playthrough: state and node return to the start in one
    /// step and the session waits in the menu.
    pub fn return_to_menu(&mut self) {
        self.controller.reset();
        self.phase = SessionPhase::Menu;
        self.backdrop = None;
        self.presenting = false;
        tracing::info!("returned to menu");
    }

    pub fn restart(&mut self) -> Result<Vec<PresentationEvent>, SessionError> {
        self.return_to_menu();
        self.start()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            node: self.controller.current_node().clone(),
            variables: self.controller.store().to_map(),
            ending: self.controller.ending().map(|e| e.id.clone()),
            turns: self.controller.turns(),
        }
    }

    /// Continue from a snapshot, replacing the current playthrough.
    ///
    /// Nothing changes unless the whole snapshot is valid for this story.
    pub fn resume(&mut self, snapshot: &Snapshot) -> Result<Vec<PresentationEvent>, SessionError> {
        let graph = self.story.graph();
        let node = match snapshot.ending {
            Some(ref ending) => ending,
            None => &snapshot.node,
        };
        let Some(found) = graph.lookup(node.as_str()) else {
            return Err(SnapshotError::UnknownNode(node.clone()).into());
        };
        let ended = snapshot.ending.is_some();
        // An ending must be a place a playthrough can stop; a live position
        // must still offer choices.
        let valid = if ended {
            found.is_terminal() || self.story.config().ending_targets().any(|t| t == node)
        } else {
            !found.is_terminal()
        };
        if !valid {
            return Err(SnapshotError::NotResumable(node.clone()).into());
        }

        self.controller
            .restore(node.clone(), &snapshot.variables, ended, snapshot.turns)?;
        self.phase = SessionPhase::Dialogue;
        self.backdrop = None;
        self.presenting = false;
        tracing::info!(node = %node, turns = snapshot.turns, "session resumed from snapshot");
        let events = self.controller.entry_events();
        Ok(self.deliver(events))
    }

    /// End the session, releasing every sink.
    pub fn close(mut self) {
        let sinks = self.sinks.len();
        self.sinks.clear();
        tracing::debug!(sinks, "session closed");
    }

    /// Insert backdrop changes, fan out to sinks and update the phase.
    fn deliver(&mut self, events: Vec<PresentationEvent>) -> Vec<PresentationEvent> {
        let mut delivered = Vec::with_capacity(events.len() + 1);
        for event in events {
            let shown = match event {
                PresentationEvent::NodeEntered { ref node, .. } => Some(node),
                PresentationEvent::EndingReached { ref ending, .. } => Some(ending),
                _ => None,
            };
            if let Some(node) = shown {
                let backdrops = self.story.backdrops();
                if let Some(next) = backdrops.change_for(self.backdrop.as_deref(), node.as_str()) {
                    let next = next.to_string();
                    tracing::debug!(from = ?self.backdrop, to = %next, "backdrop changed");
                    delivered.push(PresentationEvent::BackdropChanged {
                        from: self.backdrop.replace(next.clone()),
                        to: next,
                    });
                }
            }
            delivered.push(event);
        }

        for event in &delivered {
            for sink in &mut self.sinks {
                sink.present(event);
            }
        }

        self.phase = if self.controller.is_ended() {
            SessionPhase::Ended
        } else {
            SessionPhase::Dialogue
        };
        self.presenting = self.story.config().await_presentation;
        delivered
    }
}
