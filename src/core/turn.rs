/// Turn controller — sequences one accepted choice into new state and a new
/// node or an ending.
///
/// The controller owns the playthrough's `StateStore` and is the only thing
/// that mutates it. Each call to `select_choice` runs the full turn
/// synchronously: effects, tension delta, ending rules, next-node
/// resolution.
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::core::branch;
use crate::core::config::EngineConfig;
use crate::core::graph::DialogueGraph;
use crate::core::presentation::{ChoiceView, PresentationEvent};
use crate::core::state::{StateError, StateSchema, StateStore, TENSION};
use crate::schema::choice::ChoiceRef;
use crate::schema::node::{DialogueNode, NodeId};
use crate::schema::value::Value;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("choice {requested} does not belong to current node '{current}'")]
    InvalidChoice {
        current: NodeId,
        requested: ChoiceRef,
    },
    #[error("a choice is already being resolved")]
    ChoiceInFlight,
    #[error("playthrough already ended at '{0}'")]
    AlreadyEnded(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPhase {
    AwaitingChoice(NodeId),
    ApplyingEffects,
    CheckingEnding,
    ResolvingNext,
    Ended(NodeId),
}

/// A reached ending with everything needed to show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ending {
    pub id: NodeId,
    pub title: String,
    pub good: bool,
    pub text: String,
}

/// Result of one turn.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub events: Vec<PresentationEvent>,
    /// Effects that could not be applied; the turn went on without them.
    pub skipped: Vec<StateError>,
    pub ending: Option<Ending>,
}

impl TurnOutcome {
    pub fn is_ended(&self) -> bool {
        self.ending.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct TurnController {
    graph: Arc<DialogueGraph>,
    config: Arc<EngineConfig>,
    store: StateStore,
    current: NodeId,
    phase: TurnPhase,
    ending: Option<Ending>,
    turns: usize,
}

impl TurnController {
    pub fn new(
        graph: Arc<DialogueGraph>,
        schema: Arc<StateSchema>,
        config: Arc<EngineConfig>,
    ) -> TurnController {
        let store = StateStore::new(schema, config.initial_tension);
        let start = graph.start_id().clone();
        let mut controller = TurnController {
            graph,
            config,
            store,
            current: start.clone(),
            phase: TurnPhase::AwaitingChoice(start),
            ending: None,
            turns: 0,
        };
        controller.settle();
        controller
    }

    pub fn phase(&self) -> &TurnPhase {
        &self.phase
    }

    /// The node awaiting a choice, or the ending node once ended.
    pub fn current_node(&self) -> &NodeId {
        &self.current
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn graph(&self) -> &DialogueGraph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ending(&self) -> Option<&Ending> {
        self.ending.as_ref()
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.phase, TurnPhase::Ended(_))
    }

    /// Number of choices accepted since the last reset.
    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Run the ending rules against current state without advancing.
    pub fn check_ending(&self) -> Option<&NodeId> {
        self.config.ending_rules.check(&self.store)
    }

    /// Choices offered at the current node; empty once ended.
    pub fn available_choices(&self) -> Vec<ChoiceView> {
        if self.is_ended() {
            return Vec::new();
        }
        self.graph
            .lookup(self.current.as_str())
            .map(choice_views)
            .unwrap_or_default()
    }

    /// Events describing where the playthrough currently stands, for a
    /// renderer that is drawing it for the first time.
    pub fn entry_events(&self) -> Vec<PresentationEvent> {
        let mut events = vec![self.tension_event()];
        match self.ending {
            Some(ref ending) => events.push(ending_event(ending)),
            None => {
                if let Some(node) = self.graph.lookup(self.current.as_str()) {
                    events.push(node_entered(node));
                }
            }
        }
        events
    }

    /// Resolve one turn.
    ///
    /// Recoverable state errors are collected in the outcome. Selecting a
    /// choice that is not on the current node is rejected before anything
    /// changes.
    pub fn select_choice(&mut self, choice: &ChoiceRef) -> Result<TurnOutcome, TurnError> {
        match self.phase {
            TurnPhase::AwaitingChoice(_) => {}
            TurnPhase::Ended(ref id) => return Err(TurnError::AlreadyEnded(id.clone())),
            _ => return Err(TurnError::ChoiceInFlight),
        }

        let graph = Arc::clone(&self.graph);
        let selected = graph
            .lookup(self.current.as_str())
            .filter(|_| choice.node == self.current)
            .and_then(|node| node.choices.get(choice.index));
        let Some(selected) = selected else {
            tracing::error!(current = %self.current, requested = %choice, "invalid choice selection");
            return Err(TurnError::InvalidChoice {
                current: self.current.clone(),
                requested: choice.clone(),
            });
        };

        self.turns += 1;
        let mut outcome = TurnOutcome::default();
        let tension_before = self.store.tension();

        self.phase = TurnPhase::ApplyingEffects;
        for effect in &selected.effects {
            if let Err(e) = self.store.apply(effect) {
                tracing::warn!(node = %self.current, choice = choice.index, error = %e, "effect skipped");
                outcome.skipped.push(e);
            }
        }
        if selected.tension != 0.0 {
            if let Err(e) = self.store.add_float(TENSION, selected.tension) {
                tracing::warn!(node = %self.current, choice = choice.index, error = %e, "tension delta skipped");
                outcome.skipped.push(e);
            }
        }
        let tension = self.store.tension();
        self.log_thresholds(tension_before, tension);

        outcome.events.push(PresentationEvent::ChoiceSelected {
            node: self.current.clone(),
            index: choice.index,
            text: selected.text.clone(),
            cue: selected.cue.clone(),
        });
        if tension != tension_before {
            outcome.events.push(self.tension_event());
        }

        self.phase = TurnPhase::CheckingEnding;
        if let Some(id) = self.check_ending().cloned() {
            tracing::info!(ending = %id, node = %self.current, "ending rule fired");
            self.finish(id, &mut outcome);
            return Ok(outcome);
        }

        self.phase = TurnPhase::ResolvingNext;
        let routed = if selected.has_branches() {
            branch::evaluate(&selected.branches, &self.store)
        } else {
            None
        };
        let Some(next) = routed.or(selected.next.as_ref()).cloned() else {
            let fallback = self.dead_end_ending();
            tracing::warn!(node = %self.current, choice = choice.index, ending = %fallback, "dead end, forcing ending");
            self.finish(fallback, &mut outcome);
            return Ok(outcome);
        };

        match graph.lookup(next.as_str()) {
            Some(node) if node.is_terminal() => self.finish(next, &mut outcome),
            Some(node) => {
                tracing::debug!(from = %self.current, to = %next, tension, "node entered");
                outcome.events.push(node_entered(node));
                self.current = next.clone();
                self.phase = TurnPhase::AwaitingChoice(next);
            }
            None => {
                tracing::error!(node = %next, "next node missing from graph");
                let fallback = self.config.neutral_ending.clone();
                self.finish(fallback, &mut outcome);
            }
        }
        Ok(outcome)
    }

    /// Back to the start node at baseline state.
    pub fn reset(&mut self) {
        self.store.reset(self.config.initial_tension);
        self.current = self.graph.start_id().clone();
        self.phase = TurnPhase::AwaitingChoice(self.current.clone());
        self.ending = None;
        self.turns = 0;
        self.settle();
        tracing::debug!(start = %self.current, "turn controller reset");
    }

    /// Jump to a saved position. `node` must exist in the graph; state is
    /// validated in full before anything is replaced.
    pub fn restore(
        &mut self,
        node: NodeId,
        values: &BTreeMap<String, Value>,
        ended: bool,
        turns: usize,
    ) -> Result<(), StateError> {
        self.store.restore(values, self.config.initial_tension)?;
        self.current = node.clone();
        self.turns = turns;
        if ended {
            self.ending = Some(self.ending_for(&node));
            self.phase = TurnPhase::Ended(node);
        } else {
            self.ending = None;
            self.phase = TurnPhase::AwaitingChoice(node);
        }
        Ok(())
    }

    /// A start node without choices is an immediate ending.
    fn settle(&mut self) {
        let terminal = self
            .graph
            .lookup(self.current.as_str())
            .is_some_and(|node| node.is_terminal());
        if terminal {
            let id = self.current.clone();
            self.ending = Some(self.ending_for(&id));
            self.phase = TurnPhase::Ended(id);
        }
    }

    fn dead_end_ending(&self) -> NodeId {
        if self.store.is_tension_maxed() {
            self.config.escalation_ending.clone()
        } else {
            self.config.neutral_ending.clone()
        }
    }

    fn finish(&mut self, id: NodeId, outcome: &mut TurnOutcome) {
        let ending = self.ending_for(&id);
        tracing::info!(
            ending = %id,
            title = %ending.title,
            good = ending.good,
            turns = self.turns,
            "playthrough ended"
        );
        outcome.events.push(ending_event(&ending));
        outcome.ending = Some(ending.clone());
        self.ending = Some(ending);
        self.current = id.clone();
        self.phase = TurnPhase::Ended(id);
    }

    fn ending_for(&self, id: &NodeId) -> Ending {
        match self.graph.lookup(id.as_str()) {
            Some(node) => {
                let info = node.ending_info();
                Ending {
                    id: id.clone(),
                    title: info.title,
                    good: info.good,
                    text: node.text.clone(),
                }
            }
            None => {
                tracing::error!(ending = %id, "ending node missing from graph");
                Ending {
                    id: id.clone(),
                    title: id.to_string(),
                    good: false,
                    text: String::new(),
                }
            }
        }
    }

    fn tension_event(&self) -> PresentationEvent {
        PresentationEvent::TensionChanged {
            value: self.store.tension(),
            ratio: self.store.tension_ratio(),
        }
    }

    fn log_thresholds(&self, before: f64, after: f64) {
        let soft = self.config.soft_threshold;
        if before < soft && after >= soft {
            tracing::info!(tension = after, threshold = soft, "tension crossed soft threshold");
        } else if before >= soft && after < soft {
            tracing::info!(tension = after, threshold = soft, "tension eased below soft threshold");
        }
        if let Some(hard) = self.config.hard_threshold() {
            if before < hard && after >= hard {
                tracing::info!(tension = after, threshold = hard, "tension reached hard threshold");
            }
        }
    }
}

fn choice_views(node: &DialogueNode) -> Vec<ChoiceView> {
    node.choices
        .iter()
        .enumerate()
        .map(|(index, choice)| ChoiceView {
            index,
            text: choice.text.clone(),
        })
        .collect()
}

fn node_entered(node: &DialogueNode) -> PresentationEvent {
    PresentationEvent::NodeEntered {
        node: node.id.clone(),
        text: node.text.clone(),
        choices: choice_views(node),
        scene: node.scene.clone().unwrap_or_default(),
    }
}

fn ending_event(ending: &Ending) -> PresentationEvent {
    PresentationEvent::EndingReached {
        ending: ending.id.clone(),
        title: ending.title.clone(),
        good: ending.good,
        text: ending.text.clone(),
    }
}
