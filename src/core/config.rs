/// Engine configuration — start node, tension tuning, and ending routing.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::ending::{EndingCondition, EndingRules};
use crate::core::state::TENSION;
use crate::schema::node::NodeId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Tunables of one story. Every field has a default, so a config file
/// only needs to list what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub start_node: NodeId,
    pub initial_tension: f64,
    /// Crossing this is logged; it has no effect on routing.
    pub soft_threshold: f64,
    pub ending_rules: EndingRules,
    /// Ending forced by a dead end reached at maximum tension.
    pub escalation_ending: NodeId,
    /// Ending of a dead end reached below maximum tension.
    pub neutral_ending: NodeId,
    /// Fail session construction on unresolvable variable references.
    pub strict_variables: bool,
    /// Reject choices after each turn until the driver reports the
    /// presentation finished.
    pub await_presentation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_node: NodeId::from("S0"),
            initial_tension: 45.0,
            soft_threshold: 55.0,
            ending_rules: EndingRules::default(),
            escalation_ending: NodeId::from("E4"),
            neutral_ending: NodeId::from("E2"),
            strict_variables: false,
            await_presentation: false,
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    /// The tension threshold of the first escalation rule, if one exists.
    pub fn hard_threshold(&self) -> Option<f64> {
        self.ending_rules.iter().find_map(|rule| match rule.when {
            EndingCondition::AtLeast {
                ref variable,
                threshold,
            } if variable == TENSION => Some(threshold),
            _ => None,
        })
    }

    /// Every ending key configuration can route to.
    pub fn ending_targets(&self) -> impl Iterator<Item = &NodeId> {
        self.ending_rules
            .targets()
            .chain([&self.escalation_ending, &self.neutral_ending])
    }
}
