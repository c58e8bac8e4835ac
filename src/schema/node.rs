use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use super::choice::Choice;

/// Newtype wrapper for node keys ("S0", "E4", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closing metadata of an ending node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndingInfo {
    pub title: String,
    #[serde(default)]
    pub good: bool,
}

/// Where a character portrait stands on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StagePosition {
    Left,
    Center,
    Right,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Worried,
}

/// One spoken line of a character scene played on entering a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLine {
    pub speaker: String,
    /// Portrait key resolved by the presentation layer.
    pub portrait: String,
    pub position: StagePosition,
    pub expression: Expression,
    pub text: String,
}

/// A single narrative beat in the dialogue graph.
///
/// A node with no choices is terminal. `ending` carries the title and
/// good/bad classification shown when the playthrough stops here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: NodeId,
    pub text: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub ending: Option<EndingInfo>,
    #[serde(default)]
    pub scene: Option<Vec<SceneLine>>,
}

impl DialogueNode {
    pub fn is_terminal(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn is_ending(&self) -> bool {
        self.ending.is_some()
    }

    /// Ending metadata, or an untitled bad ending for implicit terminals.
    pub fn ending_info(&self) -> EndingInfo {
        self.ending.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_terminal_node() {
        let node: DialogueNode = ron::from_str(
            r#"(
                id: "E0",
                text: "You walked away.",
                ending: Some((title: "Walk away", good: false)),
            )"#,
        )
        .unwrap();
        assert_eq!(node.id, NodeId::from("E0"));
        assert!(node.is_terminal());
        assert!(node.is_ending());
        assert_eq!(node.ending_info().title, "Walk away");
    }

    #[test]
    fn implicit_terminal_has_default_ending() {
        let node: DialogueNode = ron::from_str(r#"(id: "X", text: "Silence.")"#).unwrap();
        assert!(node.is_terminal());
        assert!(!node.is_ending());
        let info = node.ending_info();
        assert!(info.title.is_empty());
        assert!(!info.good);
    }

    #[test]
    fn parse_scene_lines() {
        let node: DialogueNode = ron::from_str(
            r#"(
                id: "S0",
                text: "Hallway.",
                scene: Some([
                    (speaker: "Hung", portrait: "hung", position: Right, expression: Angry, text: "Hey!"),
                ]),
            )"#,
        )
        .unwrap();
        let scene = node.scene.unwrap();
        assert_eq!(scene.len(), 1);
        assert_eq!(scene[0].position, StagePosition::Right);
        assert_eq!(scene[0].expression, Expression::Angry);
    }

    #[test]
    fn node_id_display_and_borrow() {
        let id = NodeId::new("S12");
        assert_eq!(id.to_string(), "S12");
        let key: &str = id.borrow();
        assert_eq!(key, "S12");
    }
}
