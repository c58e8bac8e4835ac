/// Backdrop map — which background each node is shown against.
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::schema::node::NodeId;

#[derive(Debug, Error)]
pub enum BackdropError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// On-disk shape: backdrop name → the nodes shown against it.
#[derive(Debug, Deserialize)]
struct BackdropFile {
    default: String,
    #[serde(default)]
    backdrops: BTreeMap<String, Vec<NodeId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackdropMap {
    default: String,
    nodes: FxHashMap<NodeId, String>,
}

impl BackdropMap {
    /// A map that shows every node against one backdrop.
    pub fn single(default: impl Into<String>) -> BackdropMap {
        BackdropMap {
            default: default.into(),
            nodes: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, node: impl Into<NodeId>, backdrop: impl Into<String>) {
        self.nodes.insert(node.into(), backdrop.into());
    }

    pub fn load_from_ron(path: &Path) -> Result<BackdropMap, BackdropError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<BackdropMap, BackdropError> {
        let file: BackdropFile = ron::from_str(input)?;
        let mut map = BackdropMap::single(file.default);
        for (backdrop, nodes) in file.backdrops {
            for node in nodes {
                if let Some(previous) = map.nodes.insert(node.clone(), backdrop.clone()) {
                    tracing::warn!(node = %node, previous = %previous, backdrop = %backdrop, "node listed under two backdrops");
                }
            }
        }
        Ok(map)
    }

    /// Whether the node has a backdrop of its own.
    pub fn lists(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    /// The backdrop for a node, or the default for unlisted nodes.
    pub fn for_node(&self, node: &str) -> &str {
        match self.nodes.get(node) {
            Some(name) => name,
            None => {
                tracing::warn!(node, default = %self.default, "no backdrop listed, using default");
                &self.default
            }
        }
    }

    pub fn default_backdrop(&self) -> &str {
        &self.default
    }

    /// The new backdrop if moving from `current` to `node` changes it.
    pub fn change_for(&self, current: Option<&str>, node: &str) -> Option<&str> {
        let next = self.for_node(node);
        match current {
            Some(name) if name == next => None,
            _ => Some(next),
        }
    }
}

impl Default for BackdropMap {
    fn default() -> Self {
        Self::single("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"(
        default: "hallway",
        backdrops: {
            "hidden_spot": ["S1", "S3"],
            "confrontation": ["S6"],
        },
    )"#;

    #[test]
    fn listed_and_default_nodes() {
        let map = BackdropMap::parse_ron(MAP).unwrap();
        assert_eq!(map.for_node("S1"), "hidden_spot");
        assert_eq!(map.for_node("S6"), "confrontation");
        assert_eq!(map.for_node("S0"), "hallway");
        assert_eq!(map.default_backdrop(), "hallway");
        assert!(map.lists("S1"));
        assert!(!map.lists("S0"));
    }

    #[test]
    fn change_detection() {
        let map = BackdropMap::parse_ron(MAP).unwrap();
        assert_eq!(map.change_for(None, "S0"), Some("hallway"));
        assert_eq!(map.change_for(Some("hallway"), "S2"), None);
        assert_eq!(map.change_for(Some("hallway"), "S3"), Some("hidden_spot"));
        assert_eq!(map.change_for(Some("hidden_spot"), "S1"), None);
    }

    #[test]
    fn manual_construction() {
        let mut map = BackdropMap::single("room");
        map.insert("X", "roof");
        assert_eq!(map.for_node("X"), "roof");
        assert_eq!(map.for_node("Y"), "room");
    }
}
