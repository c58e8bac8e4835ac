/// Dialogue graph — immutable node set, validated once at load time.
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::core::state::StateSchema;
use crate::schema::choice::Operand;
use crate::schema::node::{DialogueNode, NodeId};
use crate::schema::value::VarKind;

/// One structural problem found while loading a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    DuplicateNode(NodeId),
    DanglingTarget {
        node: NodeId,
        choice: usize,
        target: NodeId,
    },
    DanglingBranchTarget {
        node: NodeId,
        choice: usize,
        branch: usize,
        target: NodeId,
    },
    MissingStart(NodeId),
    /// An ending named by configuration has no node to show.
    MissingEnding(NodeId),
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNode(id) => write!(f, "duplicate node key '{}'", id),
            Self::DanglingTarget {
                node,
                choice,
                target,
            } => write!(
                f,
                "node '{}' choice {} targets missing node '{}'",
                node, choice, target
            ),
            Self::DanglingBranchTarget {
                node,
                choice,
                branch,
                target,
            } => write!(
                f,
                "node '{}' choice {} branch {} targets missing node '{}'",
                node, choice, branch, target
            ),
            Self::MissingStart(id) => write!(f, "start node '{}' does not exist", id),
            Self::MissingEnding(id) => write!(f, "ending node '{}' does not exist", id),
        }
    }
}

/// Every integrity issue found in one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport(pub Vec<IntegrityIssue>);

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} issue(s)", self.0.len())?;
        for issue in &self.0 {
            write!(f, "; {}", issue)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph integrity error: {0}")]
    Integrity(IntegrityReport),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// A variable reference that does not resolve against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableIssue {
    pub node: NodeId,
    pub choice: usize,
    pub variable: String,
    pub problem: VariableProblem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableProblem {
    Unknown,
    KindMismatch { declared: VarKind, used_as: VarKind },
}

impl fmt::Display for VariableIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            VariableProblem::Unknown => write!(
                f,
                "node '{}' choice {} references unknown variable '{}'",
                self.node, self.choice, self.variable
            ),
            VariableProblem::KindMismatch { declared, used_as } => write!(
                f,
                "node '{}' choice {} uses {} variable '{}' as {}",
                self.node, self.choice, declared, self.variable, used_as
            ),
        }
    }
}

/// The authored story graph. Nodes are owned here and only ever
/// referenced by key during traversal.
#[derive(Debug, Clone)]
pub struct DialogueGraph {
    nodes: Vec<DialogueNode>,
    index: FxHashMap<NodeId, usize>,
    start: NodeId,
}

impl DialogueGraph {
    /// Build a graph, checking keys, targets and the start node.
    ///
    /// All issues are collected before failing so authors see the full list.
    pub fn load(nodes: Vec<DialogueNode>, start: NodeId) -> Result<DialogueGraph, GraphError> {
        let mut issues = Vec::new();
        let mut index = FxHashMap::default();

        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                issues.push(IntegrityIssue::DuplicateNode(node.id.clone()));
            }
        }

        if !index.contains_key(&start) {
            issues.push(IntegrityIssue::MissingStart(start.clone()));
        }

        for node in &nodes {
            for (c, choice) in node.choices.iter().enumerate() {
                if let Some(ref target) = choice.next {
                    if !index.contains_key(target) {
                        issues.push(IntegrityIssue::DanglingTarget {
                            node: node.id.clone(),
                            choice: c,
                            target: target.clone(),
                        });
                    }
                }
                for (b, branch) in choice.branches.iter().enumerate() {
                    if !index.contains_key(&branch.target) {
                        issues.push(IntegrityIssue::DanglingBranchTarget {
                            node: node.id.clone(),
                            choice: c,
                            branch: b,
                            target: branch.target.clone(),
                        });
                    }
                }
            }
        }

        if !issues.is_empty() {
            return Err(GraphError::Integrity(IntegrityReport(issues)));
        }

        tracing::debug!(nodes = nodes.len(), start = %start, "dialogue graph loaded");
        Ok(DialogueGraph {
            nodes,
            index,
            start,
        })
    }

    /// Load a graph from a RON file holding a list of nodes.
    pub fn load_from_ron(path: &Path, start: NodeId) -> Result<DialogueGraph, GraphError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents, start)
    }

    pub fn parse_ron(input: &str, start: NodeId) -> Result<DialogueGraph, GraphError> {
        let nodes: Vec<DialogueNode> = ron::from_str(input)?;
        Self::load(nodes, start)
    }

    pub fn lookup(&self, id: &str) -> Option<&DialogueNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn start_id(&self) -> &NodeId {
        &self.start
    }

    pub fn start(&self) -> &DialogueNode {
        // The start key is checked in `load`.
        &self.nodes[self.index[&self.start]]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DialogueNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node keys reachable from the start through static and branch
    /// targets, in discovery order.
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut stack = vec![self.start.clone()];

        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(node) = self.lookup(id.as_str()) {
                for choice in node.choices.iter().rev() {
                    for target in choice.targets() {
                        if !seen.contains(target) {
                            stack.push(target.clone());
                        }
                    }
                }
            }
            order.push(id);
        }
        order
    }

    /// Nodes no path from the start can reach.
    pub fn unreachable(&self) -> Vec<NodeId> {
        let reachable: FxHashSet<NodeId> = self.reachable().into_iter().collect();
        self.nodes
            .iter()
            .filter(|n| !reachable.contains(&n.id))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Cross-check every effect and branch variable against a schema.
    pub fn check_variables(&self, schema: &StateSchema) -> Vec<VariableIssue> {
        let mut issues = Vec::new();

        for node in &self.nodes {
            for (c, choice) in node.choices.iter().enumerate() {
                let mut report = |variable: &str, problem: VariableProblem| {
                    issues.push(VariableIssue {
                        node: node.id.clone(),
                        choice: c,
                        variable: variable.to_string(),
                        problem,
                    });
                };

                for effect in &choice.effects {
                    match schema.kind_of(effect.variable()) {
                        None => report(effect.variable(), VariableProblem::Unknown),
                        Some(declared) if declared != effect.kind() => report(
                            effect.variable(),
                            VariableProblem::KindMismatch {
                                declared,
                                used_as: effect.kind(),
                            },
                        ),
                        Some(_) => {}
                    }
                }

                // Predicates accept any kind, so only existence matters.
                for branch in &choice.branches {
                    if schema.decl(&branch.variable).is_none() {
                        report(&branch.variable, VariableProblem::Unknown);
                    }
                    if let Operand::Variable(ref rhs) = branch.against {
                        if schema.decl(rhs).is_none() {
                            report(rhs, VariableProblem::Unknown);
                        }
                    }
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"[
        (
            id: "A",
            text: "Start.",
            choices: [
                (text: "go b", next: Some("B")),
                (
                    text: "go c",
                    next: Some("C"),
                    branches: [
                        (variable: "tension", comparator: GreaterThan, against: Literal(50.0), target: "D"),
                    ],
                ),
            ],
        ),
        (id: "B", text: "B.", ending: Some((title: "Bee", good: true))),
        (id: "C", text: "C.", choices: [(text: "back", next: Some("A"))]),
        (id: "D", text: "D."),
        (id: "Z", text: "Island."),
    ]"#;

    #[test]
    fn loads_small_graph() {
        let graph = DialogueGraph::parse_ron(SMALL, NodeId::from("A")).unwrap();
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.start().id.as_str(), "A");
        assert!(graph.lookup("B").unwrap().is_terminal());
        assert!(graph.lookup("missing").is_none());
    }

    #[test]
    fn reachability_follows_branches() {
        let graph = DialogueGraph::parse_ron(SMALL, NodeId::from("A")).unwrap();
        let reachable: Vec<String> = graph.reachable().into_iter().map(|n| n.0).collect();
        assert_eq!(reachable.len(), 4);
        assert!(reachable.contains(&"D".to_string()));
        assert_eq!(graph.unreachable(), vec![NodeId::from("Z")]);
    }

    #[test]
    fn reports_every_dangling_reference() {
        let input = r#"[
            (
                id: "A",
                text: "Start.",
                choices: [
                    (text: "one", next: Some("NOPE")),
                    (
                        text: "two",
                        next: Some("A"),
                        branches: [
                            (variable: "tension", comparator: LessThan, against: Literal(1.0), target: "GONE"),
                        ],
                    ),
                ],
            ),
            (id: "A", text: "Again."),
        ]"#;
        let err = DialogueGraph::parse_ron(input, NodeId::from("START")).unwrap_err();
        let GraphError::Integrity(report) = err else {
            panic!("expected integrity error");
        };
        assert_eq!(report.0.len(), 4);
        assert!(report.0.contains(&IntegrityIssue::DuplicateNode(NodeId::from("A"))));
        assert!(report.0.contains(&IntegrityIssue::MissingStart(NodeId::from("START"))));
        assert!(report.0.contains(&IntegrityIssue::DanglingTarget {
            node: NodeId::from("A"),
            choice: 0,
            target: NodeId::from("NOPE"),
        }));
        assert!(report.0.contains(&IntegrityIssue::DanglingBranchTarget {
            node: NodeId::from("A"),
            choice: 1,
            branch: 0,
            target: NodeId::from("GONE"),
        }));
        assert!(report.to_string().contains("NOPE"));
    }

    #[test]
    fn variable_cross_check() {
        let schema = StateSchema::parse_ron(
            r#"[
                (name: "tension", default: Float(45.0), bounds: Some((0.0, 100.0))),
                (name: "flag", default: Bool(false)),
            ]"#,
        )
        .unwrap();
        let input = r#"[
            (
                id: "A",
                text: "Start.",
                choices: [
                    (
                        text: "one",
                        effects: [
                            SetBool(variable: "flag", value: true),
                            AddInt(variable: "flag", delta: 1),
                            AddFloat(variable: "ghost", delta: 1.0),
                        ],
                        next: Some("A"),
                        branches: [
                            (variable: "tension", comparator: EqualTo, against: Variable("phantom"), target: "A"),
                        ],
                    ),
                ],
            ),
        ]"#;
        let graph = DialogueGraph::parse_ron(input, NodeId::from("A")).unwrap();
        let issues = graph.check_variables(&schema);
        assert_eq!(issues.len(), 3);
        assert_eq!(
            issues[0].problem,
            VariableProblem::KindMismatch {
                declared: VarKind::Bool,
                used_as: VarKind::Int
            }
        );
        assert_eq!(issues[1].variable, "ghost");
        assert_eq!(issues[2].variable, "phantom");
    }
}
