use serde::{Deserialize, Serialize};
use std::fmt;

use super::node::NodeId;
use super::value::VarKind;

/// Tolerance for `EqualTo` comparisons: a relative margin with an absolute
/// floor, so values that went through float arithmetic still compare equal.
const APPROX_RELATIVE: f64 = 1e-6;
const APPROX_ABSOLUTE: f64 = 1e-5;

/// A state mutation applied unconditionally when its choice is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateEffect {
    SetBool { variable: String, value: bool },
    AddInt { variable: String, delta: i64 },
    AddFloat { variable: String, delta: f64 },
}

impl StateEffect {
    pub fn variable(&self) -> &str {
        match self {
            Self::SetBool { variable, .. }
            | Self::AddInt { variable, .. }
            | Self::AddFloat { variable, .. } => variable,
        }
    }

    /// The variable type this effect requires.
    pub fn kind(&self) -> VarKind {
        match self {
            Self::SetBool { .. } => VarKind::Bool,
            Self::AddInt { .. } => VarKind::Int,
            Self::AddFloat { .. } => VarKind::Float,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    GreaterThan,
    LessThan,
    EqualTo,
}

impl Comparator {
    pub fn compare(&self, left: f64, right: f64) -> bool {
        match self {
            Self::GreaterThan => left > right,
            Self::LessThan => left < right,
            Self::EqualTo => approximately(left, right),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::EqualTo => "==",
        }
    }
}

fn approximately(a: f64, b: f64) -> bool {
    let margin = (APPROX_RELATIVE * a.abs().max(b.abs())).max(APPROX_ABSOLUTE);
    (a - b).abs() < margin
}

/// Right-hand side of a branch predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Literal(f64),
    Variable(String),
}

/// A predicate-guarded alternate route overriding a choice's static target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    pub variable: String,
    pub comparator: Comparator,
    pub against: Operand,
    pub target: NodeId,
}

/// A selectable option attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    /// Added to the tension variable after the effects, clamped to its bounds.
    #[serde(default)]
    pub tension: f64,
    #[serde(default)]
    pub effects: Vec<StateEffect>,
    #[serde(default)]
    pub next: Option<NodeId>,
    /// Evaluated in order; the first match overrides `next`.
    #[serde(default)]
    pub branches: Vec<ConditionalBranch>,
    /// Presentation hint forwarded with the selection (sound, animation).
    #[serde(default)]
    pub cue: Option<String>,
}

impl Choice {
    pub fn has_branches(&self) -> bool {
        !self.branches.is_empty()
    }

    /// Every node key this choice can route to.
    pub fn targets(&self) -> impl Iterator<Item = &NodeId> {
        self.next
            .iter()
            .chain(self.branches.iter().map(|b| &b.target))
    }
}

/// Identifies a choice by its owning node and position in that node's list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChoiceRef {
    pub node: NodeId,
    pub index: usize,
}

impl ChoiceRef {
    pub fn new(node: impl Into<NodeId>, index: usize) -> Self {
        Self {
            node: node.into(),
            index,
        }
    }
}

impl fmt::Display for ChoiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.node, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparators_are_strict() {
        assert!(Comparator::GreaterThan.compare(71.0, 70.0));
        assert!(!Comparator::GreaterThan.compare(70.0, 70.0));
        assert!(Comparator::LessThan.compare(69.5, 70.0));
        assert!(!Comparator::LessThan.compare(70.0, 70.0));
    }

    #[test]
    fn equality_tolerates_float_drift() {
        let drifted = 0.1 + 0.2;
        assert!(Comparator::EqualTo.compare(drifted, 0.3));
        assert!(Comparator::EqualTo.compare(70.0, 70.0));
        assert!(!Comparator::EqualTo.compare(70.0, 70.1));
    }

    #[test]
    fn parse_choice_with_branches() {
        let choice: Choice = ron::from_str(
            r#"(
                text: "Stand your ground",
                tension: 10.0,
                effects: [
                    SetBool(variable: "aggressorFocusOnPlayer", value: true),
                    AddFloat(variable: "victimTrust", delta: 0.1),
                ],
                next: Some("S6"),
                branches: [
                    (variable: "tension", comparator: GreaterThan, against: Literal(70.0), target: "S17"),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(choice.effects.len(), 2);
        assert_eq!(choice.effects[0].kind(), VarKind::Bool);
        assert_eq!(choice.effects[1].variable(), "victimTrust");
        assert!(choice.has_branches());
        let targets: Vec<&str> = choice.targets().map(|t| t.as_str()).collect();
        assert_eq!(targets, vec!["S6", "S17"]);
        assert!(choice.cue.is_none());
    }

    #[test]
    fn minimal_choice_defaults() {
        let choice: Choice = ron::from_str(r#"(text: "Leave")"#).unwrap();
        assert_eq!(choice.tension, 0.0);
        assert!(choice.effects.is_empty());
        assert!(choice.next.is_none());
        assert_eq!(choice.targets().count(), 0);
    }
}
