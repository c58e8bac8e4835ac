/// Ending rule engine — ordered global conditions that end a playthrough early.
use serde::{Deserialize, Serialize};

use crate::core::state::{StateStore, TENSION};
use crate::schema::node::NodeId;

/// A condition over world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EndingCondition {
    /// A variable whose numeric view is non-zero.
    Flag(String),
    /// A numeric variable at or above a threshold.
    AtLeast { variable: String, threshold: f64 },
}

impl EndingCondition {
    fn holds(&self, store: &StateStore) -> bool {
        let result = match self {
            Self::Flag(variable) => store.is_set(variable),
            Self::AtLeast {
                variable,
                threshold,
            } => store.as_number(variable).map(|x| x >= *threshold),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ending condition treated as false");
            false
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndingRule {
    pub when: EndingCondition,
    pub ending: NodeId,
}

/// Ordered rule list; the first rule that holds decides the ending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndingRules(pub Vec<EndingRule>);

impl EndingRules {
    /// The level-one rule set: walking away, then maximum tension, then a
    /// public post.
    pub fn standard(max_tension: f64) -> EndingRules {
        EndingRules(vec![
            EndingRule {
                when: EndingCondition::Flag("playerWalkedAway".to_string()),
                ending: NodeId::from("E0"),
            },
            EndingRule {
                when: EndingCondition::AtLeast {
                    variable: TENSION.to_string(),
                    threshold: max_tension,
                },
                ending: NodeId::from("E4"),
            },
            EndingRule {
                when: EndingCondition::Flag("socialMediaPosted".to_string()),
                ending: NodeId::from("E6"),
            },
        ])
    }

    /// The ending forced by current state, if any. Does not mutate state.
    pub fn check(&self, store: &StateStore) -> Option<&NodeId> {
        self.0
            .iter()
            .find(|rule| rule.when.holds(store))
            .map(|rule| &rule.ending)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndingRule> {
        self.0.iter()
    }

    /// Every ending key the rules can produce.
    pub fn targets(&self) -> impl Iterator<Item = &NodeId> {
        self.0.iter().map(|rule| &rule.ending)
    }
}

/// Tension at which the standard rules force the escalation ending.
pub const HARD_THRESHOLD: f64 = 85.0;

impl Default for EndingRules {
    fn default() -> Self {
        Self::standard(HARD_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::StateSchema;
    use std::sync::Arc;

    fn store() -> StateStore {
        let schema = StateSchema::parse_ron(
            r#"[
                (name: "tension", default: Float(45.0), bounds: Some((0.0, 100.0))),
                (name: "playerWalkedAway", default: Bool(false)),
                (name: "socialMediaPosted", default: Bool(false)),
            ]"#,
        )
        .unwrap();
        StateStore::new(Arc::new(schema), 45.0)
    }

    #[test]
    fn baseline_has_no_ending() {
        assert!(EndingRules::standard(85.0).check(&store()).is_none());
    }

    #[test]
    fn walked_away_outranks_max_tension() {
        let rules = EndingRules::standard(85.0);
        let mut s = store();
        s.set_bool("playerWalkedAway", true).unwrap();
        s.add_float("tension", 100.0).unwrap();
        s.set_bool("socialMediaPosted", true).unwrap();
        assert_eq!(rules.check(&s).map(|n| n.as_str()), Some("E0"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let rules = EndingRules::standard(85.0);
        let mut s = store();
        s.add_float("tension", 39.0).unwrap();
        assert!(rules.check(&s).is_none());
        s.add_float("tension", 1.0).unwrap();
        assert_eq!(rules.check(&s).map(|n| n.as_str()), Some("E4"));
    }

    #[test]
    fn default_rules_use_hard_threshold() {
        let rules = EndingRules::default();
        assert_eq!(rules, EndingRules::standard(HARD_THRESHOLD));
        let mut s = store();
        s.add_float("tension", 40.0).unwrap();
        assert_eq!(rules.check(&s).map(|n| n.as_str()), Some("E4"));
    }

    #[test]
    fn social_media_post() {
        let rules = EndingRules::standard(85.0);
        let mut s = store();
        s.set_bool("socialMediaPosted", true).unwrap();
        assert_eq!(rules.check(&s).map(|n| n.as_str()), Some("E6"));
    }

    #[test]
    fn check_is_idempotent() {
        let rules = EndingRules::standard(85.0);
        let mut s = store();
        s.set_bool("socialMediaPosted", true).unwrap();
        let before = s.to_map();
        let first = rules.check(&s).cloned();
        let second = rules.check(&s).cloned();
        assert_eq!(first, second);
        assert_eq!(before, s.to_map());
    }

    #[test]
    fn unknown_variable_never_fires() {
        let rules = EndingRules(vec![
            EndingRule {
                when: EndingCondition::Flag("missing".to_string()),
                ending: NodeId::from("E9"),
            },
            EndingRule {
                when: EndingCondition::AtLeast {
                    variable: "tension".to_string(),
                    threshold: 0.0,
                },
                ending: NodeId::from("E4"),
            },
        ]);
        assert_eq!(rules.check(&store()).map(|n| n.as_str()), Some("E4"));
    }

    #[test]
    fn parses_from_ron() {
        let rules: EndingRules = ron::from_str(
            r#"[
                (when: Flag("playerWalkedAway"), ending: "E0"),
                (when: AtLeast(variable: "tension", threshold: 85.0), ending: "E4"),
            ]"#,
        )
        .unwrap();
        assert_eq!(rules.0.len(), 2);
        assert_eq!(rules.targets().count(), 2);
    }
}
