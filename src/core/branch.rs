/// Branch evaluator — picks the first conditional route whose predicate holds.
use crate::core::state::StateStore;
use crate::schema::choice::{ConditionalBranch, Operand};
use crate::schema::node::NodeId;

/// Evaluate branches in order against current state.
///
/// Returns the target of the first branch whose predicate holds. A branch
/// naming an unknown variable on either side evaluates false and is logged.
pub fn evaluate<'a>(branches: &'a [ConditionalBranch], store: &StateStore) -> Option<&'a NodeId> {
    branches
        .iter()
        .find(|branch| holds(branch, store))
        .map(|branch| &branch.target)
}

/// Whether a single predicate holds.
pub fn holds(branch: &ConditionalBranch, store: &StateStore) -> bool {
    let left = match store.as_number(&branch.variable) {
        Ok(x) => x,
        Err(e) => {
            tracing::warn!(target_node = %branch.target, error = %e, "branch predicate skipped");
            return false;
        }
    };
    let right = match branch.against {
        Operand::Literal(x) => x,
        Operand::Variable(ref name) => match store.as_number(name) {
            Ok(x) => x,
            Err(e) => {
                tracing::warn!(target_node = %branch.target, error = %e, "branch predicate skipped");
                return false;
            }
        },
    };

    let result = branch.comparator.compare(left, right);
    tracing::trace!(
        variable = %branch.variable,
        op = branch.comparator.symbol(),
        left,
        right,
        result,
        "branch predicate"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::StateSchema;
    use crate::schema::choice::Comparator;
    use std::sync::Arc;

    fn store(tension: f64) -> StateStore {
        let schema = StateSchema::parse_ron(
            r#"[
                (name: "tension", default: Float(45.0), bounds: Some((0.0, 100.0))),
                (name: "calledHelp", default: Bool(false)),
                (name: "threshold", default: Float(70.0)),
            ]"#,
        )
        .unwrap();
        StateStore::new(Arc::new(schema), tension)
    }

    fn branch(variable: &str, comparator: Comparator, against: Operand, target: &str) -> ConditionalBranch {
        ConditionalBranch {
            variable: variable.to_string(),
            comparator,
            against,
            target: NodeId::from(target),
        }
    }

    /// The S10 pair: calm below 70 goes one way, above 69 the other.
    fn interruption_pair() -> Vec<ConditionalBranch> {
        vec![
            branch("tension", Comparator::LessThan, Operand::Literal(70.0), "S18"),
            branch("tension", Comparator::GreaterThan, Operand::Literal(69.0), "S17"),
        ]
    }

    #[test]
    fn first_match_wins() {
        let branches = interruption_pair();
        assert_eq!(evaluate(&branches, &store(69.5)).map(|n| n.as_str()), Some("S18"));
        assert_eq!(evaluate(&branches, &store(72.0)).map(|n| n.as_str()), Some("S17"));
    }

    #[test]
    fn no_match_returns_none() {
        let branches = vec![branch("tension", Comparator::GreaterThan, Operand::Literal(70.0), "S17")];
        assert!(evaluate(&branches, &store(70.0)).is_none());
        assert!(evaluate(&[], &store(99.0)).is_none());
    }

    #[test]
    fn booleans_compare_as_numbers() {
        let mut s = store(45.0);
        let branches = vec![branch("calledHelp", Comparator::EqualTo, Operand::Literal(1.0), "S18")];
        assert!(evaluate(&branches, &s).is_none());
        s.set_bool("calledHelp", true).unwrap();
        assert_eq!(evaluate(&branches, &s).map(|n| n.as_str()), Some("S18"));
    }

    #[test]
    fn variable_operand_resolves_against_state() {
        let branches = vec![branch(
            "tension",
            Comparator::GreaterThan,
            Operand::Variable("threshold".to_string()),
            "S17",
        )];
        assert!(evaluate(&branches, &store(71.0)).is_some());
        assert!(evaluate(&branches, &store(60.0)).is_none());
    }

    #[test]
    fn unknown_variable_is_skipped_not_fatal() {
        let branches = vec![
            branch("ghost", Comparator::GreaterThan, Operand::Literal(0.0), "S17"),
            branch("tension", Comparator::EqualTo, Operand::Variable("phantom".to_string()), "S17"),
            branch("tension", Comparator::GreaterThan, Operand::Literal(10.0), "S6"),
        ];
        assert_eq!(evaluate(&branches, &store(45.0)).map(|n| n.as_str()), Some("S6"));
    }
}
