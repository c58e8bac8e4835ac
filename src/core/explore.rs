/// Playthrough exploration — exhaustive path enumeration and seeded random
/// walks over a story.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

use crate::core::session::Story;
use crate::core::turn::{Ending, TurnController};
use crate::schema::choice::ChoiceRef;
use crate::schema::node::NodeId;

/// Summary of every choice path from a fresh playthrough.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exploration {
    /// Paths reaching each ending.
    pub endings: BTreeMap<NodeId, usize>,
    /// Completed paths.
    pub paths: usize,
    /// Turns of the longest completed path.
    pub longest: usize,
    /// Node sequences that returned to an identical (node, state) pair.
    pub loops: Vec<Vec<NodeId>>,
    /// Paths cut off by the turn limit.
    pub truncated: usize,
}

impl Exploration {
    /// Every path ended within the limit.
    pub fn is_bounded(&self) -> bool {
        self.loops.is_empty() && self.truncated == 0
    }
}

type Visit = (NodeId, Vec<u64>);

/// Try every choice at every node, depth first.
///
/// A path is a loop when it revisits a node with exactly the state it had
/// before; such a path could repeat forever.
pub fn explore(story: &Story, max_turns: usize) -> Exploration {
    let mut out = Exploration::default();
    let root = story.controller();

    if let Some(ending) = root.ending() {
        out.paths = 1;
        *out.endings.entry(ending.id.clone()).or_default() += 1;
        return out;
    }

    let mut path = vec![root.current_node().clone()];
    let mut visited = FxHashSet::default();
    visited.insert(visit(&root));
    walk(&root, &mut path, &mut visited, max_turns, &mut out);

    tracing::debug!(
        paths = out.paths,
        endings = out.endings.len(),
        loops = out.loops.len(),
        truncated = out.truncated,
        "exploration finished"
    );
    out
}

fn visit(controller: &TurnController) -> Visit {
    (
        controller.current_node().clone(),
        controller.store().fingerprint(),
    )
}

fn walk(
    controller: &TurnController,
    path: &mut Vec<NodeId>,
    visited: &mut FxHashSet<Visit>,
    max_turns: usize,
    out: &mut Exploration,
) {
    let node = controller.current_node().clone();
    for view in controller.available_choices() {
        let mut next = controller.clone();
        let outcome = match next.select_choice(&ChoiceRef::new(node.clone(), view.index)) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(node = %node, choice = view.index, error = %e, "exploration step rejected");
                continue;
            }
        };

        if let Some(ending) = outcome.ending {
            out.paths += 1;
            out.longest = out.longest.max(next.turns());
            *out.endings.entry(ending.id).or_default() += 1;
            continue;
        }

        let key = visit(&next);
        if visited.contains(&key) {
            let mut cycle = path.clone();
            cycle.push(key.0);
            tracing::warn!(path = ?cycle, "choice loop found");
            out.loops.push(cycle);
            continue;
        }
        if next.turns() >= max_turns {
            out.truncated += 1;
            continue;
        }

        path.push(key.0.clone());
        visited.insert(key.clone());
        walk(&next, path, visited, max_turns, out);
        visited.remove(&key);
        path.pop();
    }
}

/// One randomly chosen path.
#[derive(Debug, Clone, PartialEq)]
pub struct Playthrough {
    pub choices: Vec<ChoiceRef>,
    pub ending: Option<Ending>,
    pub final_tension: f64,
}

/// Walk a single path picking uniformly among offered choices.
///
/// The same seed always yields the same path. Stops early at `max_turns`,
/// leaving `ending` empty.
pub fn random_playthrough(story: &Story, seed: u64, max_turns: usize) -> Playthrough {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut controller = story.controller();
    let mut choices = Vec::new();

    while !controller.is_ended() && choices.len() < max_turns {
        let offered = controller.available_choices();
        if offered.is_empty() {
            break;
        }
        let pick = rng.gen_range(0..offered.len());
        let choice = ChoiceRef::new(controller.current_node().clone(), offered[pick].index);
        if let Err(e) = controller.select_choice(&choice) {
            tracing::warn!(error = %e, "random playthrough stopped");
            break;
        }
        choices.push(choice);
    }

    Playthrough {
        choices,
        ending: controller.ending().cloned(),
        final_tension: controller.store().tension(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::graph::DialogueGraph;
    use crate::core::state::StateSchema;

    const STATE: &str = r#"[
        (name: "tension", default: Float(45.0), bounds: Some((0.0, 100.0))),
        (name: "playerWalkedAway", default: Bool(false)),
        (name: "socialMediaPosted", default: Bool(false)),
    ]"#;

    const ENDINGS: &str = r#"
        (id: "E0", text: "."), (id: "E2", text: "."), (id: "E4", text: "."), (id: "E6", text: "."),
    "#;

    fn story(nodes: &str) -> Story {
        let nodes = format!("[{}{}]", nodes, ENDINGS);
        Story::builder()
            .with_graph(DialogueGraph::parse_ron(&nodes, NodeId::from("A")).unwrap())
            .with_schema(StateSchema::parse_ron(STATE).unwrap())
            .with_config(EngineConfig {
                start_node: NodeId::from("A"),
                ..EngineConfig::default()
            })
            .build()
            .unwrap()
    }

    #[test]
    fn counts_paths_per_ending() {
        let story = story(
            r#"
            (id: "A", text: "a", choices: [
                (text: "left", next: Some("B")),
                (text: "right", next: Some("E2")),
            ]),
            (id: "B", text: "b", choices: [
                (text: "x", next: Some("E2")),
                (text: "y", effects: [SetBool(variable: "playerWalkedAway", value: true)]),
            ]),
            "#,
        );
        let result = explore(&story, 50);
        assert!(result.is_bounded());
        assert_eq!(result.paths, 3);
        assert_eq!(result.endings[&NodeId::from("E2")], 2);
        assert_eq!(result.endings[&NodeId::from("E0")], 1);
        assert_eq!(result.longest, 2);
    }

    #[test]
    fn zero_cost_cycle_is_a_loop() {
        let story = story(
            r#"
            (id: "A", text: "a", choices: [(text: "go", next: Some("B"))]),
            (id: "B", text: "b", choices: [
                (text: "back", next: Some("A")),
                (text: "stop", next: Some("E2")),
            ]),
            "#,
        );
        let result = explore(&story, 50);
        assert!(!result.is_bounded());
        assert_eq!(result.loops.len(), 1);
        assert_eq!(result.loops[0].first().map(|n| n.as_str()), Some("A"));
        assert_eq!(result.loops[0].last().map(|n| n.as_str()), Some("A"));
    }

    #[test]
    fn escalating_cycle_terminates() {
        let story = story(
            r#"
            (id: "A", text: "a", choices: [(text: "go", tension: 10.0, next: Some("B"))]),
            (id: "B", text: "b", choices: [(text: "back", next: Some("A"))]),
            "#,
        );
        let result = explore(&story, 50);
        assert!(result.is_bounded());
        assert_eq!(result.endings.keys().map(|k| k.as_str()).collect::<Vec<_>>(), vec!["E4"]);
    }

    #[test]
    fn turn_limit_truncates() {
        let story = story(
            r#"
            (id: "A", text: "a", choices: [(text: "go", tension: 1.0, next: Some("B"))]),
            (id: "B", text: "b", choices: [(text: "back", next: Some("A"))]),
            "#,
        );
        let result = explore(&story, 5);
        assert_eq!(result.truncated, 1);
        assert_eq!(result.paths, 0);
    }

    #[test]
    fn random_playthrough_is_deterministic() {
        let story = story(
            r#"
            (id: "A", text: "a", choices: [
                (text: "one", tension: 5.0, next: Some("B")),
                (text: "two", tension: 2.0, next: Some("B")),
            ]),
            (id: "B", text: "b", choices: [
                (text: "x", next: Some("E2")),
                (text: "y", next: Some("A")),
            ]),
            "#,
        );
        let first = random_playthrough(&story, 7, 100);
        let second = random_playthrough(&story, 7, 100);
        assert_eq!(first, second);
        assert!(first.ending.is_some());
    }
}
