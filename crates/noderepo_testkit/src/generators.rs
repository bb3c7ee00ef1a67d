//! Property-based test generators using proptest.
//!
//! Provides strategies for store paths, node states and scripts of client
//! writes and reads.

use noderepo_core::NodeState;
use noderepo_store::Path;
use proptest::prelude::*;

/// Strategy for generating a single valid path segment.
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_.:-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating non-root paths of depth 1 to 4.
pub fn path_strategy() -> impl Strategy<Value = Path> {
    prop::collection::vec(segment_strategy(), 1..5).prop_map(|segments| {
        segments
            .iter()
            .fold(Path::root(), |path, segment| path.append(segment))
    })
}

/// Strategy for generating node states.
pub fn node_state_strategy() -> impl Strategy<Value = NodeState> {
    prop::sample::select(NodeState::ALL.to_vec())
}

/// Strategy for generating hostnames from a small pool, so scripts touch
/// the same nodes repeatedly.
pub fn hostname_strategy() -> impl Strategy<Value = String> {
    (0u8..8).prop_map(|i| format!("host{i}.example.com"))
}

/// A step of a client script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Add a node in a state, unless it already exists.
    Add {
        /// Node hostname
        hostname: String,
        /// Target state
        state: NodeState,
    },
    /// Move an existing node to another state.
    Move {
        /// Node hostname
        hostname: String,
        /// Target state
        state: NodeState,
    },
    /// Remove an existing node.
    Remove {
        /// Node hostname
        hostname: String,
    },
    /// Read all nodes and compare with the model.
    Read,
}

/// Strategy for generating a single script step.
pub fn script_step_strategy() -> impl Strategy<Value = ScriptStep> {
    prop_oneof![
        3 => (hostname_strategy(), node_state_strategy())
            .prop_map(|(hostname, state)| ScriptStep::Add { hostname, state }),
        3 => (hostname_strategy(), node_state_strategy())
            .prop_map(|(hostname, state)| ScriptStep::Move { hostname, state }),
        1 => hostname_strategy().prop_map(|hostname| ScriptStep::Remove { hostname }),
        3 => Just(ScriptStep::Read),
    ]
}

/// Strategy for generating a script of client writes and reads.
pub fn script_strategy(max_len: usize) -> impl Strategy<Value = Vec<ScriptStep>> {
    prop::collection::vec(script_step_strategy(), 1..max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{json_node, TestDatabase};
    use noderepo_core::{NestedTransaction, Node};
    use noderepo_store::{CoordinationStore, StoreOperation};
    use std::collections::BTreeMap;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn generated_paths_roundtrip_through_strings(path in path_strategy()) {
            prop_assert_eq!(Path::from_string(&path.to_string()), path);
        }

        /// Reads that start after a write returned never see older data.
        #[test]
        fn reads_after_writes_match_model(script in script_strategy(40)) {
            let test_db = TestDatabase::new();
            let mut model: BTreeMap<String, NodeState> = BTreeMap::new();

            for step in script {
                match step {
                    ScriptStep::Add { hostname, state } => {
                        let result = test_db.add_nodes_in_state(&[json_node(&hostname, "s")], state);
                        prop_assert_eq!(result.is_ok(), !model.contains_key(&hostname));
                        model.entry(hostname).or_insert(state);
                    }
                    ScriptStep::Move { hostname, state } => {
                        if let Some(current) = model.get_mut(&hostname) {
                            let node = test_db.read_node(&hostname, &[]).unwrap().unwrap();
                            test_db.write_to_now(state, &[node]).unwrap();
                            *current = state;
                        }
                    }
                    ScriptStep::Remove { hostname } => {
                        if model.remove(&hostname).is_some() {
                            let node = test_db.read_node(&hostname, &[]).unwrap().unwrap();
                            test_db.remove_nodes(&[node]).unwrap();
                        }
                    }
                    ScriptStep::Read => {
                        let nodes = test_db.read_nodes(&[]).unwrap();
                        let seen: BTreeMap<String, NodeState> = nodes
                            .iter()
                            .map(|n: &Node| (n.hostname().to_string(), n.state()))
                            .collect();
                        prop_assert_eq!(&seen, &model);
                    }
                }
            }
        }

        /// Every commit attempt advances the counter, whether it succeeds or not.
        #[test]
        fn counter_advances_on_every_commit(outcomes in prop::collection::vec(any::<bool>(), 1..20)) {
            let test_db = TestDatabase::new();
            let scratch = Path::from_string("/scratch");
            test_db.store.create(&scratch).unwrap();

            for (i, succeed) in outcomes.into_iter().enumerate() {
                let before = test_db.generation();
                let target = if succeed {
                    scratch.append(format!("n{i}"))
                } else {
                    Path::from_string("/missing/parent").append(format!("n{i}"))
                };

                let mut nested = NestedTransaction::new();
                test_db.db().new_transaction_in(&mut nested).create(target).unwrap();
                prop_assert_eq!(nested.commit().is_ok(), succeed);
                prop_assert_eq!(test_db.generation(), before + 1);
            }
        }

        /// A session keeps answering with what it first saw.
        #[test]
        fn session_reads_are_stable(
            paths in prop::collection::vec(path_strategy(), 1..8),
            payload in prop::collection::vec(any::<u8>(), 0..32),
        ) {
            let test_db = TestDatabase::new();
            let session = test_db.db().session().unwrap();
            let first: Vec<_> = paths
                .iter()
                .map(|p| (session.children(p).unwrap(), session.data(p).unwrap()))
                .collect();

            for path in &paths {
                test_db.store.create(path).unwrap();
                test_db
                    .store
                    .commit(&[StoreOperation::SetData { path: path.clone(), data: payload.clone() }])
                    .unwrap();
            }

            for (path, (children, data)) in paths.iter().zip(first) {
                prop_assert_eq!(session.children(path).unwrap(), children);
                prop_assert_eq!(session.data(path).unwrap(), data);
            }
        }
    }
}
