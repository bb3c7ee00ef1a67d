//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up a client over an in-memory
//! store and common node payloads.

use noderepo_core::{Config, DatabaseClient, GenerationDatabase, Node, NodeState};
use noderepo_store::{CoordinationStore, InMemoryStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A database client over its own in-memory store.
pub struct TestDatabase {
    /// The client instance.
    pub client: DatabaseClient,
    /// The backing store, for inspecting or mutating state behind the
    /// client's back.
    pub store: Arc<InMemoryStore>,
}

impl TestDatabase {
    /// Creates a client with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates a client with `config`.
    pub fn with_config(config: &Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let client = DatabaseClient::open(store.clone(), config)
            .expect("Failed to open database client");
        Self { client, store }
    }

    /// Creates a client whose generation counter starts at `generation`.
    pub fn seeded(generation: u64) -> Self {
        Self::with_config(&Config::new().initial_generation(generation))
    }

    /// Opens a second client over the same store, as another process would.
    pub fn reopen(&self, config: &Config) -> DatabaseClient {
        let store: Arc<dyn CoordinationStore> = self.store.clone();
        DatabaseClient::open(store, config).expect("Failed to reopen database client")
    }

    /// Returns the generation database under the client.
    pub fn db(&self) -> &GenerationDatabase {
        self.client.database()
    }

    /// Returns the current generation as a plain number.
    pub fn generation(&self) -> u64 {
        self.db()
            .generation()
            .expect("Failed to read generation")
            .as_u64()
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = DatabaseClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Runs a test with a client over a fresh in-memory store.
pub fn with_test_client<F, R>(f: F) -> R
where
    F: FnOnce(&DatabaseClient) -> R,
{
    let test_db = TestDatabase::new();
    f(&test_db.client)
}

/// A node description serialized into node payloads by tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Hostname, repeated in the payload.
    pub hostname: String,
    /// Resource flavor name.
    pub flavor: String,
    /// Owning application, if allocated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl NodeSpec {
    /// Parses a node payload produced by [`json_node`].
    pub fn from_node(node: &Node) -> Self {
        serde_json::from_slice(node.payload()).expect("Failed to parse node payload")
    }
}

/// Creates a provisioned node whose payload is a JSON [`NodeSpec`].
pub fn json_node(hostname: &str, flavor: &str) -> Node {
    let spec = NodeSpec {
        hostname: hostname.to_string(),
        flavor: flavor.to_string(),
        owner: None,
    };
    let payload = serde_json::to_vec(&spec).expect("Failed to serialize node spec");
    Node::new(hostname, NodeState::Provisioned, payload)
}

/// Creates `count` JSON nodes named `host0`, `host1`, ...
pub fn json_nodes(count: usize, flavor: &str) -> Vec<Node> {
    (0..count)
        .map(|i| json_node(&format!("host{i}"), flavor))
        .collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a client with `count` nodes in the ready state.
    pub fn ready_nodes(count: usize) -> TestDatabase {
        let test_db = TestDatabase::new();
        test_db
            .client
            .add_nodes_in_state(&json_nodes(count, "default"), NodeState::Ready)
            .expect("Failed to add nodes");
        test_db
    }

    /// Creates a client with `per_state` nodes in every state.
    pub fn nodes_in_every_state(per_state: usize) -> TestDatabase {
        let test_db = TestDatabase::new();
        for state in NodeState::ALL {
            let nodes: Vec<_> = (0..per_state)
                .map(|i| json_node(&format!("{state}-{i}"), "default"))
                .collect();
            test_db
                .client
                .add_nodes_in_state(&nodes, state)
                .expect("Failed to add nodes");
        }
        test_db
    }
}
