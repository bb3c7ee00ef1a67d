//! Benchmark utilities.

#![warn(missing_docs)]

use noderepo_core::{Config, DatabaseClient, Node, NodeState};
use noderepo_store::InMemoryStore;
use rand::Rng;
use std::sync::Arc;

/// Generate random payload bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate provisioned nodes with random payloads.
pub fn generate_nodes(count: usize, payload_size: usize) -> Vec<Node> {
    (0..count)
        .map(|i| {
            Node::new(
                format!("host{i}.example.com"),
                NodeState::Provisioned,
                random_data(payload_size),
            )
        })
        .collect()
}

/// Open a client over a fresh in-memory store with `nodes` ready nodes.
pub fn populated_client(nodes: usize, use_cache: bool) -> DatabaseClient {
    let config = Config::new().use_cache(use_cache);
    let client = DatabaseClient::open(Arc::new(InMemoryStore::new()), &config).unwrap();
    if nodes > 0 {
        client
            .add_nodes_in_state(&generate_nodes(nodes, 256), NodeState::Ready)
            .unwrap();
    }
    client
}
