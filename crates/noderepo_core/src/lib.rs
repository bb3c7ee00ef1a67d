//! # Node Repository Core
//!
//! Generation-tracked persistence for the node repository.
//!
//! This crate provides:
//! - [`GenerationDatabase`] - a store wrapper whose reads are cached per
//!   generation and whose writes advance the generation
//! - [`Session`] - read access valid for one generation
//! - [`CountingTransaction`] - store writes that always advance the generation
//! - [`VersionedCache`] - size-bounded cache of version-tagged values
//! - [`DatabaseClient`] - nodes, applications, load balancers and locks laid
//!   out as store paths
//!
//! ## Consistency
//!
//! Reads are eventually consistent: a session never reflects a generation
//! older than the one observed when it was handed out, but may trail writes
//! made after that. Read-modify-write sequences must hold the relevant lock.
//!
//! ## Example
//!
//! ```rust
//! use noderepo_core::{Config, DatabaseClient, Node, NodeState};
//! use noderepo_store::InMemoryStore;
//! use std::sync::Arc;
//!
//! let client = DatabaseClient::open(Arc::new(InMemoryStore::new()), &Config::default()).unwrap();
//! let node = Node::new("host1.example.com", NodeState::Provisioned, b"{}".to_vec());
//! client.add_nodes_in_state(&[node], NodeState::Ready).unwrap();
//!
//! let ready = client.read_nodes(&[NodeState::Ready]).unwrap();
//! assert_eq!(ready.len(), 1);
//! assert_eq!(ready[0].hostname(), "host1.example.com");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod client;
mod config;
mod database;
mod error;
mod session;
mod stats;
mod transaction;
mod types;

pub use cache::{VersionedCache, VersionedEntry};
pub use client::DatabaseClient;
pub use config::{Config, DEFAULT_ROOT};
pub use database::{GenerationDatabase, Lock, GENERATION_COUNTER};
pub use error::{CoreError, CoreResult};
pub use session::{CachingSession, PassthroughSession, Session};
pub use stats::{CacheCounters, CacheStats, ClientStats, SessionStats};
pub use transaction::{
    CountingTransaction, EagerCountingTransaction, NestedTransaction, StoreTransaction,
    Transaction, TransactionState,
};
pub use types::{ApplicationId, Generation, LoadBalancerId, Node, NodeState};
