//! # Node Repository Store
//!
//! Coordination store abstraction for the node repository.
//!
//! This crate provides the lowest-level persistence surface: a
//! ZooKeeper-shaped hierarchical store with atomic multi-operation commits,
//! reentrant distributed locks and compare-and-set. Payloads are **opaque
//! bytes** - the store does not interpret what it holds.
//!
//! ## Design Principles
//!
//! - Stores are linearizable; every commit is all-or-nothing
//! - No knowledge of node, application or load balancer records
//! - Must be `Send + Sync` for concurrent access
//! - Counters are built on compare-and-set, not on a store-specific API
//!
//! ## Contents
//!
//! - [`Path`] - Hierarchical store key
//! - [`CoordinationStore`] - The store trait
//! - [`InMemoryStore`] - For testing and single-process use
//! - [`Counter`] - Atomic `u64` counter on top of any store
//!
//! ## Example
//!
//! ```rust
//! use noderepo_store::{CoordinationStore, InMemoryStore, Path};
//!
//! let store = InMemoryStore::new();
//! let path = Path::from_string("/provision/v1/ready");
//! assert!(store.create(&path).unwrap());
//! assert!(!store.create(&path).unwrap());
//! assert_eq!(store.children(&Path::from_string("/provision/v1")).unwrap(), vec!["ready"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod counter;
mod error;
mod memory;
mod path;
mod store;

pub use counter::{Counter, MAX_CAS_ATTEMPTS};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use path::Path;
pub use store::{CoordinationStore, StoreOperation};
