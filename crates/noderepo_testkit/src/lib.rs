//! # Node Repository Testkit
//!
//! Test utilities for the node repository.
//!
//! This crate provides:
//! - Test fixtures wiring an in-memory store to a database client
//! - A fault-injecting store wrapper
//! - Property-based test generators using proptest
//! - Stress testing utilities for concurrent readers and writers
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust
//! use noderepo_testkit::prelude::*;
//! use noderepo_core::NodeState;
//!
//! with_test_client(|client| {
//!     client.add_nodes_in_state(&[json_node("host1", "small")], NodeState::Ready).unwrap();
//!     assert_eq!(client.read_nodes(&[NodeState::Ready]).unwrap().len(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::init_tracing;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly `tracing` subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Output goes
/// through the test harness so it is only shown for failing tests. Later
/// calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
