//! Core type definitions for the node repository.

use bytes::Bytes;
use std::fmt;

/// Value of the global change counter.
///
/// Every write anywhere under the database root advances the generation.
/// Caches compare generations to decide whether what they hold may be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    /// Creates a new generation.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen:{}", self.0)
    }
}

/// Lifecycle state of a node. Each state is its own directory in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeState {
    /// Known to the repository but not yet usable.
    Provisioned,
    /// Clean and available for allocation.
    Ready,
    /// Allocated to an application that has not activated it yet.
    Reserved,
    /// Serving an application.
    Active,
    /// Released by an application, pending cleanup.
    Inactive,
    /// Awaiting wipe before it can be ready again.
    Dirty,
    /// Taken out of service after a failure.
    Failed,
    /// Set aside by an operator.
    Parked,
    /// Removed from service permanently.
    Deprovisioned,
}

impl NodeState {
    /// All states, in directory-creation order.
    pub const ALL: [NodeState; 9] = [
        NodeState::Provisioned,
        NodeState::Ready,
        NodeState::Reserved,
        NodeState::Active,
        NodeState::Inactive,
        NodeState::Dirty,
        NodeState::Failed,
        NodeState::Parked,
        NodeState::Deprovisioned,
    ];

    /// Returns the directory name used for this state.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            NodeState::Provisioned => "provisioned",
            NodeState::Ready => "ready",
            NodeState::Reserved => "reserved",
            NodeState::Active => "allocated",
            NodeState::Inactive => "deallocated",
            NodeState::Dirty => "dirty",
            NodeState::Failed => "failed",
            NodeState::Parked => "parked",
            NodeState::Deprovisioned => "deprovisioned",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A node record: hostname, state and an opaque serialized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    hostname: String,
    state: NodeState,
    payload: Bytes,
}

impl Node {
    /// Creates a node record.
    pub fn new(hostname: impl Into<String>, state: NodeState, payload: impl Into<Bytes>) -> Self {
        Self {
            hostname: hostname.into(),
            state,
            payload: payload.into(),
        }
    }

    /// Returns the hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the state the record was read from or is written to.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Returns the serialized payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns a copy of this node in another state.
    #[must_use]
    pub fn with_state(&self, state: NodeState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Returns a copy of this node with a new payload.
    #[must_use]
    pub fn with_payload(&self, payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..self.clone()
        }
    }
}

/// Identifies an application: `tenant:application:instance`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApplicationId(String);

impl ApplicationId {
    /// Creates an application ID from its serialized form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates an application ID from its parts.
    #[must_use]
    pub fn from_parts(tenant: &str, application: &str, instance: &str) -> Self {
        Self(format!("{tenant}:{application}:{instance}"))
    }

    /// Returns the serialized form, used as the store node name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a load balancer: the owning application plus a cluster name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadBalancerId(String);

impl LoadBalancerId {
    /// Creates a load balancer ID from its serialized form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a load balancer ID for a cluster of an application.
    #[must_use]
    pub fn for_cluster(application: &ApplicationId, cluster: &str) -> Self {
        Self(format!("{application}:{cluster}"))
    }

    /// Returns the serialized form, used as the store node name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoadBalancerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_ordering() {
        assert!(Generation::new(101) > Generation::new(100));
        assert_eq!(Generation::new(7).as_u64(), 7);
        assert_eq!(Generation::new(7).to_string(), "gen:7");
    }

    #[test]
    fn state_dir_names_are_unique() {
        let mut names: Vec<_> = NodeState::ALL.iter().map(|s| s.dir_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), NodeState::ALL.len());
    }

    #[test]
    fn node_with_state_keeps_payload() {
        let node = Node::new("host1", NodeState::Ready, b"payload".to_vec());
        let moved = node.with_state(NodeState::Active);
        assert_eq!(moved.state(), NodeState::Active);
        assert_eq!(moved.hostname(), "host1");
        assert_eq!(moved.payload(), node.payload());
    }

    #[test]
    fn ids_format_from_parts() {
        let app = ApplicationId::from_parts("tenant", "app", "default");
        assert_eq!(app.as_str(), "tenant:app:default");
        assert_eq!(
            LoadBalancerId::for_cluster(&app, "container").as_str(),
            "tenant:app:default:container"
        );
    }
}
