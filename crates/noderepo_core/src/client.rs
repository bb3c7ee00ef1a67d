//! Node repository operations expressed as store paths.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/generation                 change counter
//! <root>/<state>/<hostname>         node payloads, one directory per state
//! <root>/applications/<id>          application payloads
//! <root>/loadBalancers/<id>         load balancer payloads
//! <root>/locks/<id>                 per-application locks
//! <root>/locks/unallocatedLock      lock over unallocated nodes
//! <root>/provisionIndexCounter      provision index counter
//! ```

use crate::cache::{VersionedCache, VersionedEntry};
use crate::config::Config;
use crate::database::{GenerationDatabase, Lock};
use crate::error::{CoreError, CoreResult};
use crate::session::Session;
use crate::stats::ClientStats;
use crate::transaction::NestedTransaction;
use crate::types::{ApplicationId, LoadBalancerId, Node, NodeState};
use bytes::Bytes;
use noderepo_store::{CoordinationStore, Counter, Path};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const APPLICATIONS: &str = "applications";
const LOAD_BALANCERS: &str = "loadBalancers";
const LOCKS: &str = "locks";
const UNALLOCATED_LOCK: &str = "unallocatedLock";
const PROVISION_INDEX_COUNTER: &str = "provisionIndexCounter";

/// Reads and writes nodes, applications and load balancers.
///
/// Reads go through the current generation session. Node lists per state
/// are additionally cached in decoded form until the generation moves.
/// Writes are queued into a caller-supplied [`NestedTransaction`], except for
/// the `*_now` conveniences which commit immediately.
///
/// Read-modify-write sequences must hold the matching lock:
/// [`DatabaseClient::lock_application`] for an application's nodes and
/// [`DatabaseClient::lock_unallocated`] for nodes owned by no application.
///
/// Hostnames, application IDs and load balancer IDs each name one store
/// node. Any operation given an empty name, or one containing `/`, fails
/// with [`CoreError::InvalidOperation`] before touching the store.
pub struct DatabaseClient {
    db: GenerationDatabase,
    root: Path,
    node_cache: VersionedCache<Arc<Vec<Node>>>,
    provision_index_counter: Counter,
    default_lock_timeout: Duration,
}

impl DatabaseClient {
    /// Opens the repository under `config.root`, creating missing directories.
    ///
    /// Directories that already exist are left alone and do not advance the
    /// generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn open(store: Arc<dyn CoordinationStore>, config: &Config) -> CoreResult<Self> {
        let db = GenerationDatabase::open(Arc::clone(&store), config)?;
        let client = Self {
            root: config.root.clone(),
            node_cache: VersionedCache::new(config.node_cache_size),
            provision_index_counter: Counter::new(
                store,
                config.root.append(PROVISION_INDEX_COUNTER),
            ),
            default_lock_timeout: config.default_lock_timeout,
            db,
        };
        client.init_directories()?;
        Ok(client)
    }

    fn init_directories(&self) -> CoreResult<()> {
        let directories = NodeState::ALL
            .iter()
            .map(|state| self.state_path(*state))
            .chain([APPLICATIONS, LOAD_BALANCERS, LOCKS].map(|dir| self.root.append(dir)));
        for path in directories {
            if self.db.create(&path)? {
                info!(%path, "created directory");
            }
        }
        Ok(())
    }

    /// Returns the underlying generation database.
    #[must_use]
    pub fn database(&self) -> &GenerationDatabase {
        &self.db
    }

    /// Returns the root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the lock timeout configured for callers without their own.
    #[must_use]
    pub fn default_lock_timeout(&self) -> Duration {
        self.default_lock_timeout
    }

    // ---- nodes ----

    /// Adds new nodes in `state` and commits immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateNode`] if a hostname repeats within
    /// `nodes` or already exists in any state.
    pub fn add_nodes_in_state(&self, nodes: &[Node], state: NodeState) -> CoreResult<Vec<Node>> {
        ensure_unique_hostnames(nodes)?;
        for node in nodes {
            for existing in NodeState::ALL {
                if self.db.exists(&self.node_path(existing, node.hostname())?)? {
                    return Err(CoreError::DuplicateNode {
                        hostname: node.hostname().to_string(),
                    });
                }
            }
        }

        let mut nested = NestedTransaction::new();
        let txn = self.db.new_transaction_in(&mut nested);
        let mut added = Vec::with_capacity(nodes.len());
        for node in nodes {
            let node = node.with_state(state);
            txn.create_with_data(self.node_path(state, node.hostname())?, node.payload().to_vec())?;
            added.push(node);
        }
        nested.commit()?;
        debug!(count = added.len(), %state, "added nodes");
        Ok(added)
    }

    /// Queues moving `nodes` to `state`, or rewriting them in place if they
    /// are already there, and returns the nodes as they will be stored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateNode`] if a hostname repeats within
    /// `nodes`, or an error if `nested` no longer accepts operations.
    pub fn write_to(
        &self,
        state: NodeState,
        nodes: &[Node],
        nested: &mut NestedTransaction,
    ) -> CoreResult<Vec<Node>> {
        ensure_unique_hostnames(nodes)?;
        let txn = self.db.new_transaction_in(nested);
        let mut written = Vec::with_capacity(nodes.len());
        for node in nodes {
            let target = self.node_path(state, node.hostname())?;
            if node.state() == state {
                txn.set_data(target, node.payload().to_vec())?;
            } else {
                txn.delete(self.node_path(node.state(), node.hostname())?)?;
                txn.create_with_data(target, node.payload().to_vec())?;
            }
            written.push(node.with_state(state));
        }
        Ok(written)
    }

    /// Moves `nodes` to `state` and commits immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is moved in that case.
    pub fn write_to_now(&self, state: NodeState, nodes: &[Node]) -> CoreResult<Vec<Node>> {
        let mut nested = NestedTransaction::new();
        let written = self.write_to(state, nodes, &mut nested)?;
        nested.commit()?;
        Ok(written)
    }

    /// Removes `nodes` from the state each of them is in and commits.
    ///
    /// # Errors
    ///
    /// Returns an error if any node does not exist in its recorded state.
    pub fn remove_nodes(&self, nodes: &[Node]) -> CoreResult<()> {
        let mut nested = NestedTransaction::new();
        let txn = self.db.new_transaction_in(&mut nested);
        for node in nodes {
            txn.delete(self.node_path(node.state(), node.hostname())?)?;
        }
        nested.commit()?;
        debug!(count = nodes.len(), "removed nodes");
        Ok(())
    }

    /// Returns all nodes in `states`, or in every state if `states` is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn read_nodes(&self, states: &[NodeState]) -> CoreResult<Vec<Node>> {
        let states: &[NodeState] = if states.is_empty() {
            &NodeState::ALL
        } else {
            states
        };
        let session = self.db.session()?;
        let mut nodes = Vec::new();
        for state in states {
            nodes.extend(self.read_state(&*session, *state)?.iter().cloned());
        }
        Ok(nodes)
    }

    /// Returns the node named `hostname` if it is in one of `states`, or in
    /// any state if `states` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if `hostname` is empty or
    /// contains `/`, or an error if the store cannot be read.
    pub fn read_node(&self, hostname: &str, states: &[NodeState]) -> CoreResult<Option<Node>> {
        let states: &[NodeState] = if states.is_empty() {
            &NodeState::ALL
        } else {
            states
        };
        let session = self.db.session()?;
        for state in states {
            if let Some(payload) = session.data(&self.node_path(*state, hostname)?)? {
                return Ok(Some(Node::new(hostname, *state, payload)));
            }
        }
        Ok(None)
    }

    fn read_state(&self, session: &dyn Session, state: NodeState) -> CoreResult<Arc<Vec<Node>>> {
        let dir = self.state_path(state);
        let load = || -> CoreResult<Arc<Vec<Node>>> {
            let mut nodes = Vec::new();
            for hostname in session.children(&dir)?.iter() {
                // Gone since the listing; only possible without caching.
                if let Some(payload) = session.data(&dir.child(hostname)?)? {
                    nodes.push(Node::new(hostname.as_str(), state, payload));
                }
            }
            Ok(Arc::new(nodes))
        };

        if !self.db.use_cache() {
            return load();
        }
        let version = session.generation().as_u64();
        self.node_cache.get(&dir, version, || {
            load().map(|nodes| VersionedEntry::new(nodes, version))
        })
    }

    // ---- applications ----

    /// Queues writing the payload of application `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or `nested` no longer
    /// accepts operations.
    pub fn write_application(
        &self,
        id: &ApplicationId,
        payload: impl Into<Vec<u8>>,
        nested: &mut NestedTransaction,
    ) -> CoreResult<()> {
        self.write_entry(self.application_path(id)?, payload.into(), nested)
    }

    /// Queues removal of application `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `nested` no longer accepts operations.
    pub fn remove_application(
        &self,
        id: &ApplicationId,
        nested: &mut NestedTransaction,
    ) -> CoreResult<()> {
        let path = self.application_path(id)?;
        self.db.new_transaction_in(nested).delete(path)
    }

    /// Returns the payload of application `id`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn read_application(&self, id: &ApplicationId) -> CoreResult<Option<Bytes>> {
        self.db.session()?.data(&self.application_path(id)?)
    }

    /// Returns the IDs of all stored applications, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn read_application_ids(&self) -> CoreResult<Vec<ApplicationId>> {
        let children = self.db.session()?.children(&self.root.append(APPLICATIONS))?;
        Ok(children.iter().map(ApplicationId::new).collect())
    }

    // ---- load balancers ----

    /// Queues writing the payload of load balancer `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or `nested` no longer
    /// accepts operations.
    pub fn write_load_balancer(
        &self,
        id: &LoadBalancerId,
        payload: impl Into<Vec<u8>>,
        nested: &mut NestedTransaction,
    ) -> CoreResult<()> {
        self.write_entry(self.load_balancer_path(id)?, payload.into(), nested)
    }

    /// Queues removal of load balancer `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `nested` no longer accepts operations.
    pub fn remove_load_balancer(
        &self,
        id: &LoadBalancerId,
        nested: &mut NestedTransaction,
    ) -> CoreResult<()> {
        let path = self.load_balancer_path(id)?;
        self.db.new_transaction_in(nested).delete(path)
    }

    /// Returns the payload of load balancer `id`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn read_load_balancer(&self, id: &LoadBalancerId) -> CoreResult<Option<Bytes>> {
        self.db.session()?.data(&self.load_balancer_path(id)?)
    }

    /// Returns the IDs of all stored load balancers, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn read_load_balancer_ids(&self) -> CoreResult<Vec<LoadBalancerId>> {
        let children = self
            .db
            .session()?
            .children(&self.root.append(LOAD_BALANCERS))?;
        Ok(children.iter().map(LoadBalancerId::new).collect())
    }

    fn write_entry(
        &self,
        path: Path,
        payload: Vec<u8>,
        nested: &mut NestedTransaction,
    ) -> CoreResult<()> {
        let exists = self.db.exists(&path)?;
        let txn = self.db.new_transaction_in(nested);
        if exists {
            txn.set_data(path, payload)
        } else {
            txn.create_with_data(path, payload)
        }
    }

    // ---- locks ----

    /// Locks application `id` for the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`] if not acquired within `timeout`.
    pub fn lock_application(&self, id: &ApplicationId, timeout: Duration) -> CoreResult<Lock> {
        let path = named_child(&self.root.append(LOCKS), id.as_str(), "application id")?;
        self.db.lock(&path, timeout)
    }

    /// Locks the set of nodes not allocated to any application.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`] if not acquired within `timeout`.
    pub fn lock_unallocated(&self, timeout: Duration) -> CoreResult<Lock> {
        self.db
            .lock(&self.root.append(LOCKS).append(UNALLOCATED_LOCK), timeout)
    }

    // ---- provision indices ----

    /// Reserves `count` consecutive provision indices.
    ///
    /// Indices are unique across all processes sharing the store. The first
    /// reservation starts at zero.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if `count` is zero, or an
    /// error if the counter cannot be updated.
    pub fn read_provision_indices(&self, count: usize) -> CoreResult<Vec<u64>> {
        if count == 0 {
            return Err(CoreError::invalid_operation(
                "must reserve at least one provision index",
            ));
        }
        let count = count as u64;
        let last = self.provision_index_counter.add(count)?;
        Ok((last - count..last).collect())
    }

    // ---- stats ----

    /// Returns statistics of the current session and the node cache.
    #[must_use]
    pub fn cache_stats(&self) -> ClientStats {
        ClientStats {
            session: self.db.cache_stats(),
            nodes: self.node_cache.stats(),
        }
    }

    fn state_path(&self, state: NodeState) -> Path {
        self.root.append(state.dir_name())
    }

    fn node_path(&self, state: NodeState, hostname: &str) -> CoreResult<Path> {
        named_child(&self.state_path(state), hostname, "hostname")
    }

    fn application_path(&self, id: &ApplicationId) -> CoreResult<Path> {
        named_child(&self.root.append(APPLICATIONS), id.as_str(), "application id")
    }

    fn load_balancer_path(&self, id: &LoadBalancerId) -> CoreResult<Path> {
        named_child(&self.root.append(LOAD_BALANCERS), id.as_str(), "load balancer id")
    }
}

impl fmt::Debug for DatabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseClient")
            .field("root", &self.root)
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

/// Names must be a single non-empty segment, so `""` and `"a/b"` never
/// resolve to the parent directory or to a nested node.
fn named_child(dir: &Path, name: &str, what: &str) -> CoreResult<Path> {
    dir.child(name).map_err(|error| {
        CoreError::invalid_operation(format!("invalid {what} {name:?}: {error}"))
    })
}

fn ensure_unique_hostnames(nodes: &[Node]) -> CoreResult<()> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !seen.insert(node.hostname()) {
            return Err(CoreError::DuplicateNode {
                hostname: node.hostname().to_string(),
            });
        }
    }
    Ok(())
}
