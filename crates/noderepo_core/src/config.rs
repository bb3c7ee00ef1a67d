//! Database configuration.

use noderepo_store::Path;
use std::time::Duration;

/// Default root under which all node repository data lives.
pub const DEFAULT_ROOT: &str = "/provision/v1";

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether reads go through generation-scoped caching sessions.
    ///
    /// When false every read goes straight to the store.
    pub use_cache: bool,

    /// Maximum number of decoded node lists kept by the client.
    pub node_cache_size: usize,

    /// Lock timeout used by the client's convenience lock methods.
    pub default_lock_timeout: Duration,

    /// Root path of all node repository data.
    pub root: Path,

    /// Seed for the generation counter if it has never been written.
    pub initial_generation: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_cache: true,
            node_cache_size: 1024,
            default_lock_timeout: Duration::from_secs(60),
            root: Path::from_string(DEFAULT_ROOT),
            initial_generation: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether reads are cached per generation.
    #[must_use]
    pub const fn use_cache(mut self, value: bool) -> Self {
        self.use_cache = value;
        self
    }

    /// Sets the node cache capacity.
    #[must_use]
    pub const fn node_cache_size(mut self, size: usize) -> Self {
        self.node_cache_size = size;
        self
    }

    /// Sets the default lock timeout.
    #[must_use]
    pub const fn default_lock_timeout(mut self, timeout: Duration) -> Self {
        self.default_lock_timeout = timeout;
        self
    }

    /// Sets the root path.
    #[must_use]
    pub fn root(mut self, root: Path) -> Self {
        self.root = root;
        self
    }

    /// Seeds the generation counter when it does not exist yet.
    #[must_use]
    pub const fn initial_generation(mut self, generation: u64) -> Self {
        self.initial_generation = Some(generation);
        self
    }
}
