//! Database configuration.

/// Default number of compiled views kept by the view cache.
pub const DEFAULT_VIEW_CACHE_CAPACITY: usize = 64;

/// Default document field holding the identifier.
pub const DEFAULT_IDENTIFIER_PATH: &str = "_id";

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the database already holds data.
    pub error_if_exists: bool,

    /// Whether to sync the WAL on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Maximum number of compiled views kept in the view cache. Zero
    /// disables caching.
    pub view_cache_capacity: usize,

    /// Whether generated identifiers are written back into saved documents.
    pub manage_identifier: bool,

    /// Dotted path of the identifier inside each document. `None` keeps
    /// identifiers outside the documents entirely.
    pub identifier_path: Option<String>,

    /// Whether one undecodable document fails a multi-document read.
    pub strict_reads: bool,

    /// Whether query compilation and execution log at `debug` instead of
    /// `trace`.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            view_cache_capacity: DEFAULT_VIEW_CACHE_CAPACITY,
            manage_identifier: true,
            identifier_path: Some(DEFAULT_IDENTIFIER_PATH.to_string()),
            strict_reads: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to sync the WAL on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the view cache capacity.
    #[must_use]
    pub const fn view_cache_capacity(mut self, capacity: usize) -> Self {
        self.view_cache_capacity = capacity;
        self
    }

    /// Sets whether generated identifiers are written into documents.
    #[must_use]
    pub const fn manage_identifier(mut self, value: bool) -> Self {
        self.manage_identifier = value;
        self
    }

    /// Sets the identifier path, or clears it with `None`.
    #[must_use]
    pub fn identifier_path(mut self, path: Option<&str>) -> Self {
        self.identifier_path = path.map(str::to_string);
        self
    }

    /// Sets whether one undecodable document fails a bulk read.
    #[must_use]
    pub const fn strict_reads(mut self, value: bool) -> Self {
        self.strict_reads = value;
        self
    }

    /// Sets verbose query logging.
    #[must_use]
    pub const fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }
}
