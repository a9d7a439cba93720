//! Database facade.

use crate::collection::Collection;
use crate::config::Config;
#[cfg(feature = "std")]
use crate::dir::DatabaseDir;
use crate::document::IdentifierFactory;
use crate::error::{CoreError, CoreResult};
use crate::hooks::{ErrorHandler, Hooks};
use crate::query::{Filter, SortSpec, View, ViewCache, ViewCacheStats};
use crate::snapshot::SnapshotStore;
use crate::transaction::{ReadTransaction, TransactionManager, WriteTransaction};
use crate::types::SequenceNumber;
use crate::wal::WalManager;
use jsondb_storage::{InMemoryBackend, StorageBackend};
use parking_lot::RwLock;
#[cfg(feature = "std")]
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Name reported for databases without a directory.
const IN_MEMORY_NAME: &str = ":memory:";

/// The main database handle.
///
/// `Database` is the entry point for JsonDB. It owns:
/// - the committed state and its transaction manager
/// - the view cache, created at open and cleared at close
/// - the error handler and identifier factory hooks
///
/// # Opening a Database
///
/// ```rust,ignore
/// use jsondb_core::Database;
/// use std::path::Path;
///
/// let db = Database::open(Path::new("scores"))?;
/// let players = db.collection("players")?;
/// players.save(&Value::from_json_str(r#"{"name": "Ann", "score": 10}"#)?)?;
/// db.close()?;
/// ```
///
/// # In-Memory Databases
///
/// ```
/// use jsondb_core::Database;
///
/// let db = Database::open_in_memory().unwrap();
/// assert!(db.collection_names().unwrap().is_empty());
/// ```
pub struct Database {
    /// Name passed to the error handler.
    name: String,
    /// Configuration.
    config: Config,
    /// Database directory (holds the lock). None for in-memory databases.
    #[cfg(feature = "std")]
    dir: Option<DatabaseDir>,
    /// Transaction manager.
    manager: TransactionManager,
    /// Compiled views.
    views: ViewCache,
    /// Caller-installed callbacks.
    hooks: RwLock<Hooks>,
    /// Whether the database is open.
    is_open: RwLock<bool>,
}

impl Database {
    /// Opens a database from a directory path.
    ///
    /// Creates the directory if needed, takes the directory lock and
    /// recovers committed state from the snapshot and the WAL.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the database locked (`DatabaseLocked`)
    /// - The snapshot or the WAL is damaged
    /// - I/O errors occur
    #[cfg(feature = "std")]
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database from a directory path with custom configuration.
    ///
    /// ```rust,ignore
    /// use jsondb_core::{Config, Database};
    /// use std::path::Path;
    ///
    /// let config = Config::default()
    ///     .sync_on_commit(false)
    ///     .identifier_path(Some("key"));
    /// let db = Database::open_with_config(Path::new("scores"), config)?;
    /// ```
    #[cfg(feature = "std")]
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        use jsondb_storage::FileBackend;

        let dir = DatabaseDir::open(path, config.create_if_missing, config.error_if_exists)?;
        let wal = FileBackend::open_with_create_dirs(&dir.wal_path())?;
        let snapshot = FileBackend::open_with_create_dirs(&dir.snapshot_path())?;
        let mut db = Self::build(
            path.display().to_string(),
            config,
            Box::new(wal),
            Box::new(snapshot),
        )?;
        db.dir = Some(dir);
        Ok(db)
    }

    /// Opens a database over caller-supplied WAL and snapshot backends.
    pub fn open_with_backends(
        config: Config,
        wal: Box<dyn StorageBackend>,
        snapshot: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        Self::build(IN_MEMORY_NAME.to_string(), config, wal, snapshot)
    }

    /// Opens an empty in-memory database.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Opens an empty in-memory database with custom configuration.
    pub fn open_in_memory_with_config(config: Config) -> CoreResult<Self> {
        Self::open_with_backends(
            config,
            Box::new(InMemoryBackend::new()),
            Box::new(InMemoryBackend::new()),
        )
    }

    fn build(
        name: String,
        config: Config,
        wal: Box<dyn StorageBackend>,
        snapshot: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        let wal = WalManager::new(wal, config.sync_on_commit);
        let manager = TransactionManager::open(wal, SnapshotStore::new(snapshot))?;
        info!(
            database = %name,
            sequence = %manager.committed_seq(),
            "database opened"
        );
        Ok(Self {
            name,
            views: ViewCache::new(config.view_cache_capacity),
            config,
            #[cfg(feature = "std")]
            dir: None,
            manager,
            hooks: RwLock::new(Hooks::default()),
            is_open: RwLock::new(true),
        })
    }

    /// The name passed to the error handler: the directory path, or
    /// `:memory:`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database directory, or `None` for databases without one.
    #[cfg(feature = "std")]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(DatabaseDir::path)
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ---- collections ----

    /// Returns a handle to a collection, creating it on first reference.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for an empty name.
    pub fn collection(&self, name: &str) -> CoreResult<Collection<'_>> {
        let result = self.ensure_collection(name);
        self.observe(result).map(|()| Collection::new(self, name))
    }

    fn ensure_collection(&self, name: &str) -> CoreResult<()> {
        if name.is_empty() {
            return Err(CoreError::invalid_operation("collection name is empty"));
        }
        self.ensure_open()?;
        if self.manager.snapshot().collection(name).is_some() {
            return Ok(());
        }
        let mut txn = self.manager.begin_write();
        if txn.create_collection(name)? {
            debug!(collection = name, "creating collection");
        }
        txn.commit()?;
        Ok(())
    }

    /// Names of every collection, ascending.
    pub fn collection_names(&self) -> CoreResult<Vec<String>> {
        let result = self
            .read_txn()
            .map(|txn| txn.view().collection_names());
        self.observe(result)
    }

    // ---- transactions ----

    /// Begins a read-only transaction over the current committed state.
    pub fn begin_read(&self) -> CoreResult<ReadTransaction> {
        let result = self.read_txn();
        self.observe(result)
    }

    /// Begins a write transaction, waiting for the active one to finish.
    pub fn begin_write(&self) -> CoreResult<WriteTransaction<'_>> {
        let result = self.write_txn();
        self.observe(result)
    }

    /// Executes a function within a write transaction.
    ///
    /// If the function returns `Ok`, the transaction is committed.
    /// If it returns `Err`, the transaction is aborted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the function returns `Ok`
    /// after the transaction was already aborted by a failed operation;
    /// nothing is committed then.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> CoreResult<T>,
    {
        let result = self.write_txn().and_then(|mut txn| {
            let value = f(&mut txn)?;
            if !txn.is_active() {
                return Err(CoreError::invalid_operation("transaction was aborted"));
            }
            txn.commit()?;
            Ok(value)
        });
        self.observe(result)
    }

    pub(crate) fn read_txn(&self) -> CoreResult<ReadTransaction> {
        self.ensure_open()?;
        Ok(self.manager.begin_read())
    }

    pub(crate) fn write_txn(&self) -> CoreResult<WriteTransaction<'_>> {
        self.ensure_open()?;
        Ok(self.manager.begin_write())
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.manager.committed_seq()
    }

    /// Writes the committed state to the snapshot and clears the WAL.
    ///
    /// Waits for the active write transaction to finish, so it must not be
    /// called while the calling thread holds one.
    pub fn checkpoint(&self) -> CoreResult<SequenceNumber> {
        let result = self
            .ensure_open()
            .and_then(|()| self.manager.checkpoint());
        self.observe(result)
    }

    // ---- views ----

    /// Returns the cached view for `(collection, filter, sort)`, compiling
    /// it on a miss.
    pub(crate) fn view(
        &self,
        collection: &str,
        filter: Filter,
        sort: SortSpec,
    ) -> CoreResult<Arc<View>> {
        let signature = View::signature(collection, &filter, &sort);
        self.views.get_or_compile(&signature, || {
            let view = View::new(collection, filter, sort);
            if self.config.verbose {
                debug!(collection, plan = ?view.plan(), "compiled plan");
            }
            Ok(view)
        })
    }

    /// View cache counters.
    #[must_use]
    pub fn view_cache_stats(&self) -> ViewCacheStats {
        self.views.stats()
    }

    // ---- hooks ----

    /// Replaces the error handler.
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        self.hooks.write().error_handler = handler;
    }

    /// Replaces the identifier factory.
    pub fn set_identifier_factory(&self, factory: IdentifierFactory) {
        self.hooks.write().identifier_factory = factory;
    }

    pub(crate) fn identifier_factory(&self) -> IdentifierFactory {
        Arc::clone(&self.hooks.read().identifier_factory)
    }

    /// Passes an error to the error handler.
    pub(crate) fn report(&self, error: &CoreError) {
        let handler = Arc::clone(&self.hooks.read().error_handler);
        handler(&self.name, error);
    }

    /// Reports the error of a failed public operation and returns the
    /// result unchanged.
    pub(crate) fn observe<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(error) = &result {
            self.report(error);
        }
        result
    }

    // ---- lifecycle ----

    /// Closes the database: flushes the WAL and drops cached views.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.manager.flush()?;
        self.views.clear();
        *is_open = false;
        info!(database = %self.name, "database closed");
        Ok(())
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Ensures the database is open.
    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("is_open", &self.is_open())
            .field("committed_seq", &self.committed_seq())
            .field("views", &self.views)
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use jsondb_codec::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn doc(json: &str) -> Value {
        Value::from_json_str(json).unwrap()
    }

    #[test]
    fn open_in_memory() {
        let db = create_db();
        assert!(db.is_open());
        assert_eq!(db.name(), ":memory:");
        assert_eq!(db.committed_seq().as_u64(), 0);
    }

    #[test]
    fn collections_are_created_on_first_reference() {
        let db = create_db();
        db.collection("b").unwrap();
        db.collection("a").unwrap();
        db.collection("a").unwrap();
        assert_eq!(db.collection_names().unwrap(), ["a", "b"]);
        assert_eq!(db.committed_seq().as_u64(), 2);
    }

    #[test]
    fn transaction_commits_on_ok_and_aborts_on_err() {
        let db = create_db();
        db.transaction(|txn| txn.put("c", DocumentId::from(1), &doc("{}")))
            .unwrap();
        let failed: CoreResult<()> = db.transaction(|txn| {
            txn.put("c", DocumentId::from(2), &doc("{}"))?;
            Err(CoreError::invalid_operation("changed my mind"))
        });
        assert!(failed.is_err());

        let read = db.begin_read().unwrap();
        assert_eq!(read.view().len("c"), 1);
    }

    #[test]
    fn transaction_reports_an_abort_swallowed_by_the_closure() {
        let db = create_db();
        let c = db.collection("c").unwrap();
        c.put(1, &doc("{}")).unwrap();

        let result = db.transaction(|txn| {
            c.put_in(txn, 2, &doc("{}"))?;
            // The conflict aborts the transaction; the closure ignores it.
            assert!(c.insert_in(txn, 1, &doc("{}")).is_err());
            Ok(())
        });
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
        assert_eq!(c.ids().unwrap(), [DocumentId::from(1)]);
    }

    #[test]
    fn errors_reach_the_handler() {
        let db = create_db();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        db.set_error_handler(Arc::new(move |name, error| {
            assert_eq!(name, ":memory:");
            assert!(matches!(error, CoreError::InvalidOperation { .. }));
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(db.collection("").is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_database_rejects_work() {
        let db = create_db();
        db.close().unwrap();
        assert!(!db.is_open());
        assert!(matches!(db.begin_read(), Err(CoreError::DatabaseClosed)));
        assert!(matches!(db.collection("c"), Err(CoreError::DatabaseClosed)));
        // Closing twice is fine.
        db.close().unwrap();
    }

    #[test]
    fn state_survives_reopen_over_shared_backends() {
        let wal = InMemoryBackend::new();
        let snapshot = InMemoryBackend::new();
        let open = || {
            Database::open_with_backends(
                Config::default(),
                Box::new(wal.clone()),
                Box::new(snapshot.clone()),
            )
            .unwrap()
        };

        let db = open();
        db.transaction(|txn| txn.put("c", DocumentId::from("k"), &doc(r#"{"v": 1}"#)))
            .unwrap();
        db.checkpoint().unwrap();
        db.transaction(|txn| txn.put("c", DocumentId::from("j"), &doc(r#"{"v": 2}"#)))
            .unwrap();
        drop(db);

        let db = open();
        assert_eq!(db.committed_seq().as_u64(), 2);
        let read = db.begin_read().unwrap();
        assert_eq!(read.get("c", &DocumentId::from("j")).unwrap(), Some(doc(r#"{"v": 2}"#)));
    }

    fn wal_with_undecodable_document() -> InMemoryBackend {
        use crate::types::TransactionId;
        use crate::wal::WalRecord;
        use bytes::Bytes;
        use jsondb_codec::encode_document;

        let backend = InMemoryBackend::new();
        let wal = WalManager::new(Box::new(backend.clone()), false);
        let txid = TransactionId::new(1);
        let put = |id: i64, document: Bytes| WalRecord::Put {
            txid,
            collection: "c".to_string(),
            id: DocumentId::from(id),
            document,
        };
        wal.append_batch(&[
            WalRecord::Begin { txid },
            put(1, Bytes::from(encode_document(&doc(r#"{"v": 1}"#)).unwrap())),
            put(2, Bytes::from_static(&[0xff, 0x00])),
            WalRecord::Commit {
                txid,
                sequence: SequenceNumber::new(1),
            },
        ])
        .unwrap();
        backend
    }

    #[test]
    fn undecodable_documents_are_skipped_unless_reads_are_strict() {
        let open = |config: Config| {
            Database::open_with_backends(
                config,
                Box::new(wal_with_undecodable_document()),
                Box::new(InMemoryBackend::new()),
            )
            .unwrap()
        };

        let db = open(Config::default());
        let reported = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reported);
        db.set_error_handler(Arc::new(move |_, error| {
            assert!(matches!(error, CoreError::Serialization(_)));
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let all = db.collection("c").unwrap().all().unwrap();
        assert_eq!(all.count().unwrap(), 2);
        assert_eq!(all.all().unwrap(), vec![doc(r#"{"v": 1}"#)]);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
        // Counts come from the index: the undecodable document has no
        // entries, so only a match-all view counts it.
        assert_eq!(all.ids().unwrap(), [DocumentId::from(1), DocumentId::from(2)]);
        let has_v = db.collection("c").unwrap().find(&doc(r#"{"v": 1}"#)).unwrap();
        assert_eq!(has_v.count().unwrap(), 1);

        let db = open(Config::default().strict_reads(true));
        let all = db.collection("c").unwrap().all().unwrap();
        assert!(matches!(all.all(), Err(CoreError::Serialization(_))));
        // Modifying needs the current document, so it always fails.
        let db = open(Config::default());
        let all = db.collection("c").unwrap().all().unwrap();
        assert!(all.remove_all().is_err());
        assert_eq!(all.count().unwrap(), 2);
    }

    #[test]
    fn view_cache_is_shared_by_equal_queries() {
        let db = create_db();
        let filter = Filter::parse(&doc(r#"{"a": 1}"#)).unwrap();
        let a = db.view("c", filter.clone(), SortSpec::none()).unwrap();
        let b = db.view("c", filter, SortSpec::none()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(db.view_cache_stats().hits, 1);
    }
}
