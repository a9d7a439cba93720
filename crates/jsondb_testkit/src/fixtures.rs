//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use jsondb_core::{Collection, Config, Database, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates a new in-memory test database with custom configuration.
    pub fn memory_with_config(config: Config) -> Self {
        Self {
            db: Database::open_in_memory_with_config(config)
                .expect("Failed to open in-memory database"),
            temp_dir: None,
        }
    }

    /// Creates a new database in a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with_config(Config::default().sync_on_commit(false))
    }

    /// Creates a new file-based test database with custom configuration.
    pub fn file_with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_with_config(&Self::db_path(&temp_dir), config)
            .expect("Failed to open file database");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }

    fn db_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("test.jsondb")
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(Self::db_path)
    }

    /// Closes the database and opens it again from disk.
    ///
    /// # Panics
    ///
    /// Panics for in-memory databases, which cannot be reopened.
    pub fn reopen(self) -> Self {
        let Self { db, temp_dir } = self;
        let config = db.config().clone();
        db.close().expect("Failed to close database");
        drop(db);

        let temp_dir = temp_dir.expect("Only file databases can be reopened");
        let db = Database::open_with_config(&Self::db_path(&temp_dir), config)
            .expect("Failed to reopen database");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust
/// use jsondb_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     let players = db.collection("players").unwrap();
///     assert!(players.is_empty().unwrap());
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a database in a temporary directory.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Parses a JSON literal into a document.
///
/// # Panics
///
/// Panics on malformed JSON.
pub fn doc(json: &str) -> Value {
    Value::from_json_str(json).expect("Invalid JSON literal")
}

/// Installs a `tracing` subscriber honouring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fills the `scores` collection with Ann (10) and Bob (20) under the
/// identifiers `"ann"` and `"bob"`.
pub fn game_scores(db: &Database) -> Collection<'_> {
    let scores = db.collection("scores").expect("Failed to open collection");
    scores
        .put("ann", &doc(r#"{"name": "Ann", "score": 10}"#))
        .expect("Failed to store Ann");
    scores
        .put("bob", &doc(r#"{"name": "Bob", "score": 20}"#))
        .expect("Failed to store Bob");
    scores
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use serde_json::json;

    /// Creates a database whose `players` collection holds `count`
    /// documents with integer identifiers `0..count`.
    ///
    /// Each player has a `score` of `index * 7 % 100`, a `level` of
    /// `index % 5` and a `tags` array.
    pub fn players(count: usize) -> TestDatabase {
        let test_db = TestDatabase::memory();
        {
            let players = test_db.db.collection("players").expect("Failed to open collection");
            test_db
                .db
                .transaction(|txn| {
                    for i in 0..count {
                        let index = i64::try_from(i).expect("index fits i64");
                        let tags = if index % 2 == 0 {
                            json!(["even"])
                        } else {
                            json!(["odd"])
                        };
                        let player = json!({
                            "name": format!("player-{index:04}"),
                            "score": index * 7 % 100,
                            "level": index % 5,
                            "tags": tags,
                        });
                        players.put_in(txn, index, &Value::from(player))?;
                    }
                    Ok(())
                })
                .expect("Failed to populate players");
        }
        test_db
    }
}
