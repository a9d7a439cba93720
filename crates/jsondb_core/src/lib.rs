//! # JsonDB Core
//!
//! Embedded document database engine for JsonDB.
//!
//! This crate provides:
//! - Tree traversal and flattening of documents into typed path entries
//! - Collections with put, get, remove and identifier management
//! - A filter and sort compiler producing cached, reusable views
//! - Atomic find-and-modify over a view inside one write transaction
//! - A write-ahead log and checkpoint snapshots for durability
//!
//! ## Example
//!
//! ```
//! use jsondb_core::{Database, ModifyOutcome, Value};
//!
//! let db = Database::open_in_memory().unwrap();
//! let scores = db.collection("scores").unwrap();
//! scores.save(&Value::from_json_str(r#"{"_id": "ann", "score": 10}"#).unwrap()).unwrap();
//! scores.save(&Value::from_json_str(r#"{"_id": "bob", "score": 7}"#).unwrap()).unwrap();
//!
//! let leaders = scores
//!     .find_sorted(
//!         &Value::from_json_str(r#"{"score": {"$gte": 5}}"#).unwrap(),
//!         &Value::from_json_str(r#"["-score"]"#).unwrap(),
//!     )
//!     .unwrap();
//! let bumped = leaders
//!     .all_and_modify(|doc| {
//!         let score = doc.get("score").and_then(Value::as_i64).unwrap_or(0);
//!         doc.insert("score", score + 1);
//!         ModifyOutcome::UPDATE | ModifyOutcome::RETURN_NEW
//!     })
//!     .unwrap();
//! assert_eq!(bumped[0].get("score"), Some(&Value::from(11)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod database;
#[cfg(feature = "std")]
mod dir;
mod document;
mod error;
mod flatten;
mod hooks;
mod path;
mod query;
mod recovery;
mod snapshot;
mod store;
mod transaction;
pub mod traverse;
mod types;
mod wal;

pub use collection::{Collection, PathView};
pub use config::{Config, DEFAULT_IDENTIFIER_PATH, DEFAULT_VIEW_CACHE_CAPACITY};
pub use database::Database;
pub use document::{default_identifier_factory, DocumentId, IdentifierFactory};
pub use error::{CoreError, CoreResult};
pub use flatten::{flatten, FlatDocument, FlatEntry, Scalar, ScalarType};
pub use hooks::{default_error_handler, ErrorHandler};
pub use path::{value_at, Path, Segment};
pub use query::{
    Constraint, Direction, FieldFilter, Filter, FilterBuilder, LikePattern, ModifyOutcome,
    PathSet, Plan, Query, Seek, SortKey, SortSpec, View, ViewCacheStats,
};
pub use store::{CollectionTables, StoreState, StoreView, StoredDocument};
pub use transaction::{PendingWrite, ReadTransaction, TransactionState, WriteSet, WriteTransaction};
pub use types::{SequenceNumber, TransactionId};

pub use jsondb_codec::{Number, Object, Value};
