//! Committed document state and views over it.
//!
//! The committed state is an immutable [`StoreState`] published behind an
//! `Arc`. Readers clone the `Arc` and keep a consistent snapshot for as long
//! as they need it. A commit copies only the collection tables it touches
//! (`Arc::make_mut`), so old snapshots stay intact.

mod tables;

pub use tables::{CollectionTables, StoredDocument};

use crate::document::DocumentId;
use crate::error::CoreResult;
use crate::flatten::{FlatDocument, Scalar};
use crate::transaction::{PendingWrite, WriteSet};
use crate::types::SequenceNumber;
use bytes::Bytes;
use jsondb_codec::{decode_document, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

/// Every collection as of one commit.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    collections: BTreeMap<String, Arc<CollectionTables>>,
    sequence: SequenceNumber,
}

impl StoreState {
    /// Sequence number of the last commit included.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// Returns one collection's tables.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionTables> {
        self.collections.get(name).map(Arc::as_ref)
    }

    /// Collection names in ascending order.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Iterates over every collection.
    pub fn collections(&self) -> impl Iterator<Item = (&str, &CollectionTables)> {
        self.collections
            .iter()
            .map(|(name, tables)| (name.as_str(), tables.as_ref()))
    }

    /// Applies a committed write set.
    pub(crate) fn apply(&mut self, writes: WriteSet, sequence: SequenceNumber) {
        let (created, documents) = writes.into_parts();
        for name in created {
            self.collections.entry(name).or_default();
        }
        for (name, docs) in documents {
            let tables = Arc::make_mut(self.collections.entry(name).or_default());
            for (id, write) in docs {
                match write {
                    PendingWrite::Put { raw, flat } => tables.put(id, StoredDocument { raw, flat }),
                    PendingWrite::Delete => {
                        tables.remove(&id);
                    }
                }
            }
        }
        self.sequence = self.sequence.max(sequence);
    }

    /// Inserts a document while loading a snapshot.
    pub(crate) fn load(&mut self, collection: &str, id: DocumentId, document: StoredDocument) {
        let tables = Arc::make_mut(self.collections.entry(collection.to_string()).or_default());
        tables.put(id, document);
    }

    /// Registers an empty collection while loading a snapshot.
    pub(crate) fn load_collection(&mut self, name: &str) {
        self.collections.entry(name.to_string()).or_default();
    }

    pub(crate) fn set_sequence(&mut self, sequence: SequenceNumber) {
        self.sequence = sequence;
    }
}

/// Builds the flat form of stored bytes.
///
/// Undecodable bytes get an empty flat form; reads of the document report
/// the decode error.
pub(crate) fn stored_document(
    id: &DocumentId,
    raw: Bytes) -> (StoredDocument, Option<jsondb_codec::CodecError>,
) {
    match decode_document(&raw) {
        Ok(value) => (
            StoredDocument {
                flat: Arc::new(FlatDocument::new(id, &value)),
                raw,
            },
            None,
        ),
        Err(e) => (
            StoredDocument {
                raw,
                flat: Arc::new(FlatDocument::default()),
            },
            Some(e),
        ),
    }
}

/// A committed snapshot, optionally overlaid with a write transaction's
/// pending writes.
#[derive(Debug, Clone, Copy)]
pub struct StoreView<'a> {
    state: &'a StoreState,
    pending: Option<&'a WriteSet>,
}

impl<'a> StoreView<'a> {
    /// A view of committed state only.
    #[must_use]
    pub fn committed(state: &'a StoreState) -> Self {
        Self {
            state,
            pending: None,
        }
    }

    /// A view of committed state with pending writes applied on top.
    #[must_use]
    pub fn with_pending(state: &'a StoreState, pending: &'a WriteSet) -> Self {
        Self {
            state,
            pending: Some(pending),
        }
    }

    /// Returns true if the collection exists in this view.
    #[must_use]
    pub fn has_collection(&self, name: &str) -> bool {
        self.state.collection(name).is_some() || self.pending.is_some_and(|p| p.creates(name))
    }

    /// Collection names in ascending order.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: BTreeSet<&str> = self.state.collection_names().collect();
        if let Some(pending) = self.pending {
            names.extend(pending.created());
        }
        names.into_iter().map(str::to_string).collect()
    }

    fn pending_write(&self, collection: &str, id: &DocumentId) -> Option<&'a PendingWrite> {
        self.pending.and_then(|p| p.get(collection, id))
    }

    /// Returns the encoded document.
    #[must_use]
    pub fn raw(&self, collection: &str, id: &DocumentId) -> Option<Bytes> {
        match self.pending_write(collection, id) {
            Some(PendingWrite::Put { raw, .. }) => Some(raw.clone()),
            Some(PendingWrite::Delete) => None,
            None => self
                .state
                .collection(collection)
                .and_then(|t| t.get(id))
                .map(|d| d.raw.clone()),
        }
    }

    /// Returns the flat entries of a document.
    #[must_use]
    pub fn flat(&self, collection: &str, id: &DocumentId) -> Option<&'a FlatDocument> {
        match self.pending_write(collection, id) {
            Some(PendingWrite::Put { flat, .. }) => Some(flat.as_ref()),
            Some(PendingWrite::Delete) => None,
            None => self
                .state
                .collection(collection)
                .and_then(|t| t.get(id))
                .map(|d| d.flat.as_ref()),
        }
    }

    /// Decodes a document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Serialization`] if the stored bytes do
    /// not decode.
    pub fn get(&self, collection: &str, id: &DocumentId) -> CoreResult<Option<Value>> {
        match self.raw(collection, id) {
            Some(raw) => Ok(Some(decode_document(&raw)?)),
            None => Ok(None),
        }
    }

    /// Returns true if the document exists.
    #[must_use]
    pub fn contains(&self, collection: &str, id: &DocumentId) -> bool {
        match self.pending_write(collection, id) {
            Some(PendingWrite::Put { .. }) => true,
            Some(PendingWrite::Delete) => false,
            None => self
                .state
                .collection(collection)
                .is_some_and(|t| t.contains(id)),
        }
    }

    /// Every identifier of a collection, ascending.
    #[must_use]
    pub fn ids(&self, collection: &str) -> BTreeSet<DocumentId> {
        let mut ids: BTreeSet<DocumentId> = self
            .state
            .collection(collection)
            .map(|t| t.ids().cloned().collect())
            .unwrap_or_default();
        self.merge_pending(collection, &mut ids);
        ids
    }

    /// Number of documents in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        match self.pending.and_then(|p| p.collection(collection)) {
            Some(_) => self.ids(collection).len(),
            None => self.state.collection(collection).map_or(0, CollectionTables::len),
        }
    }

    /// Candidates with an entry equal to one of `scalars` at `path`.
    ///
    /// Pending puts are always included as candidates; callers verify each
    /// candidate against its flat entries.
    #[must_use]
    pub fn seek_points<'s>(
        &self,
        collection: &str,
        path: &str,
        scalars: impl IntoIterator<Item = &'s Scalar>,
    ) -> BTreeSet<DocumentId> {
        let mut out = BTreeSet::new();
        if let Some(tables) = self.state.collection(collection) {
            for scalar in scalars {
                tables.seek_point(path, scalar, &mut out);
            }
        }
        self.merge_pending(collection, &mut out);
        out
    }

    /// Candidates with an entry inside `(lower, upper)` at `path`.
    #[must_use]
    pub fn seek_range(
        &self,
        collection: &str,
        path: &str,
        lower: Bound<&Scalar>,
        upper: Bound<&Scalar>,
    ) -> BTreeSet<DocumentId> {
        let mut out = BTreeSet::new();
        if let Some(tables) = self.state.collection(collection) {
            tables.seek_range(path, lower, upper, &mut out);
        }
        self.merge_pending(collection, &mut out);
        out
    }

    /// Candidates with any entry at `path`.
    #[must_use]
    pub fn seek_path(&self, collection: &str, path: &str) -> BTreeSet<DocumentId> {
        let mut out = BTreeSet::new();
        if let Some(tables) = self.state.collection(collection) {
            tables.seek_path(path, &mut out);
        }
        self.merge_pending(collection, &mut out);
        out
    }

    /// Number of distinct committed values at `path`.
    #[must_use]
    pub fn distinct_values(&self, collection: &str, path: &str) -> usize {
        self.state
            .collection(collection)
            .map_or(0, |t| t.distinct_values(path))
    }

    fn merge_pending(&self, collection: &str, ids: &mut BTreeSet<DocumentId>) {
        let Some(writes) = self.pending.and_then(|p| p.collection(collection)) else {
            return;
        };
        for (id, write) in writes {
            match write {
                PendingWrite::Put { .. } => {
                    ids.insert(id.clone());
                }
                PendingWrite::Delete => {
                    ids.remove(id);
                }
            }
        }
    }
}
