//! Transaction state and pending writes.

use crate::document::DocumentId;
use crate::error::{CoreError, CoreResult};
use crate::flatten::FlatDocument;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

impl TransactionState {
    /// Fails unless the transaction is still active.
    pub(crate) fn ensure_active(self) -> CoreResult<()> {
        match self {
            Self::Active => Ok(()),
            Self::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            Self::Aborted => Err(CoreError::invalid_operation("transaction already aborted")),
        }
    }
}

/// A pending write in a transaction.
#[derive(Debug, Clone)]
pub enum PendingWrite {
    /// Store a document.
    Put {
        /// Encoded document.
        raw: Bytes,
        /// Its flat entries.
        flat: Arc<FlatDocument>,
    },
    /// Remove a document.
    Delete,
}

/// Writes buffered by a transaction until commit.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    created: BTreeSet<String>,
    documents: BTreeMap<String, BTreeMap<DocumentId, PendingWrite>>,
}

impl WriteSet {
    /// Records creation of a collection.
    pub fn create_collection(&mut self, name: &str) {
        self.created.insert(name.to_string());
    }

    /// Records a write, replacing any earlier write of the same document.
    pub fn record(&mut self, collection: &str, id: DocumentId, write: PendingWrite) {
        self.documents
            .entry(collection.to_string())
            .or_default()
            .insert(id, write);
    }

    /// Returns true if the collection is created by this write set.
    #[must_use]
    pub fn creates(&self, name: &str) -> bool {
        self.created.contains(name)
    }

    /// Collections created by this write set.
    pub fn created(&self) -> impl Iterator<Item = &str> {
        self.created.iter().map(String::as_str)
    }

    /// Pending write for one document.
    #[must_use]
    pub fn get(&self, collection: &str, id: &DocumentId) -> Option<&PendingWrite> {
        self.documents.get(collection).and_then(|docs| docs.get(id))
    }

    /// Pending writes of one collection, by identifier.
    #[must_use]
    pub fn collection(&self, collection: &str) -> Option<&BTreeMap<DocumentId, PendingWrite>> {
        self.documents.get(collection)
    }

    /// Every pending document write, grouped by collection.
    pub fn writes(&self) -> impl Iterator<Item = (&str, &DocumentId, &PendingWrite)> {
        self.documents.iter().flat_map(|(collection, docs)| {
            docs.iter()
                .map(move |(id, write)| (collection.as_str(), id, write))
        })
    }

    /// Returns the number of pending document writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.documents.values().map(BTreeMap::len).sum()
    }

    /// Returns true if nothing would change on commit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.write_count() == 0
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        BTreeSet<String>,
        BTreeMap<String, BTreeMap<DocumentId, PendingWrite>>,
    ) {
        (self.created, self.documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put() -> PendingWrite {
        PendingWrite::Put {
            raw: Bytes::from_static(&[0xa0]),
            flat: Arc::new(FlatDocument::default()),
        }
    }

    #[test]
    fn later_writes_replace_earlier_ones() {
        let mut writes = WriteSet::default();
        writes.record("c", DocumentId::from(1), put());
        writes.record("c", DocumentId::from(1), PendingWrite::Delete);
        assert_eq!(writes.write_count(), 1);
        assert!(matches!(
            writes.get("c", &DocumentId::from(1)),
            Some(PendingWrite::Delete)
        ));
    }

    #[test]
    fn empty_until_something_is_recorded() {
        let mut writes = WriteSet::default();
        assert!(writes.is_empty());
        writes.create_collection("players");
        assert!(!writes.is_empty());
        assert!(writes.creates("players"));
        assert_eq!(writes.created().collect::<Vec<_>>(), ["players"]);
    }

    #[test]
    fn writes_iterate_by_collection_then_id() {
        let mut writes = WriteSet::default();
        writes.record("b", DocumentId::from(2), put());
        writes.record("a", DocumentId::from(9), PendingWrite::Delete);
        writes.record("b", DocumentId::from(1), put());
        let order: Vec<(String, DocumentId)> = writes
            .writes()
            .map(|(c, id, _)| (c.to_string(), id.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), DocumentId::from(9)),
                ("b".to_string(), DocumentId::from(1)),
                ("b".to_string(), DocumentId::from(2)),
            ]
        );
    }

    #[test]
    fn finished_states_reject_work() {
        assert!(TransactionState::Active.ensure_active().is_ok());
        assert!(TransactionState::Committed.ensure_active().is_err());
        assert!(TransactionState::Aborted.ensure_active().is_err());
    }
}
