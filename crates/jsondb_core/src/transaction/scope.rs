//! Read and write transaction handles.

use crate::document::DocumentId;
use crate::error::CoreResult;
use crate::flatten::FlatDocument;
use crate::store::{StoreState, StoreView};
use crate::transaction::manager::TransactionManager;
use crate::transaction::state::{PendingWrite, TransactionState, WriteSet};
use crate::types::{SequenceNumber, TransactionId};
use bytes::Bytes;
use jsondb_codec::{encode_document, Value};
use parking_lot::MutexGuard;
use std::sync::Arc;
use tracing::debug;

/// A read-only transaction over one committed snapshot.
///
/// Readers never block the writer and never see its pending writes. The
/// snapshot stays valid for as long as the handle lives.
#[derive(Debug, Clone)]
pub struct ReadTransaction {
    id: TransactionId,
    snapshot: Arc<StoreState>,
}

impl ReadTransaction {
    pub(crate) fn new(id: TransactionId, snapshot: Arc<StoreState>) -> Self {
        Self { id, snapshot }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Sequence number of the last commit visible to this transaction.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.snapshot.sequence()
    }

    /// A view of the snapshot.
    #[must_use]
    pub fn view(&self) -> StoreView<'_> {
        StoreView::committed(&self.snapshot)
    }

    /// Decodes one document.
    pub fn get(&self, collection: &str, id: &DocumentId) -> CoreResult<Option<Value>> {
        self.view().get(collection, id)
    }
}

/// A write transaction holding the exclusive write lock.
///
/// Writes are buffered and become visible to other transactions only on
/// [`commit`](Self::commit). Reads through the transaction see its own
/// pending writes. Dropping an active transaction rolls it back.
pub struct WriteTransaction<'a> {
    manager: &'a TransactionManager,
    _guard: MutexGuard<'a, ()>,
    id: TransactionId,
    pub(crate) base: Arc<StoreState>,
    pub(crate) writes: WriteSet,
    pub(crate) state: TransactionState,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(
        manager: &'a TransactionManager,
        guard: MutexGuard<'a, ()>,
        id: TransactionId,
        base: Arc<StoreState>,
    ) -> Self {
        Self {
            manager,
            _guard: guard,
            id,
            base,
            writes: WriteSet::default(),
            state: TransactionState::Active,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the transaction state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true if the transaction can still perform operations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Buffered writes.
    #[must_use]
    pub fn writes(&self) -> &WriteSet {
        &self.writes
    }

    /// A view of committed state with this transaction's writes on top.
    #[must_use]
    pub fn view(&self) -> StoreView<'_> {
        StoreView::with_pending(&self.base, &self.writes)
    }

    /// Returns true if the collection exists.
    #[must_use]
    pub fn has_collection(&self, name: &str) -> bool {
        self.view().has_collection(name)
    }

    /// Creates a collection if it does not exist yet. Returns true if it
    /// was created.
    pub fn create_collection(&mut self, name: &str) -> CoreResult<bool> {
        self.state.ensure_active()?;
        if self.has_collection(name) {
            return Ok(false);
        }
        self.writes.create_collection(name);
        Ok(true)
    }

    /// Decodes one document, including pending writes.
    pub fn get(&self, collection: &str, id: &DocumentId) -> CoreResult<Option<Value>> {
        self.view().get(collection, id)
    }

    /// Returns true if the document exists, including pending writes.
    #[must_use]
    pub fn contains(&self, collection: &str, id: &DocumentId) -> bool {
        self.view().contains(collection, id)
    }

    /// Stores a document, replacing any previous version. The collection is
    /// created if needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Serialization`] if the document cannot
    /// be encoded.
    pub fn put(&mut self, collection: &str, id: DocumentId, document: &Value) -> CoreResult<()> {
        self.state.ensure_active()?;
        let raw = Bytes::from(encode_document(document)?);
        let flat = Arc::new(FlatDocument::new(&id, document));
        self.create_collection(collection)?;
        self.writes
            .record(collection, id, PendingWrite::Put { raw, flat });
        Ok(())
    }

    /// Removes a document. Returns true if it existed.
    pub fn remove(&mut self, collection: &str, id: &DocumentId) -> CoreResult<bool> {
        self.state.ensure_active()?;
        if !self.contains(collection, id) {
            return Ok(false);
        }
        self.writes
            .record(collection, id.clone(), PendingWrite::Delete);
        Ok(true)
    }

    /// Commits the transaction.
    ///
    /// After this returns the writes are in the WAL and visible to new
    /// transactions. The write lock is released.
    pub fn commit(mut self) -> CoreResult<SequenceNumber> {
        let manager = self.manager;
        manager.commit(&mut self)
    }

    /// Discards every pending write. The write lock is released.
    pub fn abort(mut self) -> CoreResult<()> {
        self.rollback()
    }

    /// Discards every pending write but keeps the handle, which rejects
    /// further work.
    pub(crate) fn rollback(&mut self) -> CoreResult<()> {
        self.state.ensure_active()?;
        self.state = TransactionState::Aborted;
        debug!(txid = %self.id, writes = self.writes.write_count(), "transaction aborted");
        self.writes = WriteSet::default();
        Ok(())
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            self.state = TransactionState::Aborted;
            debug!(txid = %self.id, "transaction dropped without commit; rolled back");
        }
    }
}

impl std::fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("writes", &self.writes.write_count())
            .finish_non_exhaustive()
    }
}
