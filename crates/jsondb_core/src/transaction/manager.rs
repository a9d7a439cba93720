//! Transaction manager.

use crate::error::CoreResult;
use crate::recovery::{recover, RecoveredState};
use crate::snapshot::SnapshotStore;
use crate::store::StoreState;
use crate::transaction::scope::{ReadTransaction, WriteTransaction};
use crate::transaction::state::{PendingWrite, TransactionState, WriteSet};
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::{WalManager, WalRecord};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Manages transactions over the committed state.
///
/// The transaction manager provides:
/// - Single-writer concurrency control via `begin_write()`
/// - Snapshot isolation for readers
/// - WAL-based durability
/// - Commit ordering via sequence numbers
///
/// ## Single-Writer Guarantee
///
/// Only one write transaction can be active at a time. `begin_write()`
/// acquires an exclusive lock that is held for the transaction's lifetime.
/// `checkpoint()` takes the same lock, so it must not be called from a
/// thread that holds a write transaction.
pub struct TransactionManager {
    /// WAL for durability.
    wal: WalManager,
    /// Checkpoint snapshots.
    snapshots: SnapshotStore,
    /// Current committed state.
    state: RwLock<Arc<StoreState>>,
    /// Next transaction ID.
    next_txid: AtomicU64,
    /// Current committed sequence.
    committed_seq: AtomicU64,
    /// Write lock - only one writer at a time.
    write_lock: Mutex<()>,
}

impl TransactionManager {
    /// Opens a transaction manager, recovering committed state from the
    /// snapshot and the WAL.
    pub fn open(wal: WalManager, snapshots: SnapshotStore) -> CoreResult<Self> {
        let recovered = recover(&wal, &snapshots)?;
        Ok(Self::with_state(wal, snapshots, recovered))
    }

    /// Creates a transaction manager initialized from recovery state.
    pub fn with_state(
        wal: WalManager,
        snapshots: SnapshotStore,
        recovered: RecoveredState,
    ) -> Self {
        let committed = recovered.state.sequence().as_u64();
        Self {
            wal,
            snapshots,
            state: RwLock::new(Arc::new(recovered.state)),
            next_txid: AtomicU64::new(recovered.max_txid + 1),
            committed_seq: AtomicU64::new(committed),
            write_lock: Mutex::new(()),
        }
    }

    fn allocate_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    /// The current committed state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<StoreState> {
        Arc::clone(&self.state.read())
    }

    /// Begins a read-only transaction over the current committed state.
    #[must_use]
    pub fn begin_read(&self) -> ReadTransaction {
        ReadTransaction::new(self.allocate_txid(), self.snapshot())
    }

    /// Begins a write transaction with the exclusive write lock.
    ///
    /// Blocks while another write transaction is active. The lock is
    /// released when the transaction is committed, aborted or dropped.
    #[must_use]
    pub fn begin_write(&self) -> WriteTransaction<'_> {
        let guard = self.write_lock.lock();
        let txid = self.allocate_txid();
        debug!(%txid, "write transaction started");
        WriteTransaction::new(self, guard, txid, self.snapshot())
    }

    /// Commits a write transaction. The caller already holds the write lock
    /// through the transaction.
    pub(crate) fn commit(&self, txn: &mut WriteTransaction<'_>) -> CoreResult<SequenceNumber> {
        txn.state.ensure_active()?;
        let txid = txn.id();
        let writes = std::mem::take(&mut txn.writes);

        if writes.is_empty() {
            txn.state = TransactionState::Committed;
            return Ok(self.committed_seq());
        }

        let sequence = self.committed_seq().next();
        let records = wal_records(txid, &writes, sequence);
        if let Err(error) = self.wal.append_batch(&records) {
            txn.state = TransactionState::Aborted;
            warn!(%txid, %error, "WAL write failed; transaction aborted");
            return Err(error);
        }

        // Drop the transaction's reference so untouched tables are not copied.
        txn.base = Arc::default();
        let count = writes.write_count();
        {
            let mut state = self.state.write();
            Arc::make_mut(&mut *state).apply(writes, sequence);
        }
        self.committed_seq
            .store(sequence.as_u64(), Ordering::SeqCst);
        txn.state = TransactionState::Committed;

        debug!(%txid, %sequence, writes = count, "transaction committed");
        Ok(sequence)
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Creates a checkpoint.
    ///
    /// A checkpoint:
    /// 1. Writes the committed state to the snapshot file
    /// 2. Clears the WAL, whose transactions are all in the snapshot
    ///
    /// Waits for the active write transaction, if any, to finish.
    pub fn checkpoint(&self) -> CoreResult<SequenceNumber> {
        let _guard = self.write_lock.lock();
        let state = self.snapshot();
        self.snapshots.save(&state)?;
        self.wal.clear()?;
        info!(sequence = %state.sequence(), "checkpoint complete");
        Ok(state.sequence())
    }

    /// Flushes the WAL.
    pub fn flush(&self) -> CoreResult<()> {
        self.wal.flush()
    }
}

/// The WAL records of one transaction: `Begin`, the collections it
/// creates, its document writes, then `Commit`.
fn wal_records(txid: TransactionId, writes: &WriteSet, sequence: SequenceNumber) -> Vec<WalRecord> {
    let mut records = Vec::with_capacity(writes.write_count() + 2);
    records.push(WalRecord::Begin { txid });
    for name in writes.created() {
        records.push(WalRecord::CreateCollection {
            txid,
            name: name.to_string(),
        });
    }
    for (collection, id, write) in writes.writes() {
        let collection = collection.to_string();
        let id = id.clone();
        records.push(match write {
            PendingWrite::Put { raw, .. } => WalRecord::Put {
                txid,
                collection,
                id,
                document: raw.clone(),
            },
            PendingWrite::Delete => WalRecord::Delete {
                txid,
                collection,
                id,
            },
        });
    }
    records.push(WalRecord::Commit { txid, sequence });
    records
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}
