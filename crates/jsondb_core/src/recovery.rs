//! Crash recovery.
//!
//! Recovery loads the last checkpoint snapshot and replays, in log order,
//! every WAL transaction that reached its `Commit` record and is newer than
//! the snapshot. Transactions without a `Commit` are discarded. A torn
//! record at the end of the log is cut off so new records append cleanly.

use crate::error::CoreResult;
use crate::snapshot::SnapshotStore;
use crate::store::{stored_document, StoreState};
use crate::transaction::{PendingWrite, WriteSet};
use crate::types::TransactionId;
use crate::wal::{WalManager, WalRecord};
use std::collections::HashMap;
use tracing::{info, warn};

/// State rebuilt at open.
#[derive(Debug)]
pub struct RecoveredState {
    /// Committed state.
    pub state: StoreState,
    /// Highest transaction ID seen in the log.
    pub max_txid: u64,
    /// Number of committed transactions replayed from the log.
    pub replayed: usize,
    /// Number of uncommitted transactions discarded.
    pub discarded: usize,
}

/// Rebuilds committed state from the snapshot and the WAL.
///
/// # Errors
///
/// Returns an error if the snapshot or a WAL record before the tail is
/// damaged.
pub fn recover(wal: &WalManager, snapshots: &SnapshotStore) -> CoreResult<RecoveredState> {
    let mut state = snapshots.load()?;
    let checkpoint = state.sequence();
    let contents = wal.read_all()?;

    let mut open: HashMap<TransactionId, WriteSet> = HashMap::new();
    let mut max_txid = 0;
    let mut replayed = 0;

    for (offset, record) in contents.records {
        max_txid = max_txid.max(record.txid().as_u64());
        match record {
            WalRecord::Begin { txid } => {
                open.insert(txid, WriteSet::default());
            }
            WalRecord::CreateCollection { txid, name } => {
                open.entry(txid).or_default().create_collection(&name);
            }
            WalRecord::Put {
                txid,
                collection,
                id,
                document,
            } => {
                let (stored, error) = stored_document(&id, document);
                if let Some(error) = error {
                    warn!(offset, %collection, %id, %error, "WAL holds an undecodable document");
                }
                open.entry(txid).or_default().record(
                    &collection,
                    id,
                    PendingWrite::Put {
                        raw: stored.raw,
                        flat: stored.flat,
                    },
                );
            }
            WalRecord::Delete {
                txid,
                collection,
                id,
            } => {
                open.entry(txid)
                    .or_default()
                    .record(&collection, id, PendingWrite::Delete);
            }
            WalRecord::Commit { txid, sequence } => {
                let writes = open.remove(&txid).unwrap_or_default();
                if sequence > checkpoint {
                    state.apply(writes, sequence);
                    replayed += 1;
                }
            }
        }
    }

    if contents.valid_len < contents.size {
        warn!(
            valid = contents.valid_len,
            size = contents.size,
            "truncating torn WAL tail"
        );
        wal.truncate(contents.valid_len)?;
    }

    let discarded = open.len();
    info!(
        sequence = %state.sequence(),
        replayed,
        discarded,
        "recovery complete"
    );
    Ok(RecoveredState {
        state,
        max_txid,
        replayed,
        discarded,
    })
}
