//! WAL writer.

use crate::error::CoreResult;
use crate::wal::reader::WalRecordIterator;
use crate::wal::record::WalRecord;
use jsondb_storage::StorageBackend;
use parking_lot::Mutex;

/// Manages WAL writes and reads.
///
/// Records are appended only; the log shrinks only when a checkpoint
/// clears it.
pub struct WalManager {
    backend: Mutex<Box<dyn StorageBackend>>,
    /// Whether to sync to disk after each batch instead of only flushing.
    sync_on_write: bool,
}

/// Records read back from the log.
#[derive(Debug, Default)]
pub struct WalContents {
    /// `(offset, record)` pairs in log order.
    pub records: Vec<(u64, WalRecord)>,
    /// Length of the intact prefix. Anything beyond is a torn tail.
    pub valid_len: u64,
    /// Total log size.
    pub size: u64,
}

impl WalManager {
    /// Creates a new WAL manager.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_write,
        }
    }

    /// Appends a record to the WAL, returning its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is too large or the write fails.
    pub fn append(&self, record: &WalRecord) -> CoreResult<u64> {
        self.append_batch(std::slice::from_ref(record))
    }

    /// Appends several records with one write, then flushes (or syncs).
    ///
    /// Returns the offset of the first record.
    ///
    /// # Errors
    ///
    /// Returns an error if any record is too large or the write fails.
    pub fn append_batch(&self, records: &[WalRecord]) -> CoreResult<u64> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.encode()?);
        }

        let mut backend = self.backend.lock();
        let offset = backend.append(&data)?;
        if self.sync_on_write {
            backend.sync()?;
        } else {
            backend.flush()?;
        }
        Ok(offset)
    }

    /// Flushes pending writes.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Returns the current WAL size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Reads every intact record.
    ///
    /// A torn record at the end of the log ends the read; corruption before
    /// the end is an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::WalCorruption`] or
    /// [`crate::CoreError::ChecksumMismatch`] for damaged records.
    pub fn read_all(&self) -> CoreResult<WalContents> {
        let bytes = self.backend.lock().read_all()?;
        let mut iter = WalRecordIterator::new(&bytes);
        let records = iter.by_ref().collect::<CoreResult<Vec<_>>>()?;
        Ok(WalContents {
            records,
            valid_len: iter.offset(),
            size: bytes.len() as u64,
        })
    }

    /// Truncates the WAL to `offset` bytes.
    pub fn truncate(&self, offset: u64) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.truncate(offset)?;
        backend.sync()?;
        Ok(())
    }

    /// Clears all data from the WAL. Used after a checkpoint.
    pub fn clear(&self) -> CoreResult<()> {
        self.truncate(0)
    }
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager")
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use crate::types::{SequenceNumber, TransactionId};
    use bytes::Bytes;
    use jsondb_storage::InMemoryBackend;

    fn create_wal() -> (WalManager, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        (WalManager::new(Box::new(backend.clone()), false), backend)
    }

    fn transaction(txid: u64) -> Vec<WalRecord> {
        let txid = TransactionId::new(txid);
        vec![
            WalRecord::Begin { txid },
            WalRecord::Put {
                txid,
                collection: "players".to_string(),
                id: DocumentId::from(1),
                document: Bytes::from_static(&[0xa0]),
            },
            WalRecord::Commit {
                txid,
                sequence: SequenceNumber::new(txid.as_u64()),
            },
        ]
    }

    #[test]
    fn batch_append_and_read() {
        let (wal, _) = create_wal();
        let records = transaction(1);
        assert_eq!(wal.append_batch(&records).unwrap(), 0);

        let contents = wal.read_all().unwrap();
        let read: Vec<WalRecord> = contents.records.into_iter().map(|(_, r)| r).collect();
        assert_eq!(read, records);
        assert_eq!(contents.valid_len, contents.size);
    }

    #[test]
    fn read_empty_wal() {
        let (wal, _) = create_wal();
        let contents = wal.read_all().unwrap();
        assert!(contents.records.is_empty());
        assert_eq!(contents.valid_len, 0);
    }

    #[test]
    fn offsets_increase() {
        let (wal, _) = create_wal();
        let first = wal.append_batch(&transaction(1)).unwrap();
        let second = wal.append_batch(&transaction(2)).unwrap();
        assert!(second > first);
        assert_eq!(wal.read_all().unwrap().records.len(), 6);
    }

    #[test]
    fn torn_tail_is_reported() {
        let (wal, backend) = create_wal();
        wal.append_batch(&transaction(1)).unwrap();
        let intact = wal.size().unwrap();
        wal.append_batch(&transaction(2)).unwrap();

        let bytes = backend.snapshot();
        let mut torn = InMemoryBackend::with_data(bytes[..bytes.len() - 3].to_vec());
        torn.flush().unwrap();
        let reopened = WalManager::new(Box::new(torn), false);
        let contents = reopened.read_all().unwrap();
        assert_eq!(contents.records.len(), 5);
        assert!(contents.valid_len > intact);
        assert!(contents.valid_len < contents.size);
    }

    #[test]
    fn clear_empties_the_log() {
        let (wal, _) = create_wal();
        wal.append_batch(&transaction(1)).unwrap();
        wal.clear().unwrap();
        assert_eq!(wal.size().unwrap(), 0);
        assert!(wal.read_all().unwrap().records.is_empty());
    }
}
