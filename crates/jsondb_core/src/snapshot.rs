//! Checkpoint snapshots.
//!
//! A checkpoint writes the whole committed state to the snapshot file and
//! then clears the WAL. Recovery loads the snapshot and replays the WAL on
//! top of it.
//!
//! ## File Format
//!
//! ```text
//! | magic (4) | version (2) | sequence (8) | collection count (4) |
//! |   per collection: name (4 + N) | document count (8) |
//! |     per document: id | document (4 + N) |
//! | crc32 (4) |
//! ```

use crate::document::DocumentId;
use crate::error::{CoreError, CoreResult};
use crate::store::{stored_document, StoreState};
use crate::types::SequenceNumber;
use crate::wal::{compute_crc32, write_bytes, PayloadReader};
use bytes::Bytes;
use jsondb_storage::StorageBackend;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Magic bytes identifying a snapshot file.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"JSNP";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Serializes committed state.
///
/// # Errors
///
/// Returns an error if a name or document exceeds its length prefix.
pub fn encode_snapshot(state: &StoreState) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&SNAPSHOT_MAGIC);
    buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    buf.extend_from_slice(&state.sequence().as_u64().to_le_bytes());

    let collections: Vec<_> = state.collections().collect();
    let count = u32::try_from(collections.len())
        .map_err(|_| CoreError::invalid_operation("too many collections"))?;
    buf.extend_from_slice(&count.to_le_bytes());

    for (name, tables) in collections {
        write_bytes(&mut buf, name.as_bytes())?;
        buf.extend_from_slice(&(tables.len() as u64).to_le_bytes());
        for (id, document) in tables.iter() {
            id.write_to(&mut buf);
            write_bytes(&mut buf, &document.raw)?;
        }
    }

    let crc = compute_crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Rebuilds committed state from a snapshot image. An empty image is an
/// empty database.
///
/// # Errors
///
/// Returns [`CoreError::InvalidFormat`] for foreign files and
/// [`CoreError::ChecksumMismatch`] for damaged ones.
pub fn decode_snapshot(data: &[u8]) -> CoreResult<StoreState> {
    let mut state = StoreState::default();
    if data.is_empty() {
        return Ok(state);
    }
    if data.len() < 4 + 2 + 8 + 4 + 4 || data[0..4] != SNAPSHOT_MAGIC {
        return Err(CoreError::invalid_format("not a snapshot file"));
    }

    let (body, crc_bytes) = data.split_at(data.len() - 4);
    let mut stored = [0u8; 4];
    stored.copy_from_slice(crc_bytes);
    let expected = u32::from_le_bytes(stored);
    let actual = compute_crc32(body);
    if expected != actual {
        return Err(CoreError::ChecksumMismatch { expected, actual });
    }

    let version = u16::from_le_bytes([body[4], body[5]]);
    if version > SNAPSHOT_VERSION {
        return Err(CoreError::invalid_format(format!(
            "unsupported snapshot version {version}"
        )));
    }

    let mut reader = PayloadReader { data: body, pos: 6 };
    state.set_sequence(SequenceNumber::new(reader.read_u64()?));
    let collections = reader.read_u32()?;
    for _ in 0..collections {
        let name = reader.read_string()?;
        state.load_collection(&name);
        let documents = reader.read_u64()?;
        for _ in 0..documents {
            let id: DocumentId = reader.read_id()?;
            let raw = Bytes::copy_from_slice(reader.read_bytes()?);
            let (document, error) = stored_document(&id, raw);
            if let Some(error) = error {
                warn!(collection = %name, %id, %error, "snapshot holds an undecodable document");
            }
            state.load(&name, id, document);
        }
    }

    if reader.pos != body.len() {
        return Err(CoreError::invalid_format("trailing bytes in snapshot"));
    }
    Ok(state)
}

/// The snapshot file.
pub struct SnapshotStore {
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl SnapshotStore {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Loads the stored state.
    pub fn load(&self) -> CoreResult<StoreState> {
        let data = self.backend.lock().read_all()?;
        let state = decode_snapshot(&data)?;
        debug!(bytes = data.len(), sequence = %state.sequence(), "loaded snapshot");
        Ok(state)
    }

    /// Atomically replaces the stored state.
    pub fn save(&self, state: &StoreState) -> CoreResult<()> {
        let data = encode_snapshot(state)?;
        self.backend.lock().replace_contents(&data)?;
        debug!(bytes = data.len(), sequence = %state.sequence(), "wrote snapshot");
        Ok(())
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore").finish_non_exhaustive()
    }
}
