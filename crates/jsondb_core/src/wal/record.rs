//! WAL record types and serialization.

use crate::document::DocumentId;
use crate::error::{CoreError, CoreResult};
use crate::types::{SequenceNumber, TransactionId};
use bytes::Bytes;

/// Magic bytes identifying a WAL record.
pub const WAL_MAGIC: [u8; 4] = *b"JWAL";

/// Current WAL format version.
pub const WAL_VERSION: u16 = 1;

/// Header size: magic (4) + version (2) + type (1) + length (4).
pub(crate) const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub(crate) const CRC_SIZE: usize = 4;

/// Type of WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// Begin a transaction.
    Begin = 1,
    /// Create a collection.
    CreateCollection = 2,
    /// Store a document.
    Put = 3,
    /// Remove a document.
    Delete = 4,
    /// Commit a transaction.
    Commit = 5,
}

impl WalRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::CreateCollection),
            3 => Some(Self::Put),
            4 => Some(Self::Delete),
            5 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A WAL record.
///
/// Records of one transaction are appended together at commit time, ending
/// with its `Commit` record. Recovery ignores transactions without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Begin a transaction.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Create a collection.
    CreateCollection {
        /// Transaction ID.
        txid: TransactionId,
        /// Collection name.
        name: String,
    },

    /// Store a document, replacing any previous one.
    Put {
        /// Transaction ID.
        txid: TransactionId,
        /// Collection name.
        collection: String,
        /// Document identifier.
        id: DocumentId,
        /// Encoded document.
        document: Bytes,
    },

    /// Remove a document.
    Delete {
        /// Transaction ID.
        txid: TransactionId,
        /// Collection name.
        collection: String,
        /// Document identifier.
        id: DocumentId,
    },

    /// Commit a transaction.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence number assigned to this commit.
        sequence: SequenceNumber,
    },
}

impl WalRecord {
    /// Maximum payload size; the envelope uses a 4-byte length field.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Begin { .. } => WalRecordType::Begin,
            Self::CreateCollection { .. } => WalRecordType::CreateCollection,
            Self::Put { .. } => WalRecordType::Put,
            Self::Delete { .. } => WalRecordType::Delete,
            Self::Commit { .. } => WalRecordType::Commit,
        }
    }

    /// Returns the transaction the record belongs to.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begin { txid }
            | Self::CreateCollection { txid, .. }
            | Self::Put { txid, .. }
            | Self::Delete { txid, .. }
            | Self::Commit { txid, .. } => *txid,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns an error if a name or document exceeds the 4-byte length
    /// prefix.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.txid().as_u64().to_le_bytes());

        match self {
            Self::Begin { .. } => {}
            Self::CreateCollection { name, .. } => write_bytes(&mut buf, name.as_bytes())?,
            Self::Put {
                collection,
                id,
                document,
                ..
            } => {
                write_bytes(&mut buf, collection.as_bytes())?;
                id.write_to(&mut buf);
                write_bytes(&mut buf, document)?;
            }
            Self::Delete { collection, id, .. } => {
                write_bytes(&mut buf, collection.as_bytes())?;
                id.write_to(&mut buf);
            }
            Self::Commit { sequence, .. } => {
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalCorruption`] for short, malformed or
    /// over-long payloads.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader {
            data: payload,
            pos: 0,
        };

        let txid = TransactionId::new(reader.read_u64()?);
        let record = match record_type {
            WalRecordType::Begin => Self::Begin { txid },
            WalRecordType::CreateCollection => Self::CreateCollection {
                txid,
                name: reader.read_string()?,
            },
            WalRecordType::Put => Self::Put {
                txid,
                collection: reader.read_string()?,
                id: reader.read_id()?,
                document: Bytes::copy_from_slice(reader.read_bytes()?),
            },
            WalRecordType::Delete => Self::Delete {
                txid,
                collection: reader.read_string()?,
                id: reader.read_id()?,
            },
            WalRecordType::Commit => Self::Commit {
                txid,
                sequence: SequenceNumber::new(reader.read_u64()?),
            },
        };

        if reader.pos != payload.len() {
            return Err(CoreError::wal_corruption(format!(
                "trailing bytes in {record_type:?} record: expected {} bytes, got {}",
                reader.pos,
                payload.len()
            )));
        }
        Ok(record)
    }

    /// Serializes the record with its envelope and checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not fit the envelope.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_operation("WAL record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&WAL_MAGIC);
        data.extend_from_slice(&WAL_VERSION.to_le_bytes());
        data.push(self.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        // CRC32 over everything before it
        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }
}

pub(crate) fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> CoreResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        CoreError::invalid_operation(format!(
            "{} bytes exceed the WAL field limit of {} bytes",
            bytes.len(),
            WalRecord::MAX_PAYLOAD_SIZE
        ))
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Cursor over a record payload. Also reads snapshot files.
pub(crate) struct PayloadReader<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| CoreError::wal_corruption("length overflow"))?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| CoreError::wal_corruption("unexpected end of payload"))?;
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn read_u64(&mut self) -> CoreResult<u64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(bytes))
    }

    pub(crate) fn read_u32(&mut self) -> CoreResult<u32> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(bytes))
    }

    pub(crate) fn read_bytes(&mut self) -> CoreResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    pub(crate) fn read_string(&mut self) -> CoreResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CoreError::wal_corruption("collection name is not UTF-8"))
    }

    pub(crate) fn read_id(&mut self) -> CoreResult<DocumentId> {
        DocumentId::read_from(self.data, &mut self.pos)
            .ok_or_else(|| CoreError::wal_corruption("malformed document identifier"))
    }
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(record: &WalRecord) -> WalRecord {
        let payload = record.encode_payload().unwrap();
        WalRecord::decode_payload(record.record_type(), &payload).unwrap()
    }

    #[test]
    fn record_type_bytes() {
        for t in [
            WalRecordType::Begin,
            WalRecordType::CreateCollection,
            WalRecordType::Put,
            WalRecordType::Delete,
            WalRecordType::Commit,
        ] {
            assert_eq!(WalRecordType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(WalRecordType::from_byte(0), None);
        assert_eq!(WalRecordType::from_byte(6), None);
    }

    #[test]
    fn put_record_keeps_collection_id_and_document() {
        let record = WalRecord::Put {
            txid: TransactionId::new(3),
            collection: "players".to_string(),
            id: DocumentId::from("ann"),
            document: Bytes::from_static(&[0xa0]),
        };
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn delete_and_commit_records() {
        let delete = WalRecord::Delete {
            txid: TransactionId::new(9),
            collection: "c".to_string(),
            id: DocumentId::from(-4),
        };
        assert_eq!(roundtrip(&delete), delete);

        let commit = WalRecord::Commit {
            txid: TransactionId::new(9),
            sequence: SequenceNumber::new(100),
        };
        assert_eq!(roundtrip(&commit), commit);
    }

    #[test]
    fn trailing_bytes_are_corruption() {
        let mut payload = WalRecord::Begin {
            txid: TransactionId::new(1),
        }
        .encode_payload()
        .unwrap();
        payload.push(0);
        assert!(matches!(
            WalRecord::decode_payload(WalRecordType::Begin, &payload),
            Err(CoreError::WalCorruption { .. })
        ));
    }

    #[test]
    fn short_payload_is_corruption() {
        let payload = WalRecord::CreateCollection {
            txid: TransactionId::new(1),
            name: "players".to_string(),
        }
        .encode_payload()
        .unwrap();
        let truncated = &payload[..12];
        assert!(WalRecord::decode_payload(WalRecordType::CreateCollection, truncated).is_err());
    }

    #[test]
    fn envelope_layout() {
        let record = WalRecord::Begin {
            txid: TransactionId::new(1),
        };
        let data = record.encode().unwrap();
        assert_eq!(&data[0..4], b"JWAL");
        assert_eq!(u16::from_le_bytes([data[4], data[5]]), WAL_VERSION);
        assert_eq!(data[6], WalRecordType::Begin.as_byte());
        assert_eq!(data.len(), HEADER_SIZE + 8 + CRC_SIZE);
        let body = &data[..data.len() - CRC_SIZE];
        let stored = u32::from_le_bytes(data[data.len() - CRC_SIZE..].try_into().unwrap());
        assert_eq!(stored, compute_crc32(body));
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }
}
