//! WAL record iterator.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::{
    compute_crc32, WalRecord, WalRecordType, CRC_SIZE, HEADER_SIZE, WAL_MAGIC, WAL_VERSION,
};

/// Iterator over the records of a WAL image.
///
/// - Truncated records (incomplete header or body) end the iteration; they
///   are writes torn by a crash.
/// - Bad magic, an unknown version or type, and checksum mismatches are
///   errors; the iterator stops after reporting one.
pub struct WalRecordIterator<'a> {
    data: &'a [u8],
    offset: usize,
    finished: bool,
}

impl<'a> WalRecordIterator<'a> {
    /// Starts iterating at the beginning of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            finished: false,
        }
    }

    /// Offset just past the last record returned.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset as u64
    }

    fn read_next_record(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        let start = self.offset;
        let rest = &self.data[start..];
        if rest.len() < HEADER_SIZE {
            return Ok(None);
        }

        if rest[0..4] != WAL_MAGIC {
            return Err(CoreError::wal_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version > WAL_VERSION {
            return Err(CoreError::wal_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = rest[6];
        let record_type = WalRecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::wal_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let len = u32::from_le_bytes([rest[7], rest[8], rest[9], rest[10]]) as usize;
        let total = HEADER_SIZE + len + CRC_SIZE;
        if rest.len() < total {
            return Ok(None);
        }

        let body = &rest[..HEADER_SIZE + len];
        let mut crc_bytes = [0u8; CRC_SIZE];
        crc_bytes.copy_from_slice(&rest[HEADER_SIZE + len..total]);
        let expected = u32::from_le_bytes(crc_bytes);
        let actual = compute_crc32(body);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let record = WalRecord::decode_payload(record_type, &body[HEADER_SIZE..])?;
        self.offset = start + total;
        Ok(Some((start as u64, record)))
    }
}

impl Iterator for WalRecordIterator<'_> {
    type Item = CoreResult<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
