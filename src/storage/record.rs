//! Document record format and the stable record identifier shared by the
//! index, cursor, racer, and capped storage engine.
//!
//! Record format (length-prefix + CRC32, little-endian), carried from the
//! teacher's storage record:
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, includes this field and the checksum)
//! +------------------+
//! | Namespace         | (length-prefixed string)
//! +------------------+
//! | Tombstone Flag   | (u8: 0 = live, 1 = deleted)
//! +------------------+
//! | Document Payload | (length-prefixed JSON bytes)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself.

use std::io::{self, Read};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::checksum::compute_checksum;

/// Stable identifier of a stored document: `(file_id, offset)`.
///
/// `INVALID` is a reserved sentinel distinct from any real location and
/// distinct from an unset `Option::None` — cursors compare against it
/// directly rather than wrapping every location in an `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordLocation {
    pub file_id: u32,
    pub offset: u64,
}

impl RecordLocation {
    pub const INVALID: RecordLocation = RecordLocation { file_id: u32::MAX, offset: u64::MAX };

    pub fn new(file_id: u32, offset: u64) -> Self {
        Self { file_id, offset }
    }

    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }
}

impl Default for RecordLocation {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A document as stored on disk: a namespace tag, a JSON body, and a
/// tombstone flag.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub namespace: String,
    pub is_tombstone: bool,
    pub document: Value,
}

impl DocumentRecord {
    pub fn live(namespace: impl Into<String>, document: Value) -> Self {
        Self { namespace: namespace.into(), is_tombstone: false, document }
    }

    pub fn tombstone(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), is_tombstone: true, document: Value::Null }
    }

    fn serialize_body(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&(self.namespace.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.namespace.as_bytes());

        buf.push(if self.is_tombstone { 1 } else { 0 });

        let body = serde_json::to_vec(&self.document).unwrap_or_default();
        buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
        buf.extend_from_slice(&body);

        buf
    }

    /// Serializes the complete record, including the length prefix and the
    /// trailing checksum.
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.serialize_body();
        let record_length = (4 + body.len() + 4) as u32;

        let mut checksum_data = Vec::with_capacity(4 + body.len());
        checksum_data.extend_from_slice(&record_length.to_le_bytes());
        checksum_data.extend_from_slice(&body);
        let checksum = compute_checksum(&checksum_data);

        let mut record = Vec::with_capacity(record_length as usize);
        record.extend_from_slice(&record_length.to_le_bytes());
        record.extend_from_slice(&body);
        record.extend_from_slice(&checksum.to_le_bytes());
        record
    }

    /// Deserializes a record, verifying the checksum. Returns the record and
    /// the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        const MIN_RECORD_SIZE: usize = 4 + 4 + 1 + 4 + 4;

        if data.len() < MIN_RECORD_SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "record too short"));
        }

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if record_length < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid record length: {}", record_length),
            ));
        }
        if data.len() < record_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("record truncated: expected {} bytes, got {}", record_length, data.len()),
            ));
        }

        let checksum_offset = record_length - 4;
        let stored_checksum = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);

        let checksum_data = &data[0..checksum_offset];
        let computed_checksum = compute_checksum(checksum_data);
        if computed_checksum != stored_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "checksum mismatch: computed {:08x}, stored {:08x}",
                    computed_checksum, stored_checksum
                ),
            ));
        }

        let mut cursor = std::io::Cursor::new(&data[4..checksum_offset]);

        fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
            let mut len_buf = [0u8; 4];
            reader.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            String::from_utf8(buf)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid utf-8: {}", e)))
        }

        fn read_bytes<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
            let mut len_buf = [0u8; 4];
            reader.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            Ok(buf)
        }

        let namespace = read_string(&mut cursor)?;

        let mut tombstone_buf = [0u8; 1];
        cursor.read_exact(&mut tombstone_buf)?;
        let is_tombstone = tombstone_buf[0] != 0;

        let body = read_bytes(&mut cursor)?;
        let document: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid json: {}", e)))?
        };

        Ok((Self { namespace, is_tombstone, document }, record_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_roundtrip() {
        let record = DocumentRecord::live("users", json!({"_id": 1, "a": 2}));
        let serialized = record.serialize();
        let (deserialized, consumed) = DocumentRecord::deserialize(&serialized).unwrap();
        assert_eq!(record, deserialized);
        assert_eq!(consumed, serialized.len());
    }

    #[test]
    fn test_tombstone_roundtrip() {
        let record = DocumentRecord::tombstone("users");
        let serialized = record.serialize();
        let (deserialized, _) = DocumentRecord::deserialize(&serialized).unwrap();
        assert!(deserialized.is_tombstone);
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let record = DocumentRecord::live("users", json!({"_id": 1}));
        let mut serialized = record.serialize();
        let mid = serialized.len() / 2;
        serialized[mid] ^= 0xFF;
        let result = DocumentRecord::deserialize(&serialized);
        assert!(result.is_err());
    }

    #[test]
    fn test_record_location_invalid_sentinel() {
        assert!(RecordLocation::INVALID.is_invalid());
        assert!(RecordLocation::default().is_invalid());
        assert!(!RecordLocation::new(0, 0).is_invalid());
        assert_ne!(RecordLocation::new(0, 0), RecordLocation::INVALID);
    }

    #[test]
    fn test_record_location_ordering() {
        let a = RecordLocation::new(0, 10);
        let b = RecordLocation::new(0, 20);
        let c = RecordLocation::new(1, 0);
        assert!(a < b);
        assert!(b < c);
    }
}
