//! Segment payload format: a checksummed, compressed batch of records
//!
//! ```text
//! +-------+---------+-------+----------+-------------+----------+----------------+
//! | magic | version | flags | reserved | record count | checksum | zstd(bincode) |
//! |  4 B  |   1 B   |  1 B  |   2 B    |     4 B      |   4 B    |   variable    |
//! +-------+---------+-------+----------+-------------+----------+----------------+
//! ```
//!
//! The checksum is CRC32 over the compressed body.

use crate::core::record::EventRecord;
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc32fast::Hasher as Crc32Hasher;

/// Payload format version
pub const PAYLOAD_VERSION: u8 = 1;

/// Payload header size (16 bytes)
pub const HEADER_SIZE: usize = 16;

/// Magic number: "TLMS"
pub const MAGIC: &[u8; 4] = b"TLMS";

/// Default compression level for ZSTD (1-22)
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Body is compressed with ZSTD
pub const FLAG_COMPRESSED: u8 = 0x01;

/// Fixed-size header in front of every payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub flags: u8,
    pub record_count: u32,
    pub checksum: u32,
}

impl PayloadHeader {
    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_slice(MAGIC);
        buf.put_u8(PAYLOAD_VERSION);
        buf.put_u8(self.flags);
        buf.put_u16(0);
        buf.put_u32(self.record_count);
        buf.put_u32(self.checksum);
    }

    /// Parse the header at the start of `buf`
    pub fn read_from(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::Serialization(format!(
                "payload too short: {} bytes",
                buf.len()
            )));
        }

        let magic = &buf[0..4];
        if magic != MAGIC {
            return Err(Error::Serialization(format!(
                "Invalid magic number: {:?}",
                magic
            )));
        }
        buf.advance(4);

        let version = buf.get_u8();
        if version != PAYLOAD_VERSION {
            return Err(Error::Serialization(format!(
                "Unsupported version: {}",
                version
            )));
        }

        let flags = buf.get_u8();
        buf.advance(2);
        let record_count = buf.get_u32();
        let checksum = buf.get_u32();

        Ok(Self {
            flags,
            record_count,
            checksum,
        })
    }
}

/// Encode a batch of records into a segment payload
pub fn encode_records(records: &[EventRecord], compression_level: i32) -> Result<Bytes> {
    let serialized = bincode::serialize(records)?;
    let compressed = zstd::encode_all(&serialized[..], compression_level)
        .map_err(|e| Error::Serialization(format!("ZSTD compression failed: {}", e)))?;

    let mut hasher = Crc32Hasher::new();
    hasher.update(&compressed);

    let header = PayloadHeader {
        flags: FLAG_COMPRESSED,
        record_count: records.len() as u32,
        checksum: hasher.finalize(),
    };

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + compressed.len());
    header.write_to(&mut buf);
    buf.put_slice(&compressed);
    Ok(buf.freeze())
}

/// Decode a segment payload, verifying header and checksum
pub fn decode_records(payload: &[u8]) -> Result<Vec<EventRecord>> {
    let header = PayloadHeader::read_from(payload)?;
    let body = &payload[HEADER_SIZE..];

    let mut hasher = Crc32Hasher::new();
    hasher.update(body);
    let calculated = hasher.finalize();
    if calculated != header.checksum {
        return Err(Error::Serialization(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, calculated
        )));
    }

    let records: Vec<EventRecord> = if header.flags & FLAG_COMPRESSED != 0 {
        let decompressed = zstd::decode_all(body)
            .map_err(|e| Error::Serialization(format!("ZSTD decompression failed: {}", e)))?;
        bincode::deserialize(&decompressed)?
    } else {
        bincode::deserialize(body)?
    };

    if records.len() != header.record_count as usize {
        return Err(Error::Serialization(format!(
            "Record count mismatch: header says {}, body has {}",
            header.record_count,
            records.len()
        )));
    }

    Ok(records)
}
