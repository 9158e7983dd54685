//! On-disk entry format.
//!
//! # File Format
//! ```text
//! [RecordHeader: bincode, fixint]
//!   magic: u32 = 0x4D415043 ("MAPC")
//!   version: u32
//!   key, created_at_ms, kind, content_type, params_json
//!   compressed: bool
//!   raw_len: u64       (payload length before compression)
//!   payload_len: u64   (bytes that follow the header)
//! [payload: payload_len bytes, gzip when compressed]
//! ```

use bincode::Options;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

use super::types::{Artifact, ArtifactKind};

pub const RECORD_MAGIC: u32 = 0x4D41_5043;
pub const RECORD_VERSION: u32 = 1;

/// Upper bound on a decoded header, so a corrupt length prefix cannot
/// trigger a huge allocation.
const MAX_HEADER_BYTES: u64 = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub magic: u32,
    pub version: u32,
    /// Hex cache key; must match the file name
    pub key: String,
    pub created_at_ms: u64,
    pub kind: ArtifactKind,
    pub content_type: String,
    /// Canonical parameter JSON the key was derived from
    pub params_json: String,
    pub compressed: bool,
    pub raw_len: u64,
    pub payload_len: u64,
}

fn header_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_HEADER_BYTES)
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Serialize a complete record.
pub fn encode(
    key_hex: &str,
    params_json: &str,
    artifact: &Artifact,
    created_at_ms: u64,
    compress: bool,
) -> io::Result<Vec<u8>> {
    let payload = if compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&artifact.data)?;
        encoder.finish()?
    } else {
        artifact.data.clone()
    };

    let header = RecordHeader {
        magic: RECORD_MAGIC,
        version: RECORD_VERSION,
        key: key_hex.to_string(),
        created_at_ms,
        kind: artifact.kind,
        content_type: artifact.content_type.clone(),
        params_json: params_json.to_string(),
        compressed: compress,
        raw_len: artifact.data.len() as u64,
        payload_len: payload.len() as u64,
    };

    let mut bytes = header_codec()
        .serialize(&header)
        .map_err(|e| invalid_data(format!("header encode failed: {}", e)))?;
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Read and validate only the header. The reader is left at the payload.
pub fn read_header<R: Read>(reader: &mut R) -> io::Result<RecordHeader> {
    let header: RecordHeader = header_codec()
        .deserialize_from(reader)
        .map_err(|e| invalid_data(format!("header decode failed: {}", e)))?;

    if header.magic != RECORD_MAGIC {
        return Err(invalid_data(format!("bad magic {:#010x}", header.magic)));
    }
    if header.version != RECORD_VERSION {
        return Err(invalid_data(format!(
            "unsupported record version {}",
            header.version
        )));
    }
    Ok(header)
}

/// Decode a full record, decompressing the payload if needed.
pub fn decode(bytes: &[u8]) -> io::Result<(RecordHeader, Artifact)> {
    let mut cursor = bytes;
    let header = read_header(&mut cursor)?;

    if cursor.len() as u64 != header.payload_len {
        return Err(invalid_data(format!(
            "payload length mismatch: header says {}, found {}",
            header.payload_len,
            cursor.len()
        )));
    }

    let data = if header.compressed {
        let mut data = Vec::with_capacity(header.raw_len.min(MAX_HEADER_BYTES * 64) as usize);
        // Inflate at most one byte past the declared length
        GzDecoder::new(cursor)
            .take(header.raw_len.saturating_add(1))
            .read_to_end(&mut data)?;
        data
    } else {
        cursor.to_vec()
    };

    if data.len() as u64 != header.raw_len {
        return Err(invalid_data("decoded payload length mismatch"));
    }

    let artifact = Artifact {
        kind: header.kind,
        content_type: header.content_type.clone(),
        data,
    };
    Ok((header, artifact))
}
