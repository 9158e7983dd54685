//! Snapshot of the store contents as `index.json`.
//!
//! The index is informational: lookups never read it. The pipeline rewrites
//! it after each run so external tools can browse what has been generated.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use super::atomic_file::write_atomic;
use super::types::ArtifactKind;
use crate::cache_key::CacheKey;
use crate::params::CanonicalParams;

pub const INDEX_FILE_NAME: &str = "index.json";
pub const INDEX_VERSION: u32 = 1;

/// One live entry as seen by its header and file metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: CacheKey,
    pub params: CanonicalParams,
    pub kind: ArtifactKind,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at_ms: u64,
    /// File modification time; refreshed on every hit
    pub last_access_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreIndex {
    pub version: u32,
    pub generated_at_ms: u64,
    pub total_count: usize,
    pub total_bytes: u64,
    pub entries: Vec<IndexEntry>,
}

impl StoreIndex {
    pub fn new(mut entries: Vec<IndexEntry>, generated_at_ms: u64) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            version: INDEX_VERSION,
            generated_at_ms,
            total_count: entries.len(),
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            entries,
        }
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_atomic(path, &json)
    }

    /// `Ok(None)` when no index has been written yet.
    pub fn load(path: &Path) -> io::Result<Option<Self>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
