//! Storage data structures.
//!
//! Defines the artifact payload type and the outcome/statistics types the
//! store reports to its callers.

use serde::{Deserialize, Serialize};

use crate::cache_key::CacheKey;

/// What an artifact's bytes represent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Rendered image in the requested output format
    Image,
    /// JSON statistics report
    Statistics,
    /// JSON point set ready for rendering
    PointSet,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Statistics => "statistics",
            ArtifactKind::PointSet => "point_set",
        }
    }
}

/// An opaque payload produced by the computation engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,

    /// MIME type of `data`, e.g. `application/json` or `image/png`
    pub content_type: String,

    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            kind,
            content_type: content_type.into(),
            data,
        }
    }

    /// JSON artifact of the given kind.
    pub fn json(kind: ArtifactKind, data: Vec<u8>) -> Self {
        Self::new(kind, "application/json", data)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A successfully persisted entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: CacheKey,

    /// Bytes written to disk (header + possibly compressed payload)
    pub file_bytes: u64,

    /// Entries removed by the eviction pass that followed the write
    pub evicted: usize,
}

/// Result of a best-effort `put`. Only parameter errors are raised; every
/// storage problem is reported here instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Stored(StoredEntry),

    /// Payload exceeded the size limit; nothing was written
    TooLarge { size: u64, limit: u64 },

    /// Write failed; the store is unchanged
    Failed(String),
}

impl PutOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PutOutcome::Stored(_))
    }
}

/// Store statistics snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Entries currently on disk
    pub entry_count: usize,
    /// Sum of entry file sizes
    pub total_bytes: u64,
    /// Lookups that returned an artifact
    pub hits: u64,
    /// Lookups since open or the last clear
    pub requests: u64,
    /// `hits / max(requests, 1)`
    pub hit_ratio: f64,
    pub max_entries: usize,
    /// Zero when expiry is disabled
    pub ttl_secs: u64,
}

impl StoreStats {
    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}
