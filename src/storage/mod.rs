//! Disk-backed artifact storage.
//!
//! One file per cache entry, named by the entry's cache key:
//! - **Entries**: `<key>.cache` (record header + payload), replaced atomically
//! - **Index**: `index.json`, a snapshot of entry headers for external readers
//!
//! File modification time is the last-access and age signal. Hits refresh it;
//! eviction removes the oldest first.

pub mod artifact_store;
pub mod atomic_file;
pub mod index;
pub mod record;
pub mod types;

pub use artifact_store::{ArtifactStore, StoreConfig};
pub use index::{IndexEntry, StoreIndex};
pub use types::{Artifact, ArtifactKind, PutOutcome, StoreStats, StoredEntry};
