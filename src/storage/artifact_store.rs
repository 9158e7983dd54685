//! Disk-backed artifact store keyed by canonical parameter digests.
//!
//! Every write goes to a uniquely named temp file and is renamed into place,
//! so concurrent readers and writers (including separate processes sharing
//! the directory) only ever observe complete entries. Lookups never fail the
//! caller: unreadable or corrupt entries are logged and treated as misses.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::atomic_file::{write_atomic, TEMP_SUFFIX};
use super::index::{IndexEntry, StoreIndex, INDEX_FILE_NAME};
use super::record;
use super::types::{Artifact, PutOutcome, StoreStats, StoredEntry};
use crate::cache_key::{CacheKey, KeyCanonicalizer};
use crate::error::{CacheError, Result};
use crate::params::{CanonicalParams, ParameterSchema, ParameterSet};
use crate::types::{age_of, now_ms, system_time_ms};

/// Extension of committed entry files.
pub const ENTRY_EXTENSION: &str = "cache";

/// Store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one file per entry
    pub dir: PathBuf,

    /// Entry lifetime in seconds since last access; 0 disables expiry
    pub ttl_secs: u64,

    /// Entry count that triggers eviction
    pub max_entries: usize,

    /// Artifacts larger than this are never written
    pub max_artifact_bytes: u64,

    /// Extra entries removed per eviction pass so the next few writes
    /// don't evict again
    pub eviction_margin: usize,

    /// Gzip payloads on disk
    pub compress: bool,

    /// Leftover temp files older than this are removed at open
    pub stale_temp_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./var/cache/artifacts"),
            ttl_secs: 7200,
            max_entries: 50,
            max_artifact_bytes: 50 * 1024 * 1024,
            eviction_margin: 5,
            compress: true,
            stale_temp_secs: 3600,
        }
    }
}

impl StoreConfig {
    /// Default settings rooted at `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

#[derive(Debug, Default)]
struct AccessCounters {
    hits: u64,
    requests: u64,
}

/// A committed entry file found while scanning the directory.
struct EntryFile {
    key: CacheKey,
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Persistent artifact cache.
pub struct ArtifactStore {
    config: StoreConfig,
    canonicalizer: KeyCanonicalizer,
    counters: RwLock<AccessCounters>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("dir", &self.config.dir)
            .field("max_entries", &self.config.max_entries)
            .field("ttl_secs", &self.config.ttl_secs)
            .finish()
    }
}

impl ArtifactStore {
    /// Open or create a store with the visualization schema.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::open_with_schema(config, ParameterSchema::visualization())
    }

    /// Open or create a store.
    ///
    /// Fails with [`CacheError::StoreUnavailable`] when the directory cannot
    /// be created or written. Expired entries and stale temp files are purged.
    pub fn open_with_schema(config: StoreConfig, schema: ParameterSchema) -> Result<Self> {
        let dir = config.dir.clone();
        fs::create_dir_all(&dir).map_err(|source| CacheError::StoreUnavailable {
            path: dir.clone(),
            source,
        })?;
        Self::probe_writable(&dir)?;

        let store = Self {
            config,
            canonicalizer: KeyCanonicalizer::new(schema),
            counters: RwLock::new(AccessCounters::default()),
        };

        let stale = store.remove_stale_temp_files();
        let expired = store.purge_expired();
        log::info!(
            "Opened artifact store at {} ({} entries, {} expired purged, {} stale temp files removed)",
            dir.display(),
            store.entry_files().map(|e| e.len()).unwrap_or(0),
            expired,
            stale
        );

        Ok(store)
    }

    fn probe_writable(dir: &Path) -> Result<()> {
        let probe = dir.join(format!(
            ".probe.{}.{}",
            uuid::Uuid::new_v4().simple(),
            TEMP_SUFFIX
        ));
        let unavailable = |source| CacheError::StoreUnavailable {
            path: dir.to_path_buf(),
            source,
        };
        fs::write(&probe, b"probe").map_err(unavailable)?;
        fs::remove_file(&probe).map_err(unavailable)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn canonicalizer(&self) -> &KeyCanonicalizer {
        &self.canonicalizer
    }

    /// File holding the entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.config
            .dir
            .join(format!("{}.{}", key.to_hex(), ENTRY_EXTENSION))
    }

    pub fn index_path(&self) -> PathBuf {
        self.config.dir.join(INDEX_FILE_NAME)
    }

    fn is_expired(&self, modified: SystemTime) -> bool {
        self.config
            .ttl()
            .map_or(false, |ttl| age_of(modified) > ttl)
    }

    // ============================================================================================
    // LOOKUP
    // ============================================================================================

    /// Look up the artifact for a parameter set.
    ///
    /// Only an invalid parameter set is an error; storage failures are
    /// logged and reported as a miss.
    pub fn get(&self, params: &ParameterSet) -> Result<Option<Artifact>> {
        let key = self.canonicalizer.key(params)?;
        Ok(self.get_by_key(&key))
    }

    /// Look up by key. Counts toward hit/request statistics.
    pub fn get_by_key(&self, key: &CacheKey) -> Option<Artifact> {
        let result = match self.try_get(key) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Cache read for {:?} failed, treating as miss: {}", key, e);
                None
            }
        };

        let mut counters = self.counters.write();
        counters.requests += 1;
        if result.is_some() {
            counters.hits += 1;
        }
        result
    }

    /// Raw lookup that surfaces I/O and decode failures. Does not touch the
    /// hit/request counters.
    ///
    /// Expired entries are deleted and reported as absent. Corrupt entries
    /// are deleted and reported as an error. A hit refreshes the entry's
    /// last-access time.
    pub fn try_get(&self, key: &CacheKey) -> Result<Option<Artifact>> {
        let path = self.entry_path(key);
        let Some(modified) = self.live_modified(&path)? else {
            return Ok(None);
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            // Evicted or cleared between stat and read
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        let (header, artifact) = match record::decode(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.discard_corrupt(&path);
                return Err(CacheError::io(&path, e));
            }
        };
        if header.key != key.to_hex() {
            self.discard_corrupt(&path);
            return Err(CacheError::io(
                &path,
                io::Error::new(io::ErrorKind::InvalidData, "entry key does not match file name"),
            ));
        }

        log::trace!(
            "Cache hit {:?} ({} bytes, age {:?})",
            key,
            artifact.len(),
            age_of(modified)
        );
        self.touch(&path);
        Ok(Some(artifact))
    }

    /// Whether a live entry exists for the parameter set. Does not decode
    /// the entry and does not count as a request.
    pub fn contains(&self, params: &ParameterSet) -> Result<bool> {
        let key = self.canonicalizer.key(params)?;
        Ok(self.contains_key(&key))
    }

    /// Existence probe. Expires and touches like a lookup but does not
    /// decode the payload or count as a request.
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        let path = self.entry_path(key);
        match self.live_modified(&path) {
            Ok(Some(_)) => {
                self.touch(&path);
                true
            }
            Ok(None) => false,
            Err(e) => {
                log::warn!("Cache probe for {:?} failed: {}", key, e);
                false
            }
        }
    }

    /// Modification time of a live entry file. Expired files are removed
    /// and reported as absent.
    fn live_modified(&self, path: &Path) -> Result<Option<SystemTime>> {
        let modified = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        if self.is_expired(modified) {
            log::debug!("Entry {} expired, removing", path.display());
            remove_if_present(path).map_err(|e| CacheError::io(path, e))?;
            return Ok(None);
        }
        Ok(Some(modified))
    }

    fn touch(&self, path: &Path) {
        let result = OpenOptions::new()
            .append(true)
            .open(path)
            .and_then(|file| file.set_modified(SystemTime::now()));
        if let Err(e) = result {
            log::warn!("Failed to refresh access time of {}: {}", path.display(), e);
        }
    }

    fn discard_corrupt(&self, path: &Path) {
        log::warn!("Removing corrupt cache entry {}", path.display());
        if let Err(e) = remove_if_present(path) {
            log::warn!("Failed to remove corrupt entry {}: {}", path.display(), e);
        }
    }

    // ============================================================================================
    // WRITE
    // ============================================================================================

    /// Best-effort write. Only an invalid parameter set is an error; size
    /// rejections and I/O failures come back as the outcome.
    pub fn put(&self, params: &ParameterSet, artifact: &Artifact) -> Result<PutOutcome> {
        let (key, canonical) = self.canonicalizer.resolve(params)?;

        Ok(match self.try_put(&key, &canonical, artifact) {
            Ok(stored) => PutOutcome::Stored(stored),
            Err(CacheError::ArtifactTooLarge { size, limit }) => {
                log::info!(
                    "Skipping cache write for {:?}: {} bytes exceeds limit of {} bytes",
                    key,
                    size,
                    limit
                );
                PutOutcome::TooLarge { size, limit }
            }
            Err(e) => {
                log::warn!("Cache write for {:?} failed: {}", key, e);
                PutOutcome::Failed(e.to_string())
            }
        })
    }

    /// Write an entry for already-canonical parameters, then evict if the
    /// store is full. The new entry is never chosen for eviction.
    pub fn try_put(
        &self,
        key: &CacheKey,
        canonical: &CanonicalParams,
        artifact: &Artifact,
    ) -> Result<StoredEntry> {
        let size = artifact.len() as u64;
        if size > self.config.max_artifact_bytes {
            return Err(CacheError::ArtifactTooLarge {
                size,
                limit: self.config.max_artifact_bytes,
            });
        }

        let path = self.entry_path(key);
        let bytes = record::encode(
            &key.to_hex(),
            &canonical.to_canonical_json(),
            artifact,
            now_ms(),
            self.config.compress,
        )
        .map_err(|e| CacheError::io(&path, e))?;

        write_atomic(&path, &bytes).map_err(|e| CacheError::io(&path, e))?;
        log::debug!("Stored {:?} ({} bytes on disk)", key, bytes.len());

        let evicted = self.evict_excess(key);
        Ok(StoredEntry {
            key: *key,
            file_bytes: bytes.len() as u64,
            evicted,
        })
    }

    /// When the entry count meets or exceeds `max_entries`, remove the
    /// oldest-accessed entries until `count - max_entries + margin` are gone
    /// (margin at least 1).
    fn evict_excess(&self, keep: &CacheKey) -> usize {
        let mut entries = match self.entry_files() {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Eviction scan failed: {}", e);
                return 0;
            }
        };

        let count = entries.len();
        if count < self.config.max_entries {
            return 0;
        }

        // A margin of at least one leaves the store strictly under the limit
        let target = count - self.config.max_entries + self.config.eviction_margin.max(1);
        entries.sort_by_key(|e| e.modified);

        let mut removed = 0;
        for entry in entries.iter().filter(|e| e.key != *keep) {
            if removed >= target {
                break;
            }
            match remove_if_present(&entry.path) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Failed to evict {}: {}", entry.path.display(), e),
            }
        }

        log::info!(
            "Evicted {} entries ({} present, max {})",
            removed,
            count,
            self.config.max_entries
        );
        removed
    }

    /// Delete the entry for a parameter set. Returns whether one existed.
    pub fn remove(&self, params: &ParameterSet) -> Result<bool> {
        let path = self.entry_path(&self.canonicalizer.key(params)?);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Remove every entry, temp file and the index, and reset the counters.
    /// Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize> {
        let read_dir =
            fs::read_dir(&self.config.dir).map_err(|e| CacheError::io(&self.config.dir, e))?;

        let mut removed = 0;
        let mut first_error = None;
        for dir_entry in read_dir.flatten() {
            let path = dir_entry.path();
            let is_entry = has_extension(&path, ENTRY_EXTENSION);
            let is_owned = is_entry
                || has_extension(&path, TEMP_SUFFIX)
                || path.file_name().map_or(false, |n| n == INDEX_FILE_NAME);
            if !is_owned {
                continue;
            }
            match remove_if_present(&path) {
                Ok(()) if is_entry => removed += 1,
                Ok(()) => {}
                Err(e) => {
                    log::warn!("Failed to remove {}: {}", path.display(), e);
                    first_error.get_or_insert(CacheError::io(&path, e));
                }
            }
        }

        *self.counters.write() = AccessCounters::default();
        log::info!("Cleared artifact store: {} entries removed", removed);

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    // ============================================================================================
    // MAINTENANCE
    // ============================================================================================

    /// Delete every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        if self.config.ttl().is_none() {
            return 0;
        }
        let entries = match self.entry_files() {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Expiry scan failed: {}", e);
                return 0;
            }
        };

        entries
            .iter()
            .filter(|e| self.is_expired(e.modified))
            .filter(|e| match remove_if_present(&e.path) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("Failed to purge {}: {}", e.path.display(), err);
                    false
                }
            })
            .count()
    }

    fn remove_stale_temp_files(&self) -> usize {
        let Ok(read_dir) = fs::read_dir(&self.config.dir) else {
            return 0;
        };
        let max_age = Duration::from_secs(self.config.stale_temp_secs);

        read_dir
            .flatten()
            .map(|e| e.path())
            .filter(|p| has_extension(p, TEMP_SUFFIX))
            .filter(|p| {
                fs::metadata(p)
                    .and_then(|m| m.modified())
                    .map_or(false, |t| age_of(t) > max_age)
            })
            .filter(|p| remove_if_present(p).is_ok())
            .count()
    }

    fn entry_files(&self) -> io::Result<Vec<EntryFile>> {
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.config.dir)?.flatten() {
            let path = dir_entry.path();
            if !has_extension(&path, ENTRY_EXTENSION) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(CacheKey::from_hex)
            else {
                continue;
            };
            // Removed concurrently
            let Ok(metadata) = dir_entry.metadata() else {
                continue;
            };
            entries.push(EntryFile {
                key,
                path,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }

    /// Entry count, total bytes and hit ratio.
    pub fn stats(&self) -> StoreStats {
        let (entry_count, total_bytes) = match self.entry_files() {
            Ok(entries) => (entries.len(), entries.iter().map(|e| e.size).sum()),
            Err(e) => {
                log::warn!("Stats scan failed: {}", e);
                (0, 0)
            }
        };
        let counters = self.counters.read();

        StoreStats {
            entry_count,
            total_bytes,
            hits: counters.hits,
            requests: counters.requests,
            hit_ratio: counters.hits as f64 / counters.requests.max(1) as f64,
            max_entries: self.config.max_entries,
            ttl_secs: self.config.ttl_secs,
        }
    }

    // ============================================================================================
    // INDEX
    // ============================================================================================

    /// Read the header of every live entry. Used by the similarity resolver
    /// and the index writer. Does not refresh access times.
    pub fn scan_index(&self) -> Vec<IndexEntry> {
        let entries = match self.entry_files() {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Index scan failed: {}", e);
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter(|e| !self.is_expired(e.modified))
            .filter_map(|e| match read_index_entry(&e) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::debug!("Skipping unreadable entry {}: {}", e.path.display(), err);
                    None
                }
            })
            .collect()
    }

    /// Write `index.json` atomically and return what was written.
    pub fn write_index(&self) -> Result<StoreIndex> {
        let index = StoreIndex::new(self.scan_index(), now_ms());
        let path = self.index_path();
        index.write(&path).map_err(|e| CacheError::io(&path, e))?;
        log::info!(
            "Wrote store index: {} entries, {} bytes",
            index.total_count,
            index.total_bytes
        );
        Ok(index)
    }

    /// The last index written, if any.
    pub fn load_index(&self) -> Result<Option<StoreIndex>> {
        let path = self.index_path();
        StoreIndex::load(&path).map_err(|e| CacheError::io(&path, e))
    }
}

fn read_index_entry(entry: &EntryFile) -> io::Result<IndexEntry> {
    let mut reader = BufReader::new(File::open(&entry.path)?);
    let header = record::read_header(&mut reader)?;
    if header.key != entry.key.to_hex() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "entry key does not match file name",
        ));
    }
    let params = CanonicalParams::from_canonical_json(&header.params_json)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    Ok(IndexEntry {
        key: entry.key,
        params,
        kind: header.kind,
        content_type: header.content_type,
        size_bytes: entry.size,
        created_at_ms: header.created_at_ms,
        last_access_ms: system_time_ms(entry.modified),
    })
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().map_or(false, |e| e == ext)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
