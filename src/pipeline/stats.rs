//! # Pipeline Stats
//!
//! Thread-safe progress counters for a batch run, persisted as JSON so an
//! external supervisor can watch liveness without talking to the process.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::storage::atomic_file::write_atomic;

/// Lifecycle of a batch run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Starting,
    Running,
    /// Backing off after repeated failures
    Paused,
    Draining,
    Finished,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Starting => "starting",
            PipelineState::Running => "running",
            PipelineState::Paused => "paused",
            PipelineState::Draining => "draining",
            PipelineState::Finished => "finished",
        })
    }
}

/// What the stats file contains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub run_id: String,
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub current_task: Option<String>,
    pub generated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub oversized: u64,
    pub total_bytes: u64,
    pub processed: u64,
    pub total_configurations: u64,
}

impl StatsSnapshot {
    /// Read a stats file. `Ok(None)` when it does not exist.
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

/// Shared recorder for one run.
pub struct PipelineStats {
    path: PathBuf,
    inner: RwLock<StatsSnapshot>,
}

impl fmt::Debug for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStats")
            .field("path", &self.path)
            .field("state", &self.inner.read().state)
            .finish()
    }
}

impl PipelineStats {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            path: path.into(),
            inner: RwLock::new(StatsSnapshot {
                run_id: uuid::Uuid::new_v4().to_string(),
                state: PipelineState::Starting,
                started_at: now,
                last_activity: now,
                finished_at: None,
                current_task: None,
                generated: 0,
                skipped: 0,
                failed: 0,
                oversized: 0,
                total_bytes: 0,
                processed: 0,
                total_configurations: 0,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut StatsSnapshot)) {
        let mut inner = self.inner.write();
        f(&mut inner);
        inner.last_activity = Utc::now();
    }

    pub fn set_total(&self, total: u64) {
        self.update(|s| s.total_configurations = total);
    }

    pub fn set_state(&self, state: PipelineState) {
        self.update(|s| {
            s.state = state;
            if state == PipelineState::Finished {
                s.finished_at = Some(Utc::now());
                s.current_task = None;
            }
        });
    }

    pub fn set_current_task(&self, task: impl Into<String>) {
        let task = task.into();
        self.update(|s| s.current_task = Some(task));
    }

    pub fn record_processed(&self) {
        self.update(|s| s.processed += 1);
    }

    /// Returns the new skipped count.
    pub fn record_skipped(&self) -> u64 {
        let mut skipped = 0;
        self.update(|s| {
            s.skipped += 1;
            skipped = s.skipped;
        });
        skipped
    }

    /// Returns the new generated count.
    pub fn record_generated(&self, bytes: u64) -> u64 {
        let mut generated = 0;
        self.update(|s| {
            s.generated += 1;
            s.total_bytes += bytes;
            generated = s.generated;
        });
        generated
    }

    pub fn record_failed(&self) {
        self.update(|s| s.failed += 1);
    }

    pub fn record_oversized(&self) {
        self.update(|s| s.oversized += 1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.read().clone()
    }

    /// Write the current snapshot to the stats file (temp + rename).
    pub fn persist(&self) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(&self.snapshot())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&self.path, &json)
    }
}
