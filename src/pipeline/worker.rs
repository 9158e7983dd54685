//! Batch pre-computation worker.
//!
//! Walks an enumerated configuration list, skips every configuration the
//! store already holds and computes the rest. A restarted run therefore
//! resumes purely through store lookups.
//!
//! # States
//!
//! `Starting -> Running -> (Paused during backoff) -> Draining -> Finished`
//!
//! Cancellation stops the loop between configurations: in-flight work is
//! allowed to finish, then the run drains (stats and index are written).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use log::{debug, error, info, warn};

use super::stats::{PipelineState, PipelineStats};
use crate::engine::ComputationEngine;
use crate::enumerator::EnumeratedConfiguration;
use crate::error::{CacheError, ComputationError, Result};
use crate::params::CanonicalParams;
use crate::storage::{Artifact, ArtifactStore};

/// Produces the artifact for one canonical parameter set.
///
/// Implemented by [`ComputationEngine`]; tests substitute their own.
pub trait ArtifactProducer: Send + Sync + 'static {
    fn produce(&self, params: &CanonicalParams) -> std::result::Result<Artifact, ComputationError>;
}

impl ArtifactProducer for ComputationEngine {
    fn produce(&self, params: &CanonicalParams) -> std::result::Result<Artifact, ComputationError> {
        ComputationEngine::produce(self, params)
    }
}

/// Configuration for the batch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause after each generated artifact
    pub pacing_ms: u64,
    /// Consecutive failures tolerated before backing off
    pub error_threshold: u32,
    /// Length of a backoff pause
    pub backoff_secs: u64,
    /// Persist stats every N generated artifacts
    pub persist_every: u64,
    /// Interval of the liveness log line
    pub heartbeat_secs: u64,
    /// Log a skip summary every N skipped configurations
    pub skip_log_every: u64,
    /// Where the stats snapshot is written
    pub stats_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing_ms: 100,
            error_threshold: 5,
            backoff_secs: 30,
            persist_every: 10,
            heartbeat_secs: 300,
            skip_log_every: 100,
            stats_path: PathBuf::from("./var/cache/pipeline_stats.json"),
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub generated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub oversized: u64,
    pub processed: u64,
    pub total: u64,
    pub cancelled: bool,
}

/// Result of handling a single configuration.
enum Step {
    Skipped,
    Generated { bytes: u64 },
    Oversized,
    Failed,
}

/// Batch pipeline over a shared store.
pub struct BatchPipeline<P: ArtifactProducer> {
    store: Arc<ArtifactStore>,
    producer: Arc<P>,
    config: PipelineConfig,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
}

impl<P: ArtifactProducer> BatchPipeline<P> {
    pub fn new(store: Arc<ArtifactStore>, producer: Arc<P>, config: PipelineConfig) -> Self {
        let stats = Arc::new(PipelineStats::new(config.stats_path.clone()));
        Self {
            store,
            producer,
            config,
            stats,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one cancelled by a signal handler.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    fn transition(&self, state: PipelineState) {
        self.stats.set_state(state);
        info!("Pipeline state -> {}", state);
        self.persist_stats();
    }

    fn persist_stats(&self) {
        if let Err(e) = self.stats.persist() {
            warn!(
                "Failed to persist pipeline stats to {}: {}",
                self.stats.path().display(),
                e
            );
        }
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn spawn_heartbeat(&self, stop: CancellationToken) -> tokio::task::JoinHandle<()> {
        let stats = self.stats.clone();
        let period = Duration::from_secs(self.config.heartbeat_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let s = stats.snapshot();
                        info!(
                            "Heartbeat: {} | {}/{} processed, {} generated, {} skipped, {} failed",
                            s.current_task.as_deref().unwrap_or("idle"),
                            s.processed,
                            s.total_configurations,
                            s.generated,
                            s.skipped,
                            s.failed
                        );
                    }
                }
            }
        })
    }

    /// Process every configuration in order.
    ///
    /// Per-configuration failures are counted, never returned. The run only
    /// stops early on cancellation.
    pub async fn run(&self, configurations: Vec<EnumeratedConfiguration>) -> Result<RunSummary> {
        let total = configurations.len() as u64;
        self.stats.set_total(total);
        self.transition(PipelineState::Starting);
        info!(
            "Pipeline starting: {} configurations, store at {}",
            total,
            self.store.dir().display()
        );

        let heartbeat_stop = self.cancel.child_token();
        let heartbeat = self.spawn_heartbeat(heartbeat_stop.clone());

        self.transition(PipelineState::Running);

        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };
        let mut consecutive_errors: u32 = 0;

        for (position, config) in configurations.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            summary.processed += 1;
            self.stats.record_processed();

            match self.process(position, total, config).await {
                Step::Skipped => {
                    summary.skipped += 1;
                    let skipped = self.stats.record_skipped();
                    if skipped % self.config.skip_log_every.max(1) == 0 {
                        info!(
                            "[{}/{}] {} configurations already cached so far",
                            position + 1,
                            total,
                            skipped
                        );
                    }
                    continue;
                }
                Step::Generated { bytes } => {
                    summary.generated += 1;
                    consecutive_errors = 0;
                    let generated = self.stats.record_generated(bytes);
                    if generated % self.config.persist_every.max(1) == 0 {
                        self.persist_stats();
                        info!(
                            "Progress: {} generated this run, {} entries in store",
                            generated,
                            self.store.stats().entry_count
                        );
                    }
                }
                Step::Oversized => {
                    summary.oversized += 1;
                    self.stats.record_oversized();
                }
                Step::Failed => {
                    summary.failed += 1;
                    consecutive_errors += 1;
                    self.stats.record_failed();
                }
            }

            if consecutive_errors > self.config.error_threshold {
                self.transition(PipelineState::Paused);
                warn!(
                    "{} consecutive failures, backing off for {}s",
                    consecutive_errors, self.config.backoff_secs
                );
                let completed = self
                    .pause(Duration::from_secs(self.config.backoff_secs))
                    .await;
                consecutive_errors = 0;
                if !completed {
                    summary.cancelled = true;
                    break;
                }
                info!("Backoff finished, resuming");
                self.transition(PipelineState::Running);
            } else if !self.pause(Duration::from_millis(self.config.pacing_ms)).await {
                summary.cancelled = true;
                break;
            }
        }

        if summary.cancelled {
            info!("Cancellation received, draining");
        }
        self.transition(PipelineState::Draining);

        heartbeat_stop.cancel();
        if let Err(e) = heartbeat.await {
            debug!("Heartbeat task ended abnormally: {}", e);
        }

        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.write_index()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to write store index: {}", e),
            Err(e) => warn!("Index task failed: {}", e),
        }

        self.transition(PipelineState::Finished);
        info!(
            "Pipeline finished: {} generated, {} skipped, {} failed, {} oversized ({}/{} processed{})",
            summary.generated,
            summary.skipped,
            summary.failed,
            summary.oversized,
            summary.processed,
            summary.total,
            if summary.cancelled { ", cancelled" } else { "" }
        );

        Ok(summary)
    }

    async fn process(&self, position: usize, total: u64, config: &EnumeratedConfiguration) -> Step {
        let (key, canonical) = match self.store.canonicalizer().resolve(&config.params) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("[{}/{}] Invalid configuration {}: {}", position + 1, total, config.label(), e);
                return Step::Failed;
            }
        };

        if self.store.contains_key(&key) {
            return Step::Skipped;
        }

        self.stats.set_current_task(config.label());
        info!(
            "[{}/{}] Generating {} = {} elements",
            position + 1,
            total,
            config.label(),
            config.total_elements
        );

        let started = Instant::now();
        let store = self.store.clone();
        let producer = self.producer.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<u64> {
            let artifact = producer.produce(&canonical)?;
            let stored = store.try_put(&key, &canonical, &artifact)?;
            Ok(stored.file_bytes)
        });

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(CacheError::Computation(ComputationError::Task(e.to_string()))),
        };

        match outcome {
            Ok(bytes) => {
                info!(
                    "  Stored {:?} ({:.1} KB) in {:.2}s",
                    key,
                    bytes as f64 / 1024.0,
                    started.elapsed().as_secs_f64()
                );
                Step::Generated { bytes }
            }
            Err(CacheError::ArtifactTooLarge { size, limit }) => {
                warn!(
                    "  Skipping {}: artifact of {} bytes exceeds {} byte limit",
                    config.label(),
                    size,
                    limit
                );
                Step::Oversized
            }
            Err(e) => {
                error!("[{}/{}] Failed {}: {}", position + 1, total, config.label(), e);
                Step::Failed
            }
        }
    }
}
