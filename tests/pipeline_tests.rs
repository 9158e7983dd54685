//! Integration tests for the batch pre-computation pipeline.
//!
//! Tests verify:
//! - A second run over the same space generates nothing
//! - Partially cached spaces resume through store lookups
//! - Failures and oversized artifacts are counted, never fatal
//! - Backoff starts only after more than `error_threshold` consecutive failures
//! - Cancellation stops the run between configurations and during backoff
//! - The stats file and the store index are written on exit

use mapcache::engine::MappingStrategy;
use mapcache::enumerator::{ConfigurationSpace, HighlightSet, StepRange, Tier};
use mapcache::pipeline::StatsSnapshot;
use mapcache::storage::{Artifact, ArtifactKind, ArtifactStore, StoreConfig};
use mapcache::{
    ArtifactProducer, BatchPipeline, CanonicalParams, ComputationEngine, ComputationError,
    EnumeratedConfiguration, PipelineConfig, PipelineState,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Three small linear configurations: 2x12, 4x12, 6x12.
fn small_space() -> Vec<EnumeratedConfiguration> {
    space(3)
}

/// `count` linear configurations with 2, 4, 6, ... rings and 12 segments.
fn space(count: u32) -> Vec<EnumeratedConfiguration> {
    ConfigurationSpace {
        tiers: vec![Tier {
            name: "tiny".to_string(),
            rings: StepRange::new(2, 2 * count, 2),
            segments: StepRange::new(12, 12, 1),
            mappings: vec![MappingStrategy::Linear],
        }],
        highlight_sets: vec![HighlightSet {
            name: "regular-twin".to_string(),
            regular: true,
            composite: false,
            patterns: vec![mapcache::engine::PatternKind::Twin],
        }],
        ..ConfigurationSpace::default()
    }
    .enumerate()
}

fn open_store(dir: &Path, configure: impl FnOnce(&mut StoreConfig)) -> Arc<ArtifactStore> {
    let mut config = StoreConfig::in_dir(dir.join("artifacts"));
    configure(&mut config);
    Arc::new(ArtifactStore::open(config).unwrap())
}

fn pipeline_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        pacing_ms: 0,
        backoff_secs: 0,
        stats_path: dir.join("stats").join("pipeline_stats.json"),
        ..PipelineConfig::default()
    }
}

fn engine_pipeline(store: Arc<ArtifactStore>, dir: &Path) -> BatchPipeline<ComputationEngine> {
    BatchPipeline::new(store, Arc::new(ComputationEngine::default()), pipeline_config(dir))
}

struct FailingProducer {
    calls: AtomicUsize,
}

impl ArtifactProducer for FailingProducer {
    fn produce(&self, _params: &CanonicalParams) -> Result<Artifact, ComputationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ComputationError::InvalidInput("engine unavailable".to_string()))
    }
}

/// Fails or succeeds per call, in script order. Calls past the script succeed.
struct ScriptedProducer {
    succeed: Vec<bool>,
    calls: AtomicUsize,
}

impl ScriptedProducer {
    fn new(succeed: &[bool]) -> Self {
        Self {
            succeed: succeed.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ArtifactProducer for ScriptedProducer {
    fn produce(&self, _params: &CanonicalParams) -> Result<Artifact, ComputationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed.get(call).copied().unwrap_or(true) {
            Ok(Artifact::json(ArtifactKind::PointSet, b"{}".to_vec()))
        } else {
            Err(ComputationError::InvalidInput("disk full".to_string()))
        }
    }
}

/// Produces a fixed artifact and cancels the run on its first call.
struct CancellingProducer {
    token: CancellationToken,
}

impl ArtifactProducer for CancellingProducer {
    fn produce(&self, _params: &CanonicalParams) -> Result<Artifact, ComputationError> {
        self.token.cancel();
        Ok(Artifact::json(ArtifactKind::PointSet, b"{}".to_vec()))
    }
}

// ============================================================================
// RESUMPTION TESTS
// ============================================================================

#[tokio::test]
async fn test_second_run_generates_nothing() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let configurations = small_space();
    assert_eq!(configurations.len(), 3);

    let first = engine_pipeline(store.clone(), tmp_dir.path())
        .run(configurations.clone())
        .await
        .unwrap();
    assert_eq!(first.generated, 3);
    assert_eq!(first.skipped, 0);
    assert!(!first.cancelled);

    let second = engine_pipeline(store.clone(), tmp_dir.path())
        .run(configurations)
        .await
        .unwrap();
    assert_eq!(second.generated, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.processed, 3);
    assert_eq!(store.stats().entry_count, 3);
}

#[tokio::test]
async fn test_partially_cached_space_resumes() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let configurations = small_space();

    store
        .put(
            &configurations[1].params,
            &Artifact::json(ArtifactKind::PointSet, b"{\"elements\":[]}".to_vec()),
        )
        .unwrap();

    let summary = engine_pipeline(store.clone(), tmp_dir.path())
        .run(configurations)
        .await
        .unwrap();
    assert_eq!(summary.generated, 2);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_generated_artifacts_are_retrievable() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let configurations = small_space();

    engine_pipeline(store.clone(), tmp_dir.path())
        .run(configurations.clone())
        .await
        .unwrap();

    let artifact = store.get(&configurations[0].params).unwrap().unwrap();
    assert_eq!(artifact.kind, ArtifactKind::PointSet);
    let body: serde_json::Value = serde_json::from_slice(&artifact.data).unwrap();
    assert_eq!(body["metadata"]["rings"], 2);
    assert_eq!(body["metadata"]["segments"], 12);
    assert!(body["elements"].as_array().map_or(false, |e| !e.is_empty()));
}

// ============================================================================
// FAILURE HANDLING TESTS
// ============================================================================

#[tokio::test]
async fn test_failures_are_counted_and_run_completes() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let producer = Arc::new(FailingProducer {
        calls: AtomicUsize::new(0),
    });
    let config = PipelineConfig {
        error_threshold: 1,
        ..pipeline_config(tmp_dir.path())
    };

    let pipeline = BatchPipeline::new(store.clone(), producer.clone(), config);
    let summary = pipeline.run(small_space()).await.unwrap();

    assert_eq!(summary.failed, 3);
    assert_eq!(summary.generated, 0);
    assert!(!summary.cancelled);
    assert_eq!(producer.calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.stats().entry_count, 0);
    assert_eq!(pipeline.stats().snapshot().state, PipelineState::Finished);
}

#[tokio::test]
async fn test_oversized_artifacts_are_not_failures() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |c| c.max_artifact_bytes = 8);

    let summary = engine_pipeline(store.clone(), tmp_dir.path())
        .run(small_space())
        .await
        .unwrap();

    assert_eq!(summary.oversized, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(store.stats().entry_count, 0);
}

// ============================================================================
// BACKOFF TESTS
// ============================================================================

#[tokio::test]
async fn test_backoff_after_threshold_then_resumes() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let producer = Arc::new(ScriptedProducer::new(&[false, false, true]));
    let config = PipelineConfig {
        error_threshold: 1,
        backoff_secs: 1,
        ..pipeline_config(tmp_dir.path())
    };

    let started = Instant::now();
    let summary = BatchPipeline::new(store.clone(), producer, config)
        .run(space(3))
        .await
        .unwrap();

    // Second consecutive failure exceeds the threshold of one
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.processed, 3);
    assert!(!summary.cancelled);
    assert_eq!(store.stats().entry_count, 1);
}

#[tokio::test]
async fn test_failures_at_threshold_do_not_back_off() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let producer = Arc::new(ScriptedProducer::new(&[false, false, false]));
    let config = PipelineConfig {
        error_threshold: 3,
        backoff_secs: 60,
        ..pipeline_config(tmp_dir.path())
    };

    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        BatchPipeline::new(store, producer, config).run(space(3)),
    )
    .await
    .expect("three failures must not trigger a backoff")
    .unwrap();
    assert_eq!(summary.failed, 3);
}

#[tokio::test]
async fn test_success_resets_consecutive_failures() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let producer = Arc::new(ScriptedProducer::new(&[false, false, true, false, false]));
    let config = PipelineConfig {
        error_threshold: 2,
        backoff_secs: 60,
        ..pipeline_config(tmp_dir.path())
    };

    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        BatchPipeline::new(store, producer, config).run(space(5)),
    )
    .await
    .expect("no run of failures exceeds the threshold")
    .unwrap();
    assert_eq!(summary.failed, 4);
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.processed, 5);
}

#[tokio::test]
async fn test_cancel_during_backoff_ends_run() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let producer = Arc::new(ScriptedProducer::new(&[false]));
    let config = PipelineConfig {
        error_threshold: 0,
        backoff_secs: 3600,
        ..pipeline_config(tmp_dir.path())
    };

    let pipeline = BatchPipeline::new(store, producer, config);
    let stats = pipeline.stats();
    let token = pipeline.cancellation_token();

    let watcher = tokio::spawn(async move {
        // Wait for the backoff to start, then cancel
        let mut state = stats.snapshot().state;
        for _ in 0..100 {
            state = stats.snapshot().state;
            if state == PipelineState::Paused {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        token.cancel();
        state
    });

    let summary = tokio::time::timeout(Duration::from_secs(30), pipeline.run(space(3)))
        .await
        .expect("cancellation must interrupt the backoff")
        .unwrap();

    assert_eq!(watcher.await.unwrap(), PipelineState::Paused);
    assert!(summary.cancelled);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(pipeline.stats().snapshot().state, PipelineState::Finished);
}

// ============================================================================
// CANCELLATION TESTS
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start_processes_nothing() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let token = CancellationToken::new();
    token.cancel();

    let summary = engine_pipeline(store, tmp_dir.path())
        .with_cancellation(token)
        .run(small_space())
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.total, 3);
}

#[tokio::test]
async fn test_cancellation_keeps_in_flight_work() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let token = CancellationToken::new();
    let producer = Arc::new(CancellingProducer {
        token: token.clone(),
    });

    let pipeline = BatchPipeline::new(store.clone(), producer, pipeline_config(tmp_dir.path()))
        .with_cancellation(token);
    let summary = pipeline.run(small_space()).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(store.stats().entry_count, 1);
}

// ============================================================================
// PERSISTENCE TESTS
// ============================================================================

#[tokio::test]
async fn test_stats_file_written_on_finish() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});
    let config = pipeline_config(tmp_dir.path());
    let stats_path = config.stats_path.clone();

    let pipeline = BatchPipeline::new(store, Arc::new(ComputationEngine::default()), config);
    pipeline.run(small_space()).await.unwrap();

    let snapshot = StatsSnapshot::load(&stats_path).unwrap().unwrap();
    assert_eq!(snapshot.state, PipelineState::Finished);
    assert_eq!(snapshot.generated, 3);
    assert_eq!(snapshot.processed, 3);
    assert_eq!(snapshot.total_configurations, 3);
    assert!(snapshot.total_bytes > 0);
    assert!(snapshot.finished_at.is_some());
    assert!(snapshot.current_task.is_none());
}

#[tokio::test]
async fn test_index_written_on_finish() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = open_store(tmp_dir.path(), |_| {});

    engine_pipeline(store.clone(), tmp_dir.path())
        .run(small_space())
        .await
        .unwrap();

    let index = store.load_index().unwrap().unwrap();
    assert_eq!(index.total_count, 3);
    let mut rings: Vec<i64> = index.entries.iter().filter_map(|e| e.params.rings()).collect();
    rings.sort();
    assert_eq!(rings, vec![2, 4, 6]);
}
