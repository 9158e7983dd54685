//! Batch pre-computation pipeline.

pub mod stats;
pub mod worker;

pub use stats::{PipelineState, PipelineStats, StatsSnapshot};
pub use worker::{ArtifactProducer, BatchPipeline, PipelineConfig, RunSummary};
