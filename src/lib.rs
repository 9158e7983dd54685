//! # Prime Map Cache
//!
//! Parametric artifact cache and batch pre-computation pipeline for
//! prime-pattern maps.
//!
//! - [`params`] / [`cache_key`]: parameter sets, normalization, content keys
//! - [`storage`]: disk-backed artifact store with TTL and bounded size
//! - [`engine`]: sieve, pattern classification, geometric mapping, statistics
//! - [`enumerator`]: the configuration space the pipeline pre-computes
//! - [`pipeline`]: resumable batch worker with persisted progress
//! - [`similarity`]: nearest stored entry when there is no exact hit

pub mod cache_key;
pub mod config;
pub mod engine;
pub mod enumerator;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod similarity;
pub mod storage;
pub mod types;

pub use cache_key::{CacheKey, KeyCanonicalizer};
pub use config::{AppConfig, ConfigOverrides};
pub use engine::{ComputationEngine, EngineConfig, MapComputation, MappingStrategy};
pub use enumerator::{ConfigurationSpace, EnumeratedConfiguration, Priority};
pub use error::{CacheError, ComputationError, Result};
pub use params::{CanonicalParams, ParamValue, ParameterSchema, ParameterSet};
pub use pipeline::{ArtifactProducer, BatchPipeline, PipelineConfig, PipelineState, RunSummary};
pub use similarity::{SimilarMatch, SimilarityPolicy, SimilarityResolver};
pub use storage::{Artifact, ArtifactKind, ArtifactStore, PutOutcome, StoreConfig, StoreStats};
