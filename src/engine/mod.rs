//! Computation engine: parameters in, prime map out.
//!
//! Pure and stateless. Parameters are clamped into the configured bounds,
//! primes up to `rings x segments` are sieved once, and that sieve is reused
//! for pattern classification, statistics and point labelling.

pub mod analysis;
pub mod mapping;
pub mod patterns;
pub mod points;
pub mod sieve;
pub mod statistics;

use serde::{Deserialize, Serialize};
use serde_json::json;

pub use analysis::{analyze_number, NumberAnalysis};
pub use mapping::{Coordinate, MappingStrategy};
pub use patterns::{PatternKind, PrimePatterns};
pub use points::{MapPoint, PointLabel, PointSelection, SamplingRule};
pub use sieve::PrimeSieve;
pub use statistics::PrimeStatistics;

use crate::error::ComputationError;
use crate::params::{opt, CanonicalParams, ParamValue};
use crate::storage::{Artifact, ArtifactKind};

/// Highlight option for each pattern.
const HIGHLIGHT_OPTIONS: &[(&str, PatternKind)] = &[
    (opt::SHOW_TWIN, PatternKind::Twin),
    (opt::SHOW_COUSIN, PatternKind::Cousin),
    (opt::SHOW_SEXY, PatternKind::Sexy),
    (opt::SHOW_SOPHIE_GERMAIN, PatternKind::SophieGermain),
    (opt::SHOW_PALINDROMIC, PatternKind::Palindromic),
    (opt::SHOW_MERSENNE, PatternKind::Mersenne),
    (opt::SHOW_FERMAT, PatternKind::Fermat),
];

/// Engine bounds and sampling rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rings_min: u32,
    pub rings_max: u32,
    pub segments_min: u32,
    pub segments_max: u32,
    pub transparency_min: f64,
    pub transparency_max: f64,

    /// Hard ceiling on `rings x segments` after clamping
    pub max_elements: u64,

    /// Checked in order; first match wins
    pub sampling: Vec<SamplingRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rings_min: 1,
            rings_max: 10_000,
            segments_min: 2,
            segments_max: 1_300,
            transparency_min: 0.1,
            transparency_max: 1.0,
            max_elements: 13_000_000,
            sampling: vec![
                SamplingRule {
                    above: 500_000,
                    max_points: 20_000,
                },
                SamplingRule {
                    above: 100_000,
                    max_points: 50_000,
                },
            ],
        }
    }
}

/// Typed, clamped view of a canonical parameter set.
#[derive(Clone, Debug, PartialEq)]
pub struct MapRequest {
    pub rings: u32,
    pub segments: u32,
    pub mapping: MappingStrategy,
    pub transparency: f64,
    pub selection: PointSelection,
}

impl MapRequest {
    pub fn total(&self) -> u64 {
        self.rings as u64 * self.segments as u64
    }
}

/// Everything computed for one parameter set.
#[derive(Clone, Debug)]
pub struct MapComputation {
    /// Canonical parameters with clamped values
    pub params: CanonicalParams,
    pub request: MapRequest,
    pub primes: Vec<u64>,
    pub patterns: PrimePatterns,
    pub statistics: PrimeStatistics,
    pub points: Vec<MapPoint>,
    pub sampling_step: u64,
}

impl MapComputation {
    fn metadata(&self) -> serde_json::Value {
        json!({
            "rings": self.request.rings,
            "segments": self.request.segments,
            "mapping": self.request.mapping.name(),
            "transparency": self.request.transparency,
            "total_elements": self.request.total(),
            "sampling_step": self.sampling_step,
            "point_count": self.points.len(),
            "params": self.params,
        })
    }

    /// JSON point set: `elements`, `metadata`, `statistics`.
    pub fn to_point_set_artifact(&self) -> Result<Artifact, ComputationError> {
        let body = json!({
            "elements": self.points,
            "metadata": self.metadata(),
            "statistics": self.statistics,
        });
        let data = serde_json::to_vec(&body).map_err(|e| ComputationError::Encode(e.to_string()))?;
        Ok(Artifact::json(ArtifactKind::PointSet, data))
    }

    /// JSON statistics report without the point set.
    pub fn to_statistics_artifact(&self) -> Result<Artifact, ComputationError> {
        let body = json!({
            "metadata": self.metadata(),
            "statistics": self.statistics,
        });
        let data = serde_json::to_vec(&body).map_err(|e| ComputationError::Encode(e.to_string()))?;
        Ok(Artifact::json(ArtifactKind::Statistics, data))
    }
}

/// Stateless prime-map calculator.
#[derive(Clone, Debug, Default)]
pub struct ComputationEngine {
    config: EngineConfig,
}

impl ComputationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clamp bounded options and extract the typed request.
    pub fn clamp(
        &self,
        params: &CanonicalParams,
    ) -> Result<(CanonicalParams, MapRequest), ComputationError> {
        let cfg = &self.config;
        let rings = params
            .rings()
            .ok_or_else(|| ComputationError::InvalidInput("rings is missing".into()))?
            .clamp(cfg.rings_min as i64, cfg.rings_max as i64) as u32;
        let segments = params
            .segments()
            .ok_or_else(|| ComputationError::InvalidInput("segments is missing".into()))?
            .clamp(cfg.segments_min as i64, cfg.segments_max as i64) as u32;
        let mapping_name = params.mapping().unwrap_or("linear");
        let mapping = MappingStrategy::from_name(mapping_name).ok_or_else(|| {
            ComputationError::InvalidInput(format!("unknown mapping '{}'", mapping_name))
        })?;
        let transparency = params
            .float(opt::TRANSPARENCY)
            .unwrap_or(cfg.transparency_max)
            .clamp(cfg.transparency_min, cfg.transparency_max);

        let selection = PointSelection {
            show_regular: params.flag(opt::SHOW_REGULAR),
            show_composite: params.flag(opt::SHOW_COMPOSITE),
            highlights: HIGHLIGHT_OPTIONS
                .iter()
                .filter(|(name, _)| params.flag(name))
                .map(|(_, kind)| *kind)
                .collect(),
        };

        let mut clamped = params.clone();
        clamped.replace(opt::RINGS, ParamValue::Int(rings as i64));
        clamped.replace(opt::SEGMENTS, ParamValue::Int(segments as i64));
        clamped.replace(opt::TRANSPARENCY, ParamValue::Float(transparency));

        Ok((
            clamped,
            MapRequest {
                rings,
                segments,
                mapping,
                transparency,
                selection,
            },
        ))
    }

    /// Run the full computation for one canonical parameter set.
    pub fn compute(&self, params: &CanonicalParams) -> Result<MapComputation, ComputationError> {
        let (params, request) = self.clamp(params)?;
        let total = request.total();
        if total > self.config.max_elements {
            return Err(ComputationError::TooLarge {
                elements: total,
                limit: self.config.max_elements,
            });
        }

        let sieve = PrimeSieve::new(total);
        let primes = sieve.primes();
        let patterns = PrimePatterns::classify(&primes, &sieve);
        let statistics = PrimeStatistics::compute(&primes, &patterns);
        let sampling_step = points::sampling_step(total, &self.config.sampling);
        let points = points::build_points(
            &sieve,
            &patterns,
            &request.selection,
            request.mapping,
            total,
            request.rings,
            request.segments,
            sampling_step,
        );

        Ok(MapComputation {
            params,
            request,
            primes,
            patterns,
            statistics,
            points,
            sampling_step,
        })
    }

    /// Compute and package the artifact named by the `artifact` option.
    pub fn produce(&self, params: &CanonicalParams) -> Result<Artifact, ComputationError> {
        let computation = self.compute(params)?;
        match params.artifact() {
            Some("statistics") => computation.to_statistics_artifact(),
            _ => computation.to_point_set_artifact(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterSchema, ParameterSet};

    fn canonical(params: ParameterSet) -> CanonicalParams {
        ParameterSchema::visualization().normalize(&params).unwrap()
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let engine = ComputationEngine::default();
        let params = canonical(
            ParameterSet::builder()
                .rings(0)
                .segments(5000)
                .set(opt::TRANSPARENCY, 3.0)
                .build(),
        );
        let (clamped, request) = engine.clamp(&params).unwrap();
        assert_eq!(request.rings, 1);
        assert_eq!(request.segments, 1300);
        assert_eq!(request.transparency, 1.0);
        assert_eq!(clamped.rings(), Some(1));
    }

    #[test]
    fn test_compute_small_map() {
        let engine = ComputationEngine::default();
        let computation = engine
            .compute(&canonical(ParameterSet::builder().rings(10).segments(24).build()))
            .unwrap();
        assert_eq!(computation.request.total(), 240);
        assert_eq!(computation.primes.len(), 52);
        assert_eq!(computation.sampling_step, 1);
        // Defaults draw every prime and every composite above 1
        assert_eq!(computation.points.len(), 239);
    }

    #[test]
    fn test_point_set_artifact_shape() {
        let engine = ComputationEngine::default();
        let params = canonical(
            ParameterSet::builder()
                .rings(3)
                .segments(10)
                .mapping("fibonacci")
                .build(),
        );
        let artifact = engine.produce(&params).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::PointSet);

        let value: serde_json::Value = serde_json::from_slice(&artifact.data).unwrap();
        assert_eq!(value["metadata"]["mapping"], "fibonacci");
        assert_eq!(value["metadata"]["total_elements"], 30);
        assert_eq!(value["statistics"]["prime_count"], 10);
        assert!(value["elements"].as_array().unwrap().len() > 10);
    }

    #[test]
    fn test_artifact_option_selects_statistics() {
        let engine = ComputationEngine::default();
        let params = canonical(
            ParameterSet::builder()
                .rings(3)
                .segments(10)
                .set(opt::ARTIFACT, "statistics")
                .build(),
        );
        let artifact = engine.produce(&params).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Statistics);

        let value: serde_json::Value = serde_json::from_slice(&artifact.data).unwrap();
        assert_eq!(value["statistics"]["prime_count"], 10);
        assert!(value.get("elements").is_none());
    }

    #[test]
    fn test_element_ceiling() {
        let engine = ComputationEngine::new(EngineConfig {
            max_elements: 100,
            ..EngineConfig::default()
        });
        let err = engine
            .compute(&canonical(ParameterSet::builder().rings(20).segments(20).build()))
            .unwrap_err();
        assert!(matches!(err, ComputationError::TooLarge { elements: 400, .. }));
    }
}
