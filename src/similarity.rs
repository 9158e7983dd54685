//! Similarity fallback lookup.
//!
//! Scores stored entries against a request with no exact hit and returns
//! the best one if it clears the acceptance threshold. Scoring is a weighted
//! sum: an exact mapping match plus linearly decaying bonuses for ring and
//! segment closeness. The weights are policy; the only property relied on
//! is that a mapping match dominates.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::cache_key::CacheKey;
use crate::error::{CacheError, Result};
use crate::params::{CanonicalParams, ParameterSet};
use crate::storage::{Artifact, ArtifactStore, IndexEntry};

/// Scoring weights and acceptance threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityPolicy {
    /// Awarded when the mapping strategy matches exactly
    pub mapping_weight: f64,
    /// Ring bonus at zero distance
    pub ring_weight: f64,
    /// Ring bonus lost per ring of distance
    pub ring_falloff: f64,
    /// Segment bonus at zero distance
    pub segment_weight: f64,
    /// Segment bonus lost per segment of distance
    pub segment_falloff: f64,
    /// A match must score strictly above this
    pub threshold: f64,
}

impl Default for SimilarityPolicy {
    fn default() -> Self {
        Self {
            mapping_weight: 50.0,
            ring_weight: 25.0,
            ring_falloff: 5.0,
            segment_weight: 25.0,
            segment_falloff: 2.0,
            threshold: 50.0,
        }
    }
}

/// Per-component score of one candidate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub mapping: f64,
    pub rings: f64,
    pub segments: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.mapping + self.rings + self.segments
    }
}

impl SimilarityPolicy {
    /// Score `candidate` against `request`. `None` when either side lacks
    /// rings, segments or mapping, or when they ask for different artifacts.
    pub fn score(
        &self,
        request: &CanonicalParams,
        candidate: &CanonicalParams,
    ) -> Option<ScoreBreakdown> {
        let decay = |weight: f64, falloff: f64, a: i64, b: i64| {
            (weight - falloff * (a - b).unsigned_abs() as f64).max(0.0)
        };

        if request.artifact() != candidate.artifact() {
            return None;
        }

        let mapping = if request.mapping()? == candidate.mapping()? {
            self.mapping_weight
        } else {
            0.0
        };
        Some(ScoreBreakdown {
            mapping,
            rings: decay(
                self.ring_weight,
                self.ring_falloff,
                request.rings()?,
                candidate.rings()?,
            ),
            segments: decay(
                self.segment_weight,
                self.segment_falloff,
                request.segments()?,
                candidate.segments()?,
            ),
        })
    }

    pub fn accepts(&self, score: f64) -> bool {
        score > self.threshold
    }
}

/// An accepted fallback entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    pub key: CacheKey,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub params: CanonicalParams,
}

/// Best-scoring entry, accepted or not, plus its score.
#[derive(Clone, Debug, PartialEq)]
pub struct BestCandidate<'a> {
    pub entry: &'a IndexEntry,
    pub breakdown: ScoreBreakdown,
}

/// Highest-scoring entry. Ties go to the most recently accessed entry,
/// then to the lower key. Entries missing scored fields are ignored.
pub fn find_best<'a>(
    policy: &SimilarityPolicy,
    entries: &'a [IndexEntry],
    request: &CanonicalParams,
) -> Option<BestCandidate<'a>> {
    entries
        .iter()
        .filter_map(|entry| {
            policy
                .score(request, &entry.params)
                .map(|breakdown| BestCandidate { entry, breakdown })
        })
        .max_by(|a, b| {
            a.breakdown
                .total()
                .partial_cmp(&b.breakdown.total())
                .unwrap_or(Ordering::Equal)
                .then(a.entry.last_access_ms.cmp(&b.entry.last_access_ms))
                .then(b.entry.key.cmp(&a.entry.key))
        })
}

/// Resolves requests against the entries of an artifact store.
#[derive(Clone, Debug, Default)]
pub struct SimilarityResolver {
    policy: SimilarityPolicy,
}

impl SimilarityResolver {
    pub fn new(policy: SimilarityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SimilarityPolicy {
        &self.policy
    }

    /// Pick the best accepted entry among `entries`.
    ///
    /// Returns [`CacheError::NoSimilarMatch`] when nothing scores above the
    /// threshold. That is a miss, not a failure.
    pub fn resolve_in(
        &self,
        entries: &[IndexEntry],
        request: &CanonicalParams,
    ) -> Result<SimilarMatch> {
        let Some(best) = find_best(&self.policy, entries, request) else {
            return Err(CacheError::NoSimilarMatch { best_score: None });
        };

        let score = best.breakdown.total();
        if !self.policy.accepts(score) {
            log::debug!(
                "Best similar entry {:?} scored {:.1}, threshold {:.1}",
                best.entry.key,
                score,
                self.policy.threshold
            );
            return Err(CacheError::NoSimilarMatch {
                best_score: Some(score),
            });
        }

        Ok(SimilarMatch {
            key: best.entry.key,
            score,
            breakdown: best.breakdown,
            params: best.entry.params.clone(),
        })
    }

    /// Resolve against the store's live entries.
    pub fn resolve(&self, store: &ArtifactStore, params: &ParameterSet) -> Result<SimilarMatch> {
        let request = store.canonicalizer().canonicalize(params)?;
        self.resolve_in(&store.scan_index(), &request)
    }

    /// Resolve and load the matched artifact. An entry that disappears
    /// between scan and load is reported as no match.
    pub fn resolve_artifact(
        &self,
        store: &ArtifactStore,
        params: &ParameterSet,
    ) -> Result<(SimilarMatch, Artifact)> {
        let found = self.resolve(store, params)?;
        match store.get_by_key(&found.key) {
            Some(artifact) => {
                log::info!(
                    "Serving similar artifact {:?} (score {:.1})",
                    found.key,
                    found.score
                );
                Ok((found, artifact))
            }
            None => Err(CacheError::NoSimilarMatch {
                best_score: Some(found.score),
            }),
        }
    }
}
