//! Point sets: which elements are drawn, where, and with which labels.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::mapping::{Coordinate, MappingStrategy};
use super::patterns::{PatternKind, PrimePatterns};
use super::sieve::PrimeSieve;

/// Category an element is drawn in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointLabel {
    Regular,
    Twin,
    Cousin,
    Sexy,
    SophieGermain,
    Palindromic,
    Mersenne,
    Fermat,
    Composite,
}

impl From<PatternKind> for PointLabel {
    fn from(kind: PatternKind) -> Self {
        match kind {
            PatternKind::Twin => PointLabel::Twin,
            PatternKind::Cousin => PointLabel::Cousin,
            PatternKind::Sexy => PointLabel::Sexy,
            PatternKind::SophieGermain => PointLabel::SophieGermain,
            PatternKind::Palindromic => PointLabel::Palindromic,
            PatternKind::Mersenne => PointLabel::Mersenne,
            PatternKind::Fermat => PointLabel::Fermat,
        }
    }
}

/// One element placed on the map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapPoint {
    pub n: u64,
    #[serde(flatten)]
    pub position: Coordinate,
    pub labels: Vec<PointLabel>,
}

/// What the caller asked to see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointSelection {
    pub show_regular: bool,
    pub show_composite: bool,
    pub highlights: Vec<PatternKind>,
}

/// Sampling rule: totals above `above` keep at most `max_points` elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingRule {
    pub above: u64,
    pub max_points: u64,
}

/// Step between sampled elements. Rules are checked in order; the first
/// whose threshold `total` exceeds wins. No match keeps every element.
pub fn sampling_step(total: u64, rules: &[SamplingRule]) -> u64 {
    rules
        .iter()
        .find(|rule| total > rule.above)
        .map(|rule| total.div_ceil(rule.max_points.max(1)))
        .unwrap_or(1)
        .max(1)
}

/// Label and place every sampled element in `[1, total]`. Elements with no
/// label are omitted.
#[allow(clippy::too_many_arguments)]
pub fn build_points(
    sieve: &PrimeSieve,
    patterns: &PrimePatterns,
    selection: &PointSelection,
    mapping: MappingStrategy,
    total: u64,
    rings: u32,
    segments: u32,
    step: u64,
) -> Vec<MapPoint> {
    let highlight_sets: Vec<(PointLabel, HashSet<u64>)> = selection
        .highlights
        .iter()
        .map(|&kind| (PointLabel::from(kind), patterns.members(kind)))
        .collect();

    let mut points = Vec::new();
    let mut n = 1;
    while n <= total {
        let mut labels = Vec::new();
        if sieve.is_prime(n) {
            if selection.show_regular {
                labels.push(PointLabel::Regular);
            }
            labels.extend(
                highlight_sets
                    .iter()
                    .filter(|(_, members)| members.contains(&n))
                    .map(|(label, _)| *label),
            );
        } else if n > 1 && selection.show_composite {
            labels.push(PointLabel::Composite);
        }

        if !labels.is_empty() {
            points.push(MapPoint {
                n,
                position: mapping.map(n, total, rings, segments),
                labels,
            });
        }
        n += step;
    }
    points
}
