//! Configuration enumerator: the finite space of parameter sets the batch
//! pipeline pre-computes.
//!
//! Enumeration is pure. Running it twice yields the same sequence, which is
//! what lets an interrupted pipeline resume through store lookups alone.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::engine::{MappingStrategy, PatternKind};
use crate::params::{opt, ParameterSet};

/// Inclusive integer range with a positive step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRange {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl StepRange {
    pub const fn new(start: u32, end: u32, step: u32) -> Self {
        Self { start, end, step }
    }

    pub fn values(&self) -> impl Iterator<Item = u32> {
        (self.start..=self.end).step_by(self.step.max(1) as usize)
    }
}

/// A block of ring/segment combinations sharing a set of mappings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    pub rings: StepRange,
    pub segments: StepRange,
    pub mappings: Vec<MappingStrategy>,
}

/// Which categories a configuration highlights. Unlisted patterns are off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSet {
    pub name: String,
    pub regular: bool,
    pub composite: bool,
    #[serde(default)]
    pub patterns: Vec<PatternKind>,
}

impl HighlightSet {
    fn new(name: &str, regular: bool, composite: bool, patterns: &[PatternKind]) -> Self {
        Self {
            name: name.to_string(),
            regular,
            composite,
            patterns: patterns.to_vec(),
        }
    }

    fn apply(&self, params: ParameterSet) -> ParameterSet {
        let on = |kind| self.patterns.contains(&kind);
        params
            .with(opt::SHOW_REGULAR, self.regular)
            .with(opt::SHOW_COMPOSITE, self.composite)
            .with(opt::SHOW_TWIN, on(PatternKind::Twin))
            .with(opt::SHOW_COUSIN, on(PatternKind::Cousin))
            .with(opt::SHOW_SEXY, on(PatternKind::Sexy))
            .with(opt::SHOW_SOPHIE_GERMAIN, on(PatternKind::SophieGermain))
            .with(opt::SHOW_PALINDROMIC, on(PatternKind::Palindromic))
            .with(opt::SHOW_MERSENNE, on(PatternKind::Mersenne))
            .with(opt::SHOW_FERMAT, on(PatternKind::Fermat))
    }
}

/// Cost bucket by element count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
    Ultra,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Ultra => "ultra",
        })
    }
}

/// One parameter set scheduled for pre-computation.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumeratedConfiguration {
    pub params: ParameterSet,
    pub rings: u32,
    pub segments: u32,
    pub mapping: MappingStrategy,
    pub highlight: String,
    pub total_elements: u64,
    pub priority: Priority,
}

impl EnumeratedConfiguration {
    /// Short description for progress logs, e.g. `120x96 linear/twin [normal]`.
    pub fn label(&self) -> String {
        format!(
            "{}x{} {}/{} [{}]",
            self.rings, self.segments, self.mapping, self.highlight, self.priority
        )
    }
}

/// The full enumeration definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationSpace {
    pub tiers: Vec<Tier>,
    pub highlight_sets: Vec<HighlightSet>,
    /// Configurations above this element count are dropped
    pub max_elements: u64,
    /// Element counts above this are `high`
    pub high_above: u64,
    /// Element counts above this are `ultra`
    pub ultra_above: u64,
    /// Output format written into every enumerated parameter set
    pub format: String,
}

impl Default for ConfigurationSpace {
    fn default() -> Self {
        use MappingStrategy::*;
        use PatternKind::*;

        let tier = |name: &str, rings, segments, mappings: &[MappingStrategy]| Tier {
            name: name.to_string(),
            rings,
            segments,
            mappings: mappings.to_vec(),
        };

        Self {
            tiers: vec![
                tier("basic", StepRange::new(5, 50, 5), StepRange::new(12, 60, 6), &[Linear, Logarithmic]),
                tier("medium", StepRange::new(60, 200, 20), StepRange::new(60, 180, 12), &[Linear, Archimedean]),
                tier("high", StepRange::new(250, 500, 50), StepRange::new(180, 300, 30), &[Linear]),
                tier("dense", StepRange::new(600, 1000, 100), StepRange::new(300, 360, 30), &[Linear]),
                tier("ultra", StepRange::new(1000, 3000, 200), StepRange::new(360, 500, 20), &[Linear]),
            ],
            highlight_sets: vec![
                HighlightSet::new("regular", true, false, &[]),
                HighlightSet::new("regular-twin", true, false, &[Twin]),
                HighlightSet::new("regular-twin-composite", true, true, &[Twin]),
                HighlightSet::new("twin-only", false, false, &[Twin]),
                HighlightSet::new("regular-sexy", true, false, &[Sexy]),
                HighlightSet::new("regular-twin-sophie", true, false, &[Twin, SophieGermain]),
                HighlightSet::new("full", true, true, &[Twin, Sexy, SophieGermain, Mersenne]),
                HighlightSet::new("regular-twin-palindromic-fermat", true, false, &[Twin, Palindromic, Fermat]),
            ],
            max_elements: 2_000_000,
            high_above: 100_000,
            ultra_above: 500_000,
            format: "json".to_string(),
        }
    }
}

impl ConfigurationSpace {
    pub fn priority_of(&self, total_elements: u64) -> Priority {
        if total_elements > self.ultra_above {
            Priority::Ultra
        } else if total_elements > self.high_above {
            Priority::High
        } else {
            Priority::Normal
        }
    }

    /// Materialize the ordered, de-duplicated sequence.
    ///
    /// Order is ascending element count, then linear before other mappings,
    /// then generation order.
    pub fn enumerate(&self) -> Vec<EnumeratedConfiguration> {
        let mut seen = HashSet::new();
        let mut configurations = Vec::new();

        for tier in &self.tiers {
            for rings in tier.rings.values() {
                for segments in tier.segments.values() {
                    let total_elements = rings as u64 * segments as u64;
                    if total_elements > self.max_elements {
                        continue;
                    }
                    for &mapping in &tier.mappings {
                        for (set_index, highlight) in self.highlight_sets.iter().enumerate() {
                            if !seen.insert((rings, segments, mapping, set_index)) {
                                continue;
                            }
                            let base = ParameterSet::builder()
                                .rings(rings)
                                .segments(segments)
                                .mapping(mapping.name())
                                .set(opt::FORMAT, self.format.as_str())
                                .build();
                            configurations.push(EnumeratedConfiguration {
                                params: highlight.apply(base),
                                rings,
                                segments,
                                mapping,
                                highlight: highlight.name.clone(),
                                total_elements,
                                priority: self.priority_of(total_elements),
                            });
                        }
                    }
                }
            }
        }

        // Stable sort keeps generation order within equal keys
        configurations.sort_by_key(|c| (c.total_elements, c.mapping != MappingStrategy::Linear));
        configurations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key::KeyCanonicalizer;

    #[test]
    fn test_default_space_size() {
        // 488 distinct (rings, segments, mapping) combinations x 8 highlight sets
        let configs = ConfigurationSpace::default().enumerate();
        assert_eq!(configs.len(), 488 * 8);
    }

    #[test]
    fn test_ordering_is_ascending_and_linear_first() {
        let configs = ConfigurationSpace::default().enumerate();
        for pair in configs.windows(2) {
            let a = (pair[0].total_elements, pair[0].mapping != MappingStrategy::Linear);
            let b = (pair[1].total_elements, pair[1].mapping != MappingStrategy::Linear);
            assert!(a <= b);
        }
        assert_eq!(configs[0].total_elements, 60);
        assert_eq!(configs[0].mapping, MappingStrategy::Linear);
        assert_eq!(configs[0].highlight, "regular");
    }

    #[test]
    fn test_enumeration_is_deterministic_and_keys_are_unique() {
        let space = ConfigurationSpace::default();
        let first = space.enumerate();
        assert_eq!(first, space.enumerate());

        let canonicalizer = KeyCanonicalizer::default();
        let keys: HashSet<_> = first
            .iter()
            .map(|c| canonicalizer.key(&c.params).unwrap())
            .collect();
        assert_eq!(keys.len(), first.len());
    }

    #[test]
    fn test_ceiling_drops_configurations() {
        let space = ConfigurationSpace {
            max_elements: 1000,
            ..ConfigurationSpace::default()
        };
        let configs = space.enumerate();
        assert!(!configs.is_empty());
        assert!(configs.iter().all(|c| c.total_elements <= 1000));
    }

    #[test]
    fn test_priority_buckets() {
        let space = ConfigurationSpace::default();
        assert_eq!(space.priority_of(100_000), Priority::Normal);
        assert_eq!(space.priority_of(100_001), Priority::High);
        assert_eq!(space.priority_of(500_000), Priority::High);
        assert_eq!(space.priority_of(500_001), Priority::Ultra);
    }

    #[test]
    fn test_highlight_set_sets_every_pattern_flag() {
        let set = HighlightSet::new("twin-only", false, false, &[PatternKind::Twin]);
        let params = set.apply(ParameterSet::builder().rings(5).segments(12).build());
        assert_eq!(params.get(opt::SHOW_TWIN).and_then(|v| v.as_bool()), Some(true));
        assert_eq!(params.get(opt::SHOW_COUSIN).and_then(|v| v.as_bool()), Some(false));
        assert_eq!(params.get(opt::SHOW_REGULAR).and_then(|v| v.as_bool()), Some(false));
    }
}
