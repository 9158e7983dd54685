//! Geometric mapping strategies: linear index to (ring, segment).
//!
//! Every strategy is total over `n` in `[1, total]` and clamps its result
//! into `0 <= ring < rings` and `0 <= segment < segments`.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

/// Canonical mapping names, in declaration order.
pub const MAPPING_NAMES: &[&str] = &[
    "linear",
    "logarithmic",
    "archimedean",
    "fibonacci",
    "power",
    "hexagonal",
];

/// Radial exponent of the power-law mapping.
pub const POWER_EXPONENT: f64 = 0.5;

const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

/// Position of one element on the ring layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub ring: u32,
    pub segment: u32,
}

/// Selects how linear indices are laid out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStrategy {
    /// Row-major: quotient is the ring, remainder the segment
    #[default]
    Linear,
    /// Radius grows with log(n), spreading small numbers out
    Logarithmic,
    /// Archimedean spiral, r proportional to theta
    Archimedean,
    /// Golden-angle spiral
    Fibonacci,
    /// Radius grows with (n / total)^0.5
    Power,
    /// Hex-style shells of width 2q + 1
    Hexagonal,
}

impl MappingStrategy {
    pub const ALL: [MappingStrategy; 6] = [
        MappingStrategy::Linear,
        MappingStrategy::Logarithmic,
        MappingStrategy::Archimedean,
        MappingStrategy::Fibonacci,
        MappingStrategy::Power,
        MappingStrategy::Hexagonal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MappingStrategy::Linear => "linear",
            MappingStrategy::Logarithmic => "logarithmic",
            MappingStrategy::Archimedean => "archimedean",
            MappingStrategy::Fibonacci => "fibonacci",
            MappingStrategy::Power => "power",
            MappingStrategy::Hexagonal => "hexagonal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Map element `n` (1-based) of `total` onto `rings x segments`.
    ///
    /// Out-of-domain inputs (`n` outside `[1, total]`, zero rings or
    /// segments) are clamped rather than rejected.
    pub fn map(&self, n: u64, total: u64, rings: u32, segments: u32) -> Coordinate {
        let rings = rings.max(1);
        let segments = segments.max(1);
        let total = total.max(1);
        let n = n.clamp(1, total);
        let cells = rings as u64 * segments as u64;

        let (ring, segment) = match self {
            MappingStrategy::Linear => {
                let index = n - 1;
                (index / segments as u64, index % segments as u64)
            }
            MappingStrategy::Logarithmic => {
                let fraction = ((n + 1) as f64).ln() / ((total + 1) as f64).ln();
                cell_of(scaled(fraction, cells), segments)
            }
            MappingStrategy::Archimedean => {
                let fraction = (n as f64 / total as f64).sqrt();
                let ring = (fraction * rings as f64) as u64;
                (ring, angle_segment(TAU * fraction, segments))
            }
            MappingStrategy::Fibonacci => {
                let fraction = (n as f64 / total as f64).sqrt();
                let ring = (fraction * rings as f64) as u64;
                (ring, angle_segment(TAU * n as f64 / GOLDEN_RATIO, segments))
            }
            MappingStrategy::Power => {
                let fraction = (n as f64 / total as f64).powf(POWER_EXPONENT);
                cell_of(scaled(fraction, cells), segments)
            }
            MappingStrategy::Hexagonal => {
                let shell = isqrt(n);
                let offset = n - shell * shell;
                let width = 2 * shell + 1;
                (shell % rings as u64, offset * segments as u64 / width)
            }
        };

        Coordinate {
            ring: ring.min(rings as u64 - 1) as u32,
            segment: (segment % segments as u64) as u32,
        }
    }
}

impl fmt::Display for MappingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MappingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(&s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown mapping '{}', expected one of {:?}", s, MAPPING_NAMES))
    }
}

/// Position in `[0, cells)` for a fraction in `[0, 1]`.
fn scaled(fraction: f64, cells: u64) -> u64 {
    let position = (fraction.clamp(0.0, 1.0) * cells as f64) as u64;
    position.min(cells - 1)
}

fn cell_of(position: u64, segments: u32) -> (u64, u64) {
    (position / segments as u64, position % segments as u64)
}

/// Segment containing angle `theta` (radians, any magnitude).
fn angle_segment(theta: f64, segments: u32) -> u64 {
    let turn = theta.rem_euclid(TAU) / TAU;
    ((turn * segments as f64) as u64).min(segments as u64 - 1)
}

fn isqrt(n: u64) -> u64 {
    let mut root = (n as f64).sqrt() as u64;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}
