//! Aggregate statistics over a prime sequence and its gaps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::patterns::PrimePatterns;

/// Statistics report for one computation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimeStatistics {
    pub prime_count: usize,
    pub min_prime: u64,
    pub max_prime: u64,
    pub range: u64,

    pub twin_pairs: usize,
    pub cousin_pairs: usize,
    pub sexy_pairs: usize,
    pub sophie_germain: usize,
    pub palindromic: usize,
    pub mersenne: usize,
    pub fermat: usize,

    pub gap_mean: f64,
    pub gap_min: u64,
    pub gap_max: u64,
    pub gap_median: f64,
    pub gap_mode: u64,
    /// Population variance
    pub gap_variance: f64,
    pub gap_std_dev: f64,
    pub coefficient_of_variation: f64,
    /// Shannon entropy (bits) of the gap-frequency distribution
    pub gap_entropy: f64,
    /// Population skewness; 0 with fewer than four gaps
    pub gap_skewness: f64,
    /// Population excess kurtosis; 0 with fewer than four gaps
    pub gap_kurtosis: f64,

    /// prime_count / max_prime
    pub observed_density: f64,
    /// 1 / ln(max_prime)
    pub theoretical_density: f64,
    pub density_ratio: f64,
    pub twin_density: f64,
    /// (twin + cousin + sexy pairs) / prime_count
    pub special_pair_density: f64,
}

/// Fewest gaps for which higher moments are reported.
const MIN_GAPS_FOR_MOMENTS: usize = 4;

impl PrimeStatistics {
    /// All zeros when there are fewer than two primes.
    pub fn compute(primes: &[u64], patterns: &PrimePatterns) -> Self {
        if primes.len() < 2 {
            return Self::default();
        }

        let gaps = &patterns.gaps;
        let prime_count = primes.len();
        let min_prime = primes[0];
        let max_prime = primes[prime_count - 1];

        let moments = GapMoments::of(gaps);
        let theoretical_density = 1.0 / (max_prime as f64).ln();
        let observed_density = prime_count as f64 / max_prime as f64;
        let special_pairs = patterns.twin.len() + patterns.cousin.len() + patterns.sexy.len();

        Self {
            prime_count,
            min_prime,
            max_prime,
            range: max_prime - min_prime,

            twin_pairs: patterns.twin.len(),
            cousin_pairs: patterns.cousin.len(),
            sexy_pairs: patterns.sexy.len(),
            sophie_germain: patterns.sophie_germain.len(),
            palindromic: patterns.palindromic.len(),
            mersenne: patterns.mersenne.len(),
            fermat: patterns.fermat.len(),

            gap_mean: moments.mean,
            gap_min: gaps.iter().copied().min().unwrap_or(0),
            gap_max: gaps.iter().copied().max().unwrap_or(0),
            gap_median: median(gaps),
            gap_mode: mode(gaps),
            gap_variance: moments.variance,
            gap_std_dev: moments.variance.sqrt(),
            coefficient_of_variation: if moments.mean > 0.0 {
                moments.variance.sqrt() / moments.mean
            } else {
                0.0
            },
            gap_entropy: entropy(gaps),
            gap_skewness: moments.skewness,
            gap_kurtosis: moments.excess_kurtosis,

            observed_density,
            theoretical_density,
            density_ratio: observed_density / theoretical_density,
            twin_density: patterns.twin.len() as f64 / prime_count as f64,
            special_pair_density: special_pairs as f64 / prime_count as f64,
        }
    }
}

#[derive(Debug, Default)]
struct GapMoments {
    mean: f64,
    variance: f64,
    skewness: f64,
    excess_kurtosis: f64,
}

impl GapMoments {
    fn of(gaps: &[u64]) -> Self {
        if gaps.is_empty() {
            return Self::default();
        }
        let n = gaps.len() as f64;
        let mean = gaps.iter().sum::<u64>() as f64 / n;

        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for &gap in gaps {
            let d = gap as f64 - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }
        m2 /= n;
        m3 /= n;
        m4 /= n;

        let (skewness, excess_kurtosis) = if gaps.len() < MIN_GAPS_FOR_MOMENTS || m2 == 0.0 {
            (0.0, 0.0)
        } else {
            (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
        };

        Self {
            mean,
            variance: m2,
            skewness,
            excess_kurtosis,
        }
    }
}

fn frequencies(values: &[u64]) -> BTreeMap<u64, usize> {
    let mut counts = BTreeMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
}

fn median(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

/// Most frequent value; ties go to the smallest.
fn mode(values: &[u64]) -> u64 {
    let mut best = (0u64, 0usize);
    // Ascending iteration, so a strict comparison keeps the smallest on ties
    for (value, count) in frequencies(values) {
        if count > best.1 {
            best = (value, count);
        }
    }
    best.0
}

/// `-sum(p * log2(p))` over the empirical distribution.
fn entropy(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let total = values.len() as f64;
    frequencies(values)
        .values()
        .map(|&count| count as f64 / total)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.log2())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sieve::PrimeSieve;

    fn stats_to(limit: u64) -> PrimeStatistics {
        let sieve = PrimeSieve::new(limit);
        let primes = sieve.primes();
        let patterns = PrimePatterns::classify(&primes, &sieve);
        PrimeStatistics::compute(&primes, &patterns)
    }

    #[test]
    fn test_basic_counts_to_30() {
        let stats = stats_to(30);
        assert_eq!(stats.prime_count, 10);
        assert_eq!(stats.min_prime, 2);
        assert_eq!(stats.max_prime, 29);
        assert_eq!(stats.range, 27);
        // gaps: 1 2 2 4 2 4 2 4 6
        assert_eq!(stats.gap_min, 1);
        assert_eq!(stats.gap_max, 6);
        assert_eq!(stats.gap_mode, 2);
        assert_eq!(stats.gap_median, 2.0);
        assert!((stats.gap_mean - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mode_tie_prefers_smallest() {
        assert_eq!(mode(&[4, 2, 4, 2, 6]), 2);
        assert_eq!(mode(&[]), 0);
    }

    #[test]
    fn test_entropy_of_uniform_distribution() {
        assert!((entropy(&[1, 2, 3, 4]) - 2.0).abs() < 1e-12);
        assert_eq!(entropy(&[5, 5, 5]), 0.0);
    }

    #[test]
    fn test_moments_need_four_gaps() {
        // 2,3,5,7 -> three gaps
        let stats = stats_to(7);
        assert_eq!(stats.gap_skewness, 0.0);
        assert_eq!(stats.gap_kurtosis, 0.0);

        let moments = GapMoments::of(&[1, 2, 2, 7]);
        assert!(moments.skewness > 0.0);
    }

    #[test]
    fn test_population_variance() {
        let moments = GapMoments::of(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert!((moments.mean - 5.0).abs() < 1e-12);
        assert!((moments.variance - 4.0).abs() < 1e-12);
        assert!((moments.excess_kurtosis - (-0.21875)).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_inputs_are_zero() {
        assert_eq!(stats_to(1), PrimeStatistics::default());
        assert_eq!(stats_to(2), PrimeStatistics::default());
    }

    #[test]
    fn test_density_ratio_near_one_for_large_limit() {
        let stats = stats_to(100_000);
        assert!(stats.density_ratio > 1.0 && stats.density_ratio < 1.2);
    }
}
