//! Prime-pattern classification over a sieved sequence.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::sieve::PrimeSieve;

/// Largest Mersenne exponent probed.
const MERSENNE_MAX_EXPONENT: u32 = 24;
/// Largest Fermat index probed; F5 already exceeds any supported limit.
const FERMAT_MAX_INDEX: u32 = 4;

/// A named prime pattern that can be highlighted on a map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Twin,
    Cousin,
    Sexy,
    SophieGermain,
    Palindromic,
    Mersenne,
    Fermat,
}

impl PatternKind {
    pub const ALL: [PatternKind; 7] = [
        PatternKind::Twin,
        PatternKind::Cousin,
        PatternKind::Sexy,
        PatternKind::SophieGermain,
        PatternKind::Palindromic,
        PatternKind::Mersenne,
        PatternKind::Fermat,
    ];
}

/// Every pattern found among the primes of one sieve.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimePatterns {
    /// (p, p + 2)
    pub twin: Vec<(u64, u64)>,
    /// (p, p + 4)
    pub cousin: Vec<(u64, u64)>,
    /// (p, p + 6)
    pub sexy: Vec<(u64, u64)>,
    /// (p, 2p + 1), both within the sieve limit
    pub sophie_germain: Vec<(u64, u64)>,
    /// Multi-digit primes that read the same reversed
    pub palindromic: Vec<u64>,
    /// Primes of the form 2^k - 1
    pub mersenne: Vec<u64>,
    /// Primes of the form 2^(2^k) + 1
    pub fermat: Vec<u64>,
    /// Differences between consecutive primes
    pub gaps: Vec<u64>,
}

impl PrimePatterns {
    /// Classify `primes` (ascending, all from `sieve`).
    pub fn classify(primes: &[u64], sieve: &PrimeSieve) -> Self {
        let mut patterns = Self::default();

        // Pairs and gaps need a successor; the largest prime has none
        for window in primes.windows(2) {
            let p = window[0];
            patterns.gaps.push(window[1] - p);

            if sieve.is_prime(p + 2) {
                patterns.twin.push((p, p + 2));
            }
            if sieve.is_prime(p + 4) {
                patterns.cousin.push((p, p + 4));
            }
            if sieve.is_prime(p + 6) {
                patterns.sexy.push((p, p + 6));
            }
            if sieve.is_prime(2 * p + 1) {
                patterns.sophie_germain.push((p, 2 * p + 1));
            }
        }
        patterns.palindromic = primes.iter().copied().filter(|&p| is_palindrome(p)).collect();

        patterns.mersenne = (2..=MERSENNE_MAX_EXPONENT)
            .map(|k| (1u64 << k) - 1)
            .filter(|&m| sieve.is_prime(m))
            .collect();
        patterns.fermat = (0..=FERMAT_MAX_INDEX)
            .map(|k| (1u64 << (1u64 << k)) + 1)
            .filter(|&f| sieve.is_prime(f))
            .collect();

        patterns
    }

    /// Primes that belong to `kind`, counting both members of a pair.
    pub fn members(&self, kind: PatternKind) -> HashSet<u64> {
        let pairs = |list: &[(u64, u64)]| list.iter().flat_map(|&(a, b)| [a, b]).collect();
        match kind {
            PatternKind::Twin => pairs(&self.twin),
            PatternKind::Cousin => pairs(&self.cousin),
            PatternKind::Sexy => pairs(&self.sexy),
            PatternKind::SophieGermain => self.sophie_germain.iter().map(|&(p, _)| p).collect(),
            PatternKind::Palindromic => self.palindromic.iter().copied().collect(),
            PatternKind::Mersenne => self.mersenne.iter().copied().collect(),
            PatternKind::Fermat => self.fermat.iter().copied().collect(),
        }
    }
}

/// Decimal palindrome with more than one digit.
pub fn is_palindrome(n: u64) -> bool {
    if n < 10 {
        return false;
    }
    let digits = n.to_string();
    digits.bytes().eq(digits.bytes().rev())
}
