//! Single-number analysis for the admin tool.

use serde::{Deserialize, Serialize};

use super::patterns::is_palindrome;
use super::sieve::PrimeSieve;
use crate::error::ComputationError;

/// Largest number `analyze_number` accepts.
pub const MAX_ANALYZED_NUMBER: u64 = 1_000_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumberAnalysis {
    pub number: u64,
    pub is_prime: bool,
    pub is_even: bool,
    pub mod_6: u64,
    pub mod_10: u64,
    pub binary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prime: Option<PrimeDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factors: Option<FactorDetails>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrimeDetails {
    /// 1-based position among the primes
    pub index: usize,
    pub twin_partner: Option<u64>,
    pub cousin_partner: Option<u64>,
    /// 2p + 1 when it is prime
    pub sophie_germain_partner: Option<u64>,
    /// k when the number is 2^k - 1 with k prime
    pub mersenne_exponent: Option<u32>,
    pub palindromic: bool,
    pub previous_gap: Option<u64>,
    pub next_gap: Option<u64>,
    /// round(n / ln n)
    pub estimated_prime_count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactorDetails {
    /// Prime factors with multiplicity, ascending
    pub factors: Vec<u64>,
    pub totient: u64,
    /// Root when the number is a perfect square
    pub square_root: Option<u64>,
    /// Root when the number is a perfect cube
    pub cube_root: Option<u64>,
}

/// Analyze `number` in `[1, 1_000_000]`.
pub fn analyze_number(number: u64) -> Result<NumberAnalysis, ComputationError> {
    if !(1..=MAX_ANALYZED_NUMBER).contains(&number) {
        return Err(ComputationError::InvalidInput(format!(
            "number must be between 1 and {}, got {}",
            MAX_ANALYZED_NUMBER, number
        )));
    }

    // Covers 2n + 1 and the next prime after n
    let sieve = PrimeSieve::new((2 * number + 1).max(number + 100).max(1000));
    let is_prime = sieve.is_prime(number);

    let (prime, factors) = if is_prime {
        (Some(prime_details(number, &sieve)), None)
    } else {
        (None, Some(factor_details(number)))
    };

    Ok(NumberAnalysis {
        number,
        is_prime,
        is_even: number % 2 == 0,
        mod_6: number % 6,
        mod_10: number % 10,
        binary: format!("{:b}", number),
        prime,
        factors,
    })
}

fn prime_details(p: u64, sieve: &PrimeSieve) -> PrimeDetails {
    let index = (2..=p).filter(|&n| sieve.is_prime(n)).count();
    let partner = |offset: u64| {
        if p > offset && sieve.is_prime(p - offset) {
            Some(p - offset)
        } else if sieve.is_prime(p + offset) {
            Some(p + offset)
        } else {
            None
        }
    };

    let previous = (2..p).rev().find(|&n| sieve.is_prime(n));
    let next = (p + 1..=sieve.limit()).find(|&n| sieve.is_prime(n));

    PrimeDetails {
        index,
        twin_partner: partner(2),
        cousin_partner: partner(4),
        sophie_germain_partner: sieve.is_prime(2 * p + 1).then_some(2 * p + 1),
        mersenne_exponent: mersenne_exponent(p, sieve),
        palindromic: is_palindrome(p),
        previous_gap: previous.map(|q| p - q),
        next_gap: next.map(|q| q - p),
        estimated_prime_count: (p as f64 / (p as f64).ln()).round() as u64,
    }
}

fn mersenne_exponent(p: u64, sieve: &PrimeSieve) -> Option<u32> {
    let candidate = p + 1;
    if !candidate.is_power_of_two() {
        return None;
    }
    let k = candidate.trailing_zeros();
    sieve.is_prime(k as u64).then_some(k)
}

fn factor_details(n: u64) -> FactorDetails {
    let mut factors = Vec::new();
    let mut rest = n;
    let mut d = 2;
    while d * d <= rest {
        while rest % d == 0 {
            factors.push(d);
            rest /= d;
        }
        d += 1;
    }
    if rest > 1 {
        factors.push(rest);
    }

    let mut distinct = factors.clone();
    distinct.dedup();
    let totient = distinct.iter().fold(n, |phi, &p| phi / p * (p - 1));

    FactorDetails {
        factors,
        totient,
        square_root: exact_root(n, 2),
        cube_root: exact_root(n, 3),
    }
}

fn exact_root(n: u64, degree: u32) -> Option<u64> {
    let guess = (n as f64).powf(1.0 / degree as f64).round() as u64;
    (guess.saturating_sub(1)..=guess + 1).find(|r| r.pow(degree) == n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_analysis() {
        let analysis = analyze_number(31).unwrap();
        assert!(analysis.is_prime);
        let prime = analysis.prime.unwrap();
        assert_eq!(prime.index, 11);
        assert_eq!(prime.twin_partner, Some(29));
        assert_eq!(prime.mersenne_exponent, Some(5));
        assert_eq!(prime.previous_gap, Some(2));
        assert_eq!(prime.next_gap, Some(6));
        assert!(analysis.factors.is_none());
    }

    #[test]
    fn test_sophie_germain_partner_beyond_small_window() {
        // 2 * 1013 + 1 = 2027 is prime
        let prime = analyze_number(1013).unwrap().prime.unwrap();
        assert_eq!(prime.sophie_germain_partner, Some(2027));
    }

    #[test]
    fn test_composite_analysis() {
        let analysis = analyze_number(360).unwrap();
        let factors = analysis.factors.unwrap();
        assert_eq!(factors.factors, vec![2, 2, 2, 3, 3, 5]);
        assert_eq!(factors.totient, 96);
        assert_eq!(factors.square_root, None);
        assert_eq!(analysis.mod_6, 0);
        assert_eq!(analysis.binary, "101101000");

        let cube = analyze_number(4096).unwrap().factors.unwrap();
        assert_eq!(cube.square_root, Some(64));
        assert_eq!(cube.cube_root, Some(16));
    }

    #[test]
    fn test_one_is_not_prime() {
        let analysis = analyze_number(1).unwrap();
        assert!(!analysis.is_prime);
        let factors = analysis.factors.unwrap();
        assert!(factors.factors.is_empty());
        assert_eq!(factors.totient, 1);
    }

    #[test]
    fn test_out_of_range() {
        assert!(analyze_number(0).is_err());
        assert!(analyze_number(1_000_001).is_err());
    }
}
