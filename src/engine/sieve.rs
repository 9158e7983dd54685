//! Sieve of Eratosthenes over a packed bitset.
//!
//! One bit per integer in `[0, limit]`. The sieve doubles as the prime
//! membership set for every pattern probe, so nothing is sieved twice.

/// Primality table for `[0, limit]`.
#[derive(Clone, Debug)]
pub struct PrimeSieve {
    limit: u64,
    /// Bit `n` set when `n` is composite (or 0/1)
    composite: Vec<u64>,
}

impl PrimeSieve {
    pub fn new(limit: u64) -> Self {
        let words = (limit / 64 + 1) as usize;
        let mut composite = vec![0u64; words];
        let mut mark = |n: u64| composite[(n / 64) as usize] |= 1 << (n % 64);

        mark(0);
        if limit >= 1 {
            mark(1);
        }
        let mut even = 4;
        while even <= limit {
            mark(even);
            even += 2;
        }

        let mut sieve = Self { limit, composite };
        let mut i = 3;
        while i * i <= limit {
            if sieve.is_prime(i) {
                let mut j = i * i;
                while j <= limit {
                    sieve.composite[(j / 64) as usize] |= 1 << (j % 64);
                    j += 2 * i;
                }
            }
            i += 2;
        }
        sieve
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Primality of `n`. Numbers above the limit report `false`.
    #[inline]
    pub fn is_prime(&self, n: u64) -> bool {
        n <= self.limit && self.composite[(n / 64) as usize] & (1 << (n % 64)) == 0
    }

    /// Ascending primes up to the limit.
    pub fn primes(&self) -> Vec<u64> {
        (2..=self.limit).filter(|&n| self.is_prime(n)).collect()
    }

    pub fn count(&self) -> usize {
        (2..=self.limit).filter(|&n| self.is_prime(n)).count()
    }
}
