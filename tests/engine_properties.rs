//! Property-style tests for the computation engine and key canonicalizer.
//!
//! Tests verify:
//! - Sieve and pattern classification on small known ranges
//! - Every mapping strategy stays inside the grid
//! - Full computations are deterministic and well-formed
//! - Cache keys ignore option order and explicit defaults

use mapcache::engine::{analyze_number, PatternKind, PrimePatterns, PrimeSieve};
use mapcache::params::opt;
use mapcache::{ComputationEngine, ComputationError, KeyCanonicalizer, MappingStrategy, ParameterSet};

fn canonical(rings: u32, segments: u32) -> mapcache::CanonicalParams {
    KeyCanonicalizer::default()
        .canonicalize(&ParameterSet::builder().rings(rings).segments(segments).build())
        .unwrap()
}

// ============================================================================
// SIEVE AND PATTERNS
// ============================================================================

#[test]
fn test_primes_to_thirty() {
    let sieve = PrimeSieve::new(30);
    assert_eq!(sieve.primes(), vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    assert!(!sieve.is_prime(31), "beyond the limit is never prime");
}

#[test]
fn test_twin_pairs_to_fifty() {
    let sieve = PrimeSieve::new(50);
    let patterns = PrimePatterns::classify(&sieve.primes(), &sieve);
    assert_eq!(
        patterns.twin,
        vec![(3, 5), (5, 7), (11, 13), (17, 19), (29, 31), (41, 43)]
    );
    let members = patterns.members(PatternKind::Twin);
    assert!(members.contains(&5) && members.contains(&43));
    assert!(!members.contains(&23));
}

// ============================================================================
// MAPPING
// ============================================================================

#[test]
fn test_every_mapping_is_total_and_bounded() {
    for mapping in MappingStrategy::ALL {
        for rings in 1..=7u32 {
            for segments in 2..=9u32 {
                let total = rings as u64 * segments as u64;
                for n in 1..=total {
                    let c = mapping.map(n, total, rings, segments);
                    assert!(
                        c.ring < rings && c.segment < segments,
                        "{} mapped {} of {} outside {}x{}: {:?}",
                        mapping,
                        n,
                        total,
                        rings,
                        segments,
                        c
                    );
                }
            }
        }
    }
}

#[test]
fn test_mapping_names_parse_case_insensitively() {
    for mapping in MappingStrategy::ALL {
        let upper = mapping.name().to_uppercase();
        assert_eq!(upper.parse::<MappingStrategy>().unwrap(), mapping);
    }
    assert!("spiral".parse::<MappingStrategy>().is_err());
}

// ============================================================================
// FULL COMPUTATION
// ============================================================================

#[test]
fn test_compute_ten_by_twenty_four() {
    let engine = ComputationEngine::default();
    let result = engine.compute(&canonical(10, 24)).unwrap();

    assert_eq!(result.primes.len(), 52);
    assert_eq!(result.statistics.prime_count, 52);
    assert_eq!(result.statistics.twin_pairs, 16);
    assert_eq!(result.sampling_step, 1);
    assert!(result
        .points
        .iter()
        .all(|p| p.position.ring < 10 && p.position.segment < 24));
    for prime in &result.primes {
        assert!(result.points.iter().any(|p| p.n == *prime));
    }
}

#[test]
fn test_compute_is_deterministic() {
    let engine = ComputationEngine::default();
    let a = engine.produce(&canonical(12, 30)).unwrap();
    let b = engine.produce(&canonical(12, 30)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_out_of_range_dimensions_are_clamped() {
    let engine = ComputationEngine::default();
    let result = engine.compute(&canonical(0, 1)).unwrap();
    assert_eq!(result.request.rings, 1);
    assert_eq!(result.request.segments, 2);
    assert_eq!(result.params.rings(), Some(1));
}

#[test]
fn test_element_ceiling() {
    let mut engine_config = mapcache::EngineConfig::default();
    engine_config.max_elements = 100;
    let engine = ComputationEngine::new(engine_config);

    assert!(matches!(
        engine.compute(&canonical(10, 20)),
        Err(ComputationError::TooLarge { elements: 200, limit: 100 })
    ));
}

#[test]
fn test_analyze_prime_and_composite() {
    let prime = analyze_number(29).unwrap();
    assert!(prime.is_prime);
    let details = prime.prime.unwrap();
    assert_eq!(details.twin_partner, Some(31));
    assert_eq!(details.sophie_germain_partner, Some(59));

    let composite = analyze_number(84).unwrap();
    assert!(!composite.is_prime);
    assert_eq!(composite.factors.unwrap().factors, vec![2, 2, 3, 7]);
}

// ============================================================================
// KEY INVARIANCE
// ============================================================================

#[test]
fn test_key_ignores_order_and_defaults() {
    let canon = KeyCanonicalizer::default();
    let parsed = ParameterSet::parse_assignments(&["segments=24", "rings=10"]).unwrap();
    let built = ParameterSet::builder()
        .rings(10)
        .segments(24)
        .mapping("linear")
        .flag(opt::SHOW_SOPHIE_GERMAIN, false)
        .build();

    assert_eq!(canon.key(&parsed).unwrap(), canon.key(&built).unwrap());
    assert_ne!(
        canon.key(&parsed).unwrap(),
        canon.key(&built.with(opt::COLOR_SCHEME, "neon")).unwrap()
    );
}

#[test]
fn test_missing_required_option_is_rejected() {
    let canon = KeyCanonicalizer::default();
    let err = canon
        .key(&ParameterSet::builder().rings(10).build())
        .unwrap_err();
    assert!(err.to_string().contains("segments"));
}
