//! Integration tests for the similarity fallback against a real store.
//!
//! Tests verify:
//! - A near neighbour with the same mapping is served
//! - A mapping mismatch alone never clears the threshold
//! - The closest of several candidates wins

use mapcache::storage::{Artifact, ArtifactKind, ArtifactStore, StoreConfig};
use mapcache::{CacheError, ParameterSet, SimilarityPolicy, SimilarityResolver};

fn request(rings: u32, segments: u32, mapping: &str) -> ParameterSet {
    ParameterSet::builder()
        .rings(rings)
        .segments(segments)
        .mapping(mapping)
        .build()
}

fn artifact(tag: &str) -> Artifact {
    Artifact::json(ArtifactKind::PointSet, format!("{{\"tag\":\"{}\"}}", tag).into_bytes())
}

fn store_with(entries: &[(u32, u32, &str)]) -> (tempfile::TempDir, ArtifactStore) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(StoreConfig::in_dir(tmp_dir.path())).unwrap();
    for (rings, segments, mapping) in entries {
        let tag = format!("{}x{}-{}", rings, segments, mapping);
        store
            .put(&request(*rings, *segments, mapping), &artifact(&tag))
            .unwrap();
    }
    (tmp_dir, store)
}

#[test]
fn test_near_neighbour_is_served() {
    let (_tmp, store) = store_with(&[(10, 24, "linear")]);
    let resolver = SimilarityResolver::default();

    let (found, served) = resolver
        .resolve_artifact(&store, &request(11, 24, "linear"))
        .unwrap();

    assert!((found.score - 95.0).abs() < 1e-9);
    assert_eq!(found.params.rings(), Some(10));
    assert_eq!(served, artifact("10x24-linear"));
}

#[test]
fn test_mapping_mismatch_is_rejected() {
    let (_tmp, store) = store_with(&[(10, 24, "linear")]);
    let resolver = SimilarityResolver::default();

    match resolver.resolve(&store, &request(10, 24, "fibonacci")) {
        Err(CacheError::NoSimilarMatch { best_score }) => {
            assert_eq!(best_score, Some(50.0));
        }
        other => panic!("expected NoSimilarMatch, got {:?}", other),
    }
}

#[test]
fn test_empty_store_has_no_match() {
    let (_tmp, store) = store_with(&[]);
    let result = SimilarityResolver::default().resolve(&store, &request(10, 24, "linear"));
    assert!(matches!(
        result,
        Err(CacheError::NoSimilarMatch { best_score: None })
    ));
}

#[test]
fn test_closest_candidate_wins() {
    let (_tmp, store) = store_with(&[
        (10, 24, "linear"),
        (12, 24, "linear"),
        (11, 30, "linear"),
        (11, 24, "logarithmic"),
    ]);

    let found = SimilarityResolver::default()
        .resolve(&store, &request(11, 25, "linear"))
        .unwrap();

    // 10x24 and 12x24 tie at 50 + 20 + 23; the 11x30 entry scores 50 + 25 + 15
    assert!((found.score - 93.0).abs() < 1e-9);
    assert_eq!(found.params.segments(), Some(24));
}

#[test]
fn test_stricter_policy_rejects_distant_entries() {
    let (_tmp, store) = store_with(&[(10, 24, "linear")]);
    let resolver = SimilarityResolver::new(SimilarityPolicy {
        threshold: 96.0,
        ..SimilarityPolicy::default()
    });

    assert!(resolver.resolve(&store, &request(11, 24, "linear")).is_err());
    assert!(resolver.resolve(&store, &request(10, 24, "linear")).is_ok());
}

#[test]
fn test_expired_entries_are_not_candidates() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::in_dir(tmp_dir.path());
    config.ttl_secs = 60;
    let store = ArtifactStore::open(config).unwrap();
    store.put(&request(10, 24, "linear"), &artifact("old")).unwrap();

    let key = store.canonicalizer().key(&request(10, 24, "linear")).unwrap();
    std::fs::File::options()
        .write(true)
        .open(store.entry_path(&key))
        .unwrap()
        .set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(120))
        .unwrap();

    assert!(SimilarityResolver::default()
        .resolve(&store, &request(11, 24, "linear"))
        .is_err());
}
