//! Key canonicalizer: parameter set to fixed-length content digest.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{CacheError, Result};
use crate::params::{CanonicalParams, ParameterSchema, ParameterSet};

/// Prefixed to the canonical JSON before hashing. Bump when the canonical
/// encoding changes so old entries stop matching.
pub const KEY_FORMAT_VERSION: &str = "mapcache-key-v1";

/// SHA-256 digest of a canonical parameter serialization.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Hex length of a key, also the stem length of artifact file names.
    pub const HEX_LEN: usize = 64;

    pub fn from_canonical_json(json: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_FORMAT_VERSION.as_bytes());
        hasher.update(b"\n");
        hasher.update(json.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn from_canonical(params: &CanonicalParams) -> Self {
        Self::from_canonical_json(&params.to_canonical_json())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        use fmt::Write;
        let mut out = String::with_capacity(Self::HEX_LEN);
        for byte in self.0 {
            let _ = write!(out, "{:02x}", byte);
        }
        out
    }

    /// Parse a 64-char lower- or upper-case hex digest.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != Self::HEX_LEN || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).ok()?;
            bytes[i] = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({}…)", &self.to_hex()[..12])
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s).ok_or_else(|| CacheError::invalid("key", format!("not a cache key: '{}'", s)))
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        CacheKey::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid cache key '{}'", hex)))
    }
}

/// Turns parameter sets into canonical values and keys under one schema.
#[derive(Clone, Debug, Default)]
pub struct KeyCanonicalizer {
    schema: ParameterSchema,
}

impl KeyCanonicalizer {
    pub fn new(schema: ParameterSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    pub fn canonicalize(&self, params: &ParameterSet) -> Result<CanonicalParams> {
        self.schema.normalize(params)
    }

    pub fn canonical_json(&self, params: &ParameterSet) -> Result<String> {
        Ok(self.canonicalize(params)?.to_canonical_json())
    }

    pub fn key(&self, params: &ParameterSet) -> Result<CacheKey> {
        Ok(CacheKey::from_canonical(&self.canonicalize(params)?))
    }

    /// Canonical values together with their key.
    pub fn resolve(&self, params: &ParameterSet) -> Result<(CacheKey, CanonicalParams)> {
        let canonical = self.canonicalize(params)?;
        Ok((CacheKey::from_canonical(&canonical), canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{opt, ParamValue};

    #[test]
    fn test_insertion_order_does_not_change_key() {
        let canon = KeyCanonicalizer::default();
        let a = ParameterSet::from_pairs([
            (opt::RINGS, ParamValue::Int(10)),
            (opt::SEGMENTS, ParamValue::Int(24)),
            (opt::MAPPING, ParamValue::Text("linear".into())),
        ]);
        let b = ParameterSet::from_pairs([
            (opt::MAPPING, ParamValue::Text("linear".into())),
            (opt::SEGMENTS, ParamValue::Int(24)),
            (opt::RINGS, ParamValue::Int(10)),
        ]);
        assert_eq!(canon.key(&a).unwrap(), canon.key(&b).unwrap());
    }

    #[test]
    fn test_explicit_default_equals_omitted_default() {
        let canon = KeyCanonicalizer::default();
        let implicit = ParameterSet::builder().rings(10).segments(24).build();
        let explicit = implicit.with(opt::MAPPING, "linear");
        assert_eq!(canon.key(&implicit).unwrap(), canon.key(&explicit).unwrap());
    }

    #[test]
    fn test_different_params_give_different_keys() {
        let canon = KeyCanonicalizer::default();
        let a = ParameterSet::builder().rings(10).segments(24).build();
        let b = a.with(opt::RINGS, 11i64);
        assert_ne!(canon.key(&a).unwrap(), canon.key(&b).unwrap());
    }

    #[test]
    fn test_canonical_json_is_sorted() {
        let canon = KeyCanonicalizer::default();
        let json = canon
            .canonical_json(&ParameterSet::builder().segments(24).rings(10).build())
            .unwrap();
        let color = json.find("\"color_scheme\"").unwrap();
        let rings = json.find("\"rings\"").unwrap();
        let segments = json.find("\"segments\"").unwrap();
        assert!(color < rings && rings < segments);
        assert!(!json.contains(' '));
    }

    #[test]
    fn test_hex_round_trip() {
        let key = KeyCanonicalizer::default()
            .key(&ParameterSet::builder().rings(3).segments(12).build())
            .unwrap();
        let hex = key.to_hex();
        assert_eq!(hex.len(), CacheKey::HEX_LEN);
        assert_eq!(hex.parse::<CacheKey>().unwrap(), key);
        assert!(CacheKey::from_hex("xyz").is_none());
    }
}
