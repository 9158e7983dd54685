//! Visualization parameter sets and the option schema.
//!
//! A [`ParameterSet`] is the raw, caller-supplied mapping of option name to
//! value. The [`ParameterSchema`] knows which options exist, their kinds and
//! defaults, and normalizes a raw set into [`CanonicalParams`]: every schema
//! option present, every value in its canonical type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::engine::mapping::MAPPING_NAMES;
use crate::error::{CacheError, Result};

/// Option names of the visualization schema.
pub mod opt {
    pub const RINGS: &str = "rings";
    pub const SEGMENTS: &str = "segments";
    pub const MAPPING: &str = "mapping";
    pub const COLOR_SCHEME: &str = "color_scheme";
    pub const QUALITY: &str = "quality";
    pub const FORMAT: &str = "format";
    pub const TRANSPARENCY: &str = "transparency";
    pub const SHOW_REGULAR: &str = "show_regular";
    pub const SHOW_TWIN: &str = "show_twin";
    pub const SHOW_COUSIN: &str = "show_cousin";
    pub const SHOW_SEXY: &str = "show_sexy";
    pub const SHOW_SOPHIE_GERMAIN: &str = "show_sophie_germain";
    pub const SHOW_PALINDROMIC: &str = "show_palindromic";
    pub const SHOW_MERSENNE: &str = "show_mersenne";
    pub const SHOW_FERMAT: &str = "show_fermat";
    pub const SHOW_COMPOSITE: &str = "show_composite";
    pub const SHOW_GUIDE_RINGS: &str = "show_guide_rings";
    pub const SHOW_RADIAL_GRID: &str = "show_radial_grid";
    pub const INCLUDE_LEGEND: &str = "include_legend";
    /// Which artifact the parameter set asks for; part of the key
    pub const ARTIFACT: &str = "artifact";
}

pub const COLOR_SCHEMES: &[&str] = &["classic", "plasma", "nature", "neon", "ocean", "monochrome"];
pub const QUALITIES: &[&str] = &["low", "medium", "high", "ultra", "extreme"];
pub const FORMATS: &[&str] = &["png", "svg", "pdf", "json"];
pub const ARTIFACT_KINDS: &[&str] = &["point_set", "statistics"];

/// Highlight flags in the order used for descriptive names.
const HIGHLIGHT_LABELS: &[(&str, &str)] = &[
    (opt::SHOW_TWIN, "twin"),
    (opt::SHOW_SOPHIE_GERMAIN, "sophie"),
    (opt::SHOW_MERSENNE, "mersenne"),
    (opt::SHOW_FERMAT, "fermat"),
    (opt::SHOW_PALINDROMIC, "palindromic"),
    (opt::SHOW_COUSIN, "cousin"),
    (opt::SHOW_SEXY, "sexy"),
    (opt::SHOW_REGULAR, "regular"),
];

// ================================================================================================
// VALUES
// ================================================================================================

/// A single option value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Parse a command-line style literal: `true`/`false`, integers, floats,
    /// anything else as text.
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "true" => return ParamValue::Bool(true),
            "false" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return ParamValue::Float(f);
            }
        }
        ParamValue::Text(trimmed.to_string())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

// ================================================================================================
// PARAMETER SET
// ================================================================================================

/// Immutable option-name to value mapping describing one visualization request.
///
/// Storage is sorted by name, so the order options were supplied in never
/// leaks into equality or into the cache key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn builder() -> ParameterSetBuilder {
        ParameterSetBuilder::default()
    }

    /// Build from name/value pairs. A repeated name keeps its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a JSON object of options.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CacheError::invalid("<json>", e.to_string()))
    }

    /// Parse `key=value` arguments as given on a command line.
    pub fn parse_assignments<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut values = BTreeMap::new();
        for arg in args {
            let arg = arg.as_ref();
            let (name, raw) = arg
                .split_once('=')
                .ok_or_else(|| CacheError::invalid(arg, "expected key=value"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(CacheError::invalid(arg, "empty option name"));
            }
            values.insert(name.to_string(), ParamValue::parse_literal(raw));
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A copy of this set with one option replaced.
    pub fn with(&self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let mut values = self.values.clone();
        values.insert(name.into(), value.into());
        Self { values }
    }
}

/// Builder for [`ParameterSet`].
#[derive(Debug, Default)]
pub struct ParameterSetBuilder {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSetBuilder {
    pub fn set(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn rings(self, rings: u32) -> Self {
        self.set(opt::RINGS, rings)
    }

    pub fn segments(self, segments: u32) -> Self {
        self.set(opt::SEGMENTS, segments)
    }

    pub fn mapping(self, mapping: &str) -> Self {
        self.set(opt::MAPPING, mapping)
    }

    pub fn flag(self, name: &str, on: bool) -> Self {
        self.set(name, on)
    }

    pub fn build(self) -> ParameterSet {
        ParameterSet {
            values: self.values,
        }
    }
}

// ================================================================================================
// SCHEMA
// ================================================================================================

/// Kind of an option and the conversions it accepts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OptionKind {
    Integer,
    Float,
    Boolean,
    Choice(&'static [&'static str]),
}

impl OptionKind {
    /// Convert a raw value to this kind's canonical representation.
    fn normalize(&self, value: &ParamValue) -> std::result::Result<ParamValue, String> {
        match (self, value) {
            (OptionKind::Integer, ParamValue::Int(i)) => Ok(ParamValue::Int(*i)),
            (OptionKind::Integer, ParamValue::Float(f)) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Ok(ParamValue::Int(*f as i64))
                } else {
                    Err(format!("expected an integer, got {}", f))
                }
            }
            (OptionKind::Integer, ParamValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| format!("expected an integer, got '{}'", s)),

            (OptionKind::Float, ParamValue::Float(f)) => normalize_float(*f),
            (OptionKind::Float, ParamValue::Int(i)) => normalize_float(*i as f64),
            (OptionKind::Float, ParamValue::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("expected a number, got '{}'", s))
                .and_then(normalize_float),

            (OptionKind::Boolean, ParamValue::Bool(b)) => Ok(ParamValue::Bool(*b)),
            (OptionKind::Boolean, ParamValue::Int(0)) => Ok(ParamValue::Bool(false)),
            (OptionKind::Boolean, ParamValue::Int(1)) => Ok(ParamValue::Bool(true)),
            (OptionKind::Boolean, ParamValue::Text(s)) => {
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(ParamValue::Bool(true)),
                    "false" | "0" => Ok(ParamValue::Bool(false)),
                    _ => Err(format!("expected a boolean, got '{}'", s)),
                }
            }

            (OptionKind::Choice(choices), ParamValue::Text(s)) => {
                let lowered = s.trim().to_ascii_lowercase();
                if choices.contains(&lowered.as_str()) {
                    Ok(ParamValue::Text(lowered))
                } else {
                    Err(format!(
                        "'{}' is not one of: {}",
                        s.trim(),
                        choices.join(", ")
                    ))
                }
            }

            (kind, other) => Err(format!("expected {}, got {}", kind.describe(), other)),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            OptionKind::Integer => "an integer",
            OptionKind::Float => "a number",
            OptionKind::Boolean => "a boolean",
            OptionKind::Choice(_) => "one of the listed names",
        }
    }
}

fn normalize_float(f: f64) -> std::result::Result<ParamValue, String> {
    if !f.is_finite() {
        return Err(format!("non-finite number {}", f));
    }
    // -0.0 and 0.0 must serialize identically
    Ok(ParamValue::Float(if f == 0.0 { 0.0 } else { f }))
}

/// One option of the schema.
#[derive(Clone, Debug)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    /// `None` marks a required option.
    pub default: Option<ParamValue>,
}

impl OptionSpec {
    fn required(name: &'static str, kind: OptionKind) -> Self {
        Self {
            name,
            kind,
            default: None,
        }
    }

    fn with_default(name: &'static str, kind: OptionKind, default: impl Into<ParamValue>) -> Self {
        Self {
            name,
            kind,
            default: Some(default.into()),
        }
    }
}

/// The set of known options with kinds and defaults.
#[derive(Clone, Debug)]
pub struct ParameterSchema {
    options: Vec<OptionSpec>,
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::visualization()
    }
}

impl ParameterSchema {
    pub fn new(options: Vec<OptionSpec>) -> Self {
        Self { options }
    }

    /// Options understood by the prime map visualization.
    pub fn visualization() -> Self {
        use OptionKind::*;
        Self::new(vec![
            OptionSpec::required(opt::RINGS, Integer),
            OptionSpec::required(opt::SEGMENTS, Integer),
            OptionSpec::with_default(opt::MAPPING, Choice(MAPPING_NAMES), "linear"),
            OptionSpec::with_default(opt::COLOR_SCHEME, Choice(COLOR_SCHEMES), "classic"),
            OptionSpec::with_default(opt::QUALITY, Choice(QUALITIES), "high"),
            OptionSpec::with_default(opt::FORMAT, Choice(FORMATS), "png"),
            OptionSpec::with_default(opt::TRANSPARENCY, Float, 0.8),
            OptionSpec::with_default(opt::SHOW_REGULAR, Boolean, true),
            OptionSpec::with_default(opt::SHOW_TWIN, Boolean, true),
            OptionSpec::with_default(opt::SHOW_COUSIN, Boolean, true),
            OptionSpec::with_default(opt::SHOW_SEXY, Boolean, true),
            OptionSpec::with_default(opt::SHOW_SOPHIE_GERMAIN, Boolean, false),
            OptionSpec::with_default(opt::SHOW_PALINDROMIC, Boolean, false),
            OptionSpec::with_default(opt::SHOW_MERSENNE, Boolean, false),
            OptionSpec::with_default(opt::SHOW_FERMAT, Boolean, false),
            OptionSpec::with_default(opt::SHOW_COMPOSITE, Boolean, true),
            OptionSpec::with_default(opt::SHOW_GUIDE_RINGS, Boolean, false),
            OptionSpec::with_default(opt::SHOW_RADIAL_GRID, Boolean, false),
            OptionSpec::with_default(opt::INCLUDE_LEGEND, Boolean, true),
            OptionSpec::with_default(opt::ARTIFACT, Choice(ARTIFACT_KINDS), "point_set"),
        ])
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn spec(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Fill defaults and convert every value to its canonical type.
    ///
    /// Options outside the schema are kept; they only have their floats
    /// checked, since they still take part in the cache key.
    pub fn normalize(&self, params: &ParameterSet) -> Result<CanonicalParams> {
        let mut values = BTreeMap::new();

        for spec in &self.options {
            let value = match (params.get(spec.name), &spec.default) {
                (Some(raw), _) => spec
                    .kind
                    .normalize(raw)
                    .map_err(|reason| CacheError::invalid(spec.name, reason))?,
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(CacheError::invalid(
                        spec.name,
                        "required option is missing and has no default",
                    ))
                }
            };
            values.insert(spec.name.to_string(), value);
        }

        for (name, raw) in params.iter() {
            if self.spec(name).is_some() {
                continue;
            }
            let value = match raw {
                ParamValue::Float(f) => {
                    normalize_float(*f).map_err(|reason| CacheError::invalid(name, reason))?
                }
                other => other.clone(),
            };
            values.insert(name.to_string(), value);
        }

        Ok(CanonicalParams { values })
    }
}

// ================================================================================================
// CANONICAL PARAMS
// ================================================================================================

/// A normalized parameter set: schema options filled, values canonical.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalParams {
    values: BTreeMap<String, ParamValue>,
}

impl CanonicalParams {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_i64)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_f64)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(ParamValue::as_bool).unwrap_or(false)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn rings(&self) -> Option<i64> {
        self.int(opt::RINGS)
    }

    pub fn segments(&self) -> Option<i64> {
        self.int(opt::SEGMENTS)
    }

    pub fn mapping(&self) -> Option<&str> {
        self.text(opt::MAPPING)
    }

    pub fn artifact(&self) -> Option<&str> {
        self.text(opt::ARTIFACT)
    }

    /// Overwrite one value. Callers keep the value's type canonical.
    pub(crate) fn replace(&mut self, name: &str, value: ParamValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Sorted-key compact JSON. Byte-identical for equivalent parameter sets.
    pub fn to_canonical_json(&self) -> String {
        // BTreeMap keys are already sorted; values are plain scalars.
        serde_json::to_string(&self.values).unwrap_or_default()
    }

    pub fn from_canonical_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CacheError::invalid("<canonical>", e.to_string()))
    }

    /// The raw parameter set these canonical values came from.
    pub fn to_parameter_set(&self) -> ParameterSet {
        ParameterSet {
            values: self.values.clone(),
        }
    }

    /// File name describing the request, e.g.
    /// `primes_10r_24s_linear_classic_twin-cousin-sexy-regular.png`.
    pub fn descriptive_name(&self, extension: &str) -> String {
        let enabled: Vec<&str> = HIGHLIGHT_LABELS
            .iter()
            .filter(|(name, _)| self.flag(name))
            .map(|(_, label)| *label)
            .take(4)
            .collect();
        let highlights = if enabled.is_empty() {
            "all".to_string()
        } else {
            enabled.join("-")
        };

        let name = format!(
            "primes_{}r_{}s_{}_{}_{}.{}",
            self.rings().unwrap_or_default(),
            self.segments().unwrap_or_default(),
            self.mapping().unwrap_or("linear"),
            self.text(opt::COLOR_SCHEME).unwrap_or("classic"),
            highlights,
            extension
        );
        name.replace([' ', '/', '\\'], "-")
    }
}
