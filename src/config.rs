//! Layered application configuration.
//!
//! Sources, highest priority first:
//! 1. Command-line flags (applied by the binaries via [`ConfigOverrides`])
//! 2. Environment variables (`MAPCACHE_STORE_DIR`, `MAPCACHE_STATS_PATH`)
//! 3. TOML file (`--config` or `MAPCACHE_CONFIG`)
//! 4. Compiled defaults
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::EngineConfig;
use crate::enumerator::ConfigurationSpace;
use crate::error::{CacheError, Result};
use crate::pipeline::PipelineConfig;
use crate::similarity::SimilarityPolicy;
use crate::storage::StoreConfig;

pub const ENV_CONFIG: &str = "MAPCACHE_CONFIG";
pub const ENV_STORE_DIR: &str = "MAPCACHE_STORE_DIR";
pub const ENV_STATS_PATH: &str = "MAPCACHE_STATS_PATH";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub engine: EngineConfig,
    pub pipeline: PipelineConfig,
    pub similarity: SimilarityPolicy,
    pub enumerator: ConfigurationSpace,
}

/// Values given on the command line.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub store_dir: Option<PathBuf>,
    pub stats_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CacheError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CacheError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| CacheError::Config(format!("{}: {}", path.display(), e)))
    }

    /// File (explicit path, else `MAPCACHE_CONFIG`, else defaults) with the
    /// environment layered on top.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with(config_path, |name| std::env::var(name).ok())
    }

    /// [`AppConfig::load`] with an injectable environment lookup.
    pub fn load_with<F>(config_path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = config_path
            .map(Path::to_path_buf)
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from));

        let mut config = match file {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env(env);
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = env(ENV_STORE_DIR).filter(|v| !v.is_empty()) {
            self.store.dir = PathBuf::from(dir);
        }
        if let Some(path) = env(ENV_STATS_PATH).filter(|v| !v.is_empty()) {
            self.pipeline.stats_path = PathBuf::from(path);
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(dir) = &overrides.store_dir {
            self.store.dir = dir.clone();
        }
        if let Some(path) = &overrides.stats_path {
            self.pipeline.stats_path = path.clone();
        }
    }
}
