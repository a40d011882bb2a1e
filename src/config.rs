// ABOUTME: Configuration module for the deckforge pipeline
// ABOUTME: Provides pipeline settings, file/env loading and logger initialization

use crate::errors::{DeckError, Result};
use log::LevelFilter;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Global configuration for the pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(with = "level_filter")]
    pub log_level: LevelFilter,
    pub analysis_cache_size: usize,
    pub cache_ttl_secs: Option<u64>,
    pub template_cache_size: usize,
    pub key_topic_count: usize,
    pub max_list_items: usize,
    pub max_default_lines: usize,
    pub engine_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Warn,
            analysis_cache_size: 32,
            cache_ttl_secs: None,
            template_cache_size: 64,
            key_topic_count: 6,
            max_list_items: 8,
            max_default_lines: 5,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| DeckError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load cache and template sizes from environment variables.
    /// Log verbosity is never taken from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read_usize = |key: &str, fallback: usize| {
            env::var(key)
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(fallback)
        };

        Self {
            analysis_cache_size: read_usize(
                "DECKFORGE_ANALYSIS_CACHE_SIZE",
                defaults.analysis_cache_size,
            ),
            template_cache_size: read_usize(
                "DECKFORGE_TEMPLATE_CACHE_SIZE",
                defaults.template_cache_size,
            ),
            cache_ttl_secs: env::var("DECKFORGE_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok()),
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.analysis_cache_size == 0 || self.template_cache_size == 0 {
            return Err(DeckError::ConfigError(
                "cache sizes must be at least 1".to_string(),
            ));
        }
        if self.max_list_items == 0 || self.max_default_lines == 0 {
            return Err(DeckError::ConfigError(
                "line limits must be at least 1".to_string(),
            ));
        }
        semver::Version::parse(&self.engine_version).map_err(|e| {
            DeckError::ConfigError(format!(
                "engine_version '{}' is not a semantic version: {}",
                self.engine_version, e
            ))
        })?;
        Ok(())
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Get an analyzer configuration with defaults from this config
    pub fn analyzer_config(&self) -> crate::analyzer::AnalyzerConfig {
        crate::analyzer::AnalyzerConfig {
            key_topic_count: self.key_topic_count,
        }
    }

    pub fn template_engine_config(&self) -> crate::template::TemplateEngineConfig {
        crate::template::TemplateEngineConfig {
            engine_version: self.engine_version.clone(),
            cache_size: self.template_cache_size,
        }
    }

    /// Get a composer configuration with defaults from this config
    pub fn composer_config(&self) -> crate::composer::ComposerConfig {
        crate::composer::ComposerConfig {
            max_list_items: self.max_list_items,
            max_default_lines: self.max_default_lines,
        }
    }
}

/// Install the process logger with an explicit verbosity.
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .try_init();
}

mod level_filter {
    use log::LevelFilter;
    use serde::{Deserialize, Deserializer};
    use std::str::FromStr;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        LevelFilter::from_str(&raw).map_err(serde::de::Error::custom)
    }
}
