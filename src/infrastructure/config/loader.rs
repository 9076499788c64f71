use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::models::{AgentRole, Config};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid queue_capacity: {0}. Must be at least 1")]
    InvalidQueueCapacity(usize),

    #[error("Invalid risk thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .prometheus/config.yaml
    /// 3. .prometheus/local.yaml (optional local overrides)
    /// 4. Environment variables (PROMETHEUS_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".prometheus/config.yaml"))
            .merge(Yaml::file(".prometheus/local.yaml"))
            .merge(Env::prefixed("PROMETHEUS_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file over the defaults
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.bus.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(config.bus.queue_capacity));
        }

        let t = &config.interlock.thresholds;
        if ![t.low, t.medium, t.high, t.critical]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
        {
            return Err(ConfigError::InvalidThresholds(
                "every threshold must be within [0, 1]".to_string(),
            ));
        }
        if !t.is_ascending() {
            return Err(ConfigError::InvalidThresholds(format!(
                "thresholds must ascend: low {} < medium {} < high {} < critical {}",
                t.low, t.medium, t.high, t.critical
            )));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        Self::validate_hierarchy(config)
    }

    fn validate_hierarchy(config: &Config) -> Result<(), ConfigError> {
        let edges = &config.hierarchy.edges;
        if edges.is_empty() {
            return Ok(());
        }

        let mut parent_of: HashMap<AgentRole, AgentRole> = HashMap::new();
        for edge in edges {
            if edge.parent == edge.child {
                return Err(ConfigError::InvalidHierarchy(format!(
                    "{} cannot supervise itself",
                    edge.parent
                )));
            }
            if let Some(existing) = parent_of.insert(edge.child, edge.parent) {
                if existing != edge.parent {
                    return Err(ConfigError::InvalidHierarchy(format!(
                        "{} has two supervisors: {existing} and {}",
                        edge.child, edge.parent
                    )));
                }
            }
        }

        for start in parent_of.keys() {
            let mut cursor = parent_of.get(start);
            let mut steps = 0;
            while let Some(parent) = cursor {
                if parent == start || steps > parent_of.len() {
                    return Err(ConfigError::InvalidHierarchy(format!(
                        "cycle through {start}"
                    )));
                }
                cursor = parent_of.get(parent);
                steps += 1;
            }
        }

        let roots = config.hierarchy.roots();
        if roots.len() != 1 {
            return Err(ConfigError::InvalidHierarchy(format!(
                "expected a single root, found {}",
                roots.len()
            )));
        }
        Ok(())
    }
}
