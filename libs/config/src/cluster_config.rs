//! Cluster Configuration Module
//!
//! Loads a [`ClusterConfig`] from a TOML file, an optional profile override
//! and `TESSERA_` environment variables, then validates it.

use crate::{defaults, ConfigError};
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use types::{Rank, Role, CONTROLLER_RANK};

/// Process-level control-plane configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Roles of ranks listed explicitly, keyed by rank number
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,

    /// Roles of every other rank
    #[serde(default = "default_role")]
    pub default_role: Vec<String>,

    /// Clock staleness bound; 0 synchronizes every tick
    #[serde(default = "default_staleness")]
    pub staleness: u64,

    #[serde(default = "default_recv_poll_interval_ms")]
    pub recv_poll_interval_ms: u64,

    /// Barrier before stopping actors
    #[serde(default = "default_barrier_on_stop")]
    pub barrier_on_stop: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_role() -> Vec<String> {
    defaults::DEFAULT_ROLE.iter().map(|s| s.to_string()).collect()
}

fn default_staleness() -> u64 {
    defaults::STALENESS
}

fn default_recv_poll_interval_ms() -> u64 {
    defaults::RECV_POLL_INTERVAL_MS
}

fn default_barrier_on_stop() -> bool {
    defaults::BARRIER_ON_STOP
}

fn default_log_level() -> String {
    defaults::LOG_LEVEL.to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            roles: HashMap::new(),
            default_role: default_role(),
            staleness: default_staleness(),
            recv_poll_interval_ms: default_recv_poll_interval_ms(),
            barrier_on_stop: default_barrier_on_stop(),
            log_level: default_log_level(),
        }
    }
}

/// Parse role names into a role bitmask
///
/// Names are case-insensitive; an empty list is [`Role::NONE`].
pub fn parse_role<S: AsRef<str>>(names: &[S]) -> std::result::Result<Role, ConfigError> {
    names.iter().try_fold(Role::NONE, |role, name| {
        let bit = match name.as_ref().trim().to_ascii_lowercase().as_str() {
            "worker" => Role::WORKER,
            "server" => Role::SERVER,
            "controller" => Role::CONTROLLER,
            _ => {
                return Err(ConfigError::UnknownRole {
                    name: name.as_ref().to_string(),
                })
            }
        };
        Ok(role | bit)
    })
}

impl ClusterConfig {
    /// Load configuration from files with environment overrides
    ///
    /// Without `base_path` only defaults and the environment apply.
    pub fn load(base_path: Option<&Path>, profile: Option<&str>) -> Result<Self> {
        Self::load_with_env(base_path, profile, None)
    }

    /// Like [`ClusterConfig::load`], reading overrides from `env` instead of
    /// the process environment when given
    pub fn load_with_env(
        base_path: Option<&Path>,
        profile: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        match base_path {
            Some(base) => {
                builder = builder.add_source(File::from(base).required(true));

                // Add profile-specific overrides if specified
                if let Some(profile) = profile {
                    let profile_file = base
                        .parent()
                        .unwrap_or_else(|| Path::new("."))
                        .join(defaults::PROFILE_DIR)
                        .join(format!("{}.toml", profile));

                    if profile_file.exists() {
                        info!("Loading profile config: {:?}", profile_file);
                        builder = builder.add_source(File::from(profile_file));
                    } else {
                        warn!("Profile config not found: {:?}", profile_file);
                    }
                }
            }
            None if profile.is_some() => {
                warn!("Profile given without a base config file, ignoring it");
            }
            None => {}
        }

        // Override with environment variables (TESSERA_ prefix)
        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator(defaults::ENV_SEPARATOR)
                .list_separator(",")
                .with_list_parse_key("default_role")
                .try_parsing(true)
                .source(env),
        );

        let config: ClusterConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate().context("Invalid cluster configuration")?;
        debug!(
            staleness = config.staleness,
            recv_poll_interval_ms = config.recv_poll_interval_ms,
            explicit_roles = config.roles.len(),
            "Cluster configuration loaded"
        );
        Ok(config)
    }

    /// Check every field without looking at a particular cluster size
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.recv_poll_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "recv_poll_interval_ms",
                "must be at least 1",
            ));
        }
        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::invalid_value(
                "log_level",
                format!("'{}' is not a log level", self.log_level),
            ));
        }
        if parse_role(&self.default_role)?.is_controller() {
            return Err(ConfigError::invalid_value(
                "default_role",
                "controller can only be assigned to rank 0 explicitly",
            ));
        }
        let mut keys: Vec<&String> = self.roles.keys().collect();
        keys.sort();
        let mut seen: HashMap<Rank, &String> = HashMap::with_capacity(keys.len());
        for key in keys {
            let rank = Self::parse_rank_key(key)?;
            if let Some(first) = seen.insert(rank, key) {
                return Err(ConfigError::DuplicateRank {
                    rank,
                    first: first.clone(),
                    second: key.clone(),
                });
            }
            self.role_for(rank)?;
        }
        Ok(())
    }

    /// Role of `rank`, falling back to `default_role`
    pub fn role_for(&self, rank: Rank) -> std::result::Result<Role, ConfigError> {
        let mut matching: Vec<&String> = self
            .roles
            .keys()
            .filter(|key| Self::parse_rank_key(key).ok() == Some(rank))
            .collect();
        matching.sort();
        let names = match matching.as_slice() {
            [] => &self.default_role,
            [key] => &self.roles[*key],
            [first, second, ..] => {
                return Err(ConfigError::DuplicateRank {
                    rank,
                    first: first.to_string(),
                    second: second.to_string(),
                })
            }
        };

        let role = parse_role(names)?;
        if role.is_controller() && rank != CONTROLLER_RANK {
            return Err(ConfigError::ControllerOffRankZero { rank });
        }
        Ok(role)
    }

    pub fn recv_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.recv_poll_interval_ms)
    }

    /// Render as TOML, e.g. to show the effective configuration
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    fn parse_rank_key(key: &str) -> std::result::Result<Rank, ConfigError> {
        key.trim().parse().map_err(|_| ConfigError::InvalidRankKey {
            key: key.to_string(),
        })
    }
}

/// Convenience function: load `path` (or the default file if it exists)
pub fn load_config(path: Option<&Path>, profile: Option<&str>) -> Result<ClusterConfig> {
    let fallback = PathBuf::from(defaults::CONFIG_FILE);
    let base = match path {
        Some(path) => Some(path),
        None if fallback.exists() => Some(fallback.as_path()),
        None => None,
    };
    ClusterConfig::load(base, profile)
}
