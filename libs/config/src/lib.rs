//! # Tessera Cluster Configuration
//!
//! Configuration for one control-plane process: which roles each rank plays,
//! the clock staleness bound, and the knobs of the communicator and the
//! shutdown sequence.
//!
//! ## Sources
//!
//! Later sources override earlier ones:
//!
//! 1. Built-in values from [`defaults`]
//! 2. A TOML file (`cluster.toml`)
//! 3. An optional profile file next to it (`profiles/<name>.toml`)
//! 4. `TESSERA_` environment variables (`TESSERA_STALENESS=2`,
//!    `TESSERA_DEFAULT_ROLE=worker,server`)
//!
//! ## Usage
//!
//! ```rust
//! use cluster_config::{defaults, ClusterConfig};
//! use types::Role;
//!
//! let config = ClusterConfig::default();
//! assert_eq!(config.staleness, defaults::STALENESS);
//! assert_eq!(config.role_for(3).unwrap(), Role::WORKER | Role::SERVER);
//! ```

pub mod cluster_config;
pub mod defaults;
pub mod error;

pub use cluster_config::{load_config, parse_role, ClusterConfig};
pub use error::ConfigError;
