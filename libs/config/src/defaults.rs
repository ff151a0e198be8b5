//! Control-plane defaults
//!
//! Values used when neither the configuration file nor the environment sets
//! a field.

/// Clock ticks a worker may run ahead of the slowest worker
pub const STALENESS: u64 = 0;

/// How long the communicator's receive thread blocks on the transport before
/// re-checking for shutdown (milliseconds)
pub const RECV_POLL_INTERVAL_MS: u64 = 10;

/// Run a cluster-wide barrier before tearing a process down
pub const BARRIER_ON_STOP: bool = true;

/// Log level used when neither the file nor `RUST_LOG` says otherwise
pub const LOG_LEVEL: &str = "info";

/// Roles of every rank without an explicit entry
pub const DEFAULT_ROLE: &[&str] = &["worker", "server"];

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "TESSERA";

/// Separator between nesting levels in environment variable names
pub const ENV_SEPARATOR: &str = "__";

/// Base configuration file looked up when no path is given
pub const CONFIG_FILE: &str = "config/cluster.toml";

/// Directory (relative to the base file) holding profile overrides
pub const PROFILE_DIR: &str = "profiles";
