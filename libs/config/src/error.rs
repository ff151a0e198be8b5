//! Configuration validation errors

use thiserror::Error;
use types::Rank;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Role name outside worker/server/controller
    #[error("Unknown role '{name}' (expected worker, server or controller)")]
    UnknownRole { name: String },

    /// Key of the per-rank role table is not a rank number
    #[error("Role table key '{key}' is not a rank")]
    InvalidRankKey { key: String },

    /// Two role table keys name the same rank, e.g. "1" and "01"
    #[error("Role table keys '{first}' and '{second}' both name rank {rank}")]
    DuplicateRank {
        rank: Rank,
        first: String,
        second: String,
    },

    /// Controller role assigned to a rank other than 0
    #[error("Rank {rank} cannot host the controller; only rank 0 does")]
    ControllerOffRankZero { rank: Rank },

    /// Field value outside its valid range
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}
