//! Validation errors for cluster identity types

use thiserror::Error;

/// Errors raised while building or decoding identity types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// Role bitmask contains bits outside {worker, server, controller}
    #[error("Invalid role bitmask {bits:#05b}: valid bits are worker=0b001, server=0b010, controller=0b100")]
    InvalidRole { bits: u32 },

    /// Rank does not fit in the cluster
    #[error("Rank {rank} out of range for cluster of size {size}")]
    RankOutOfRange { rank: u32, size: usize },

    /// Table entry does not describe the rank it is stored under
    #[error("Node table entry {index} carries rank {rank}")]
    RankMismatch { index: usize, rank: u32 },

    /// Serialized table has the wrong number of bytes
    #[error("Node table snapshot is {got} bytes, expected {expected} ({size} nodes)")]
    SnapshotSize {
        expected: usize,
        got: usize,
        size: usize,
    },

    /// Two tables of different cluster sizes were combined
    #[error("Node table size mismatch: expected {expected} entries, got {got}")]
    TableSizeMismatch { expected: usize, got: usize },

    /// Message type discriminant is not part of the control protocol
    #[error("Unknown message type {value}")]
    UnknownMessageType { value: i32 },
}
