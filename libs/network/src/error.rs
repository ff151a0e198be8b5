//! Transport Error Types

use actors::ActorError;
use thiserror::Error;
use types::{MsgType, Rank};

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Operation on a transport that was not initialized
    #[error("Transport for rank {rank} is not initialized")]
    NotInitialized { rank: Rank },

    /// Operation on a transport after finalize
    #[error("Transport for rank {rank} is finalized")]
    Finalized { rank: Rank },

    /// Destination rank outside the cluster
    #[error("Rank {rank} is outside the cluster of size {size}")]
    UnknownRank { rank: Rank, size: usize },

    /// Peer endpoint is gone
    #[error("Connection to rank {rank} is closed")]
    Closed { rank: Rank },

    /// Request addressed to a rank that hosts no controller
    #[error("{msg_type} from rank {src} reached rank {rank}, which hosts no controller")]
    NoController {
        msg_type: MsgType,
        src: Rank,
        rank: Rank,
    },

    /// Local hand-off to an actor failed
    #[error("Local routing failed: {0}")]
    Routing(#[from] ActorError),

    /// Receive thread could not be started
    #[error("Failed to spawn receive thread for rank {rank}: {source}")]
    ReceiverSpawn {
        rank: Rank,
        source: std::io::Error,
    },

    /// Receive thread panicked
    #[error("Receive thread of rank {rank} panicked")]
    ReceiverPanicked { rank: Rank },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }
}
