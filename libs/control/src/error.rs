//! Control plane errors
//!
//! Everything the controller, the coordinator and the table hosts can fail
//! with. Lower layers' errors are wrapped unchanged so the violated invariant
//! stays visible in the message.

use actors::ActorError;
use cluster_config::ConfigError;
use codec::ProtocolError;
use network::TransportError;
use thiserror::Error;
use types::{MsgType, Rank, Role, TypesError};

#[derive(Error, Debug)]
pub enum ControlError {
    /// Role bits or placement not allowed for this rank
    #[error("Role {role} is not valid on rank {rank}: {reason}")]
    InvalidRole {
        rank: Rank,
        role: Role,
        reason: &'static str,
    },

    /// Transport reports a cluster without ranks
    #[error("Cluster size must be at least 1")]
    EmptyCluster,

    /// A rank registered twice
    #[error("Rank {rank} registered twice")]
    DuplicateRegistration { rank: Rank },

    /// Registration request after the table was completed
    #[error("Register request from rank {rank} after registration completed")]
    RegistrationClosed { rank: Rank },

    /// Clock request before every rank registered
    #[error("Clock request from rank {rank} before registration completed")]
    RegistrationIncomplete { rank: Rank },

    /// Clock request from a rank without the worker role
    #[error("Rank {rank} is not a worker and cannot report clocks")]
    NotAWorker { rank: Rank },

    /// Worker clocks must strictly increase
    #[error("Rank {rank} reported clock {got} after {previous}")]
    ClockRegression { rank: Rank, previous: u64, got: u64 },

    /// A reply with a correlation id nobody waits for
    #[error("{msg_type} from rank {src} with correlation {correlation} matches no pending call")]
    UnmatchedReply {
        msg_type: MsgType,
        src: Rank,
        correlation: u64,
    },

    /// The pending call's reply channel was dropped before a reply arrived
    #[error("Call {msg_type} (correlation {correlation}) was abandoned before its reply arrived")]
    ReplyDropped { msg_type: MsgType, correlation: u64 },

    /// The controller side answered the call with an abort
    #[error("Controller aborted {msg_type} (correlation {correlation}): {reason}")]
    ControllerAborted {
        msg_type: MsgType,
        correlation: u64,
        reason: String,
    },

    /// This process's reply path is gone, no reply can arrive any more
    #[error("Control replies are closed: {reason}")]
    RepliesClosed { reason: String },

    /// Table registration on a process without that host
    #[error("This process hosts no {kind} tables")]
    MissingHost { kind: &'static str },

    #[error("Table error: {0}")]
    Types(#[from] TypesError),

    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for control plane operations
pub type Result<T> = std::result::Result<T, ControlError>;

impl ControlError {
    /// Create an invalid role error
    pub fn invalid_role(rank: Rank, role: Role, reason: &'static str) -> Self {
        Self::InvalidRole { rank, role, reason }
    }

    /// True for errors caused by a peer breaking a control protocol
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateRegistration { .. }
                | Self::RegistrationClosed { .. }
                | Self::RegistrationIncomplete { .. }
                | Self::NotAWorker { .. }
                | Self::ClockRegression { .. }
                | Self::UnmatchedReply { .. }
                | Self::Protocol(_)
        )
    }
}
