//! Protocol-level errors for control messages
//!
//! Every variant names the message type involved so the diagnostic
//! identifies which protocol invariant was violated.

use thiserror::Error;
use types::{MsgType, Rank, TypesError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A specific message type was expected and another arrived
    #[error("Unexpected message type: expected {expected}, got {got}")]
    UnexpectedType { expected: MsgType, got: MsgType },

    /// Payload has fewer blobs than the message type requires
    #[error("{msg_type} payload is missing blob {index}")]
    MissingBlob { msg_type: MsgType, index: usize },

    /// Blob length does not match the declared layout
    #[error("{msg_type} blob {index} is {got} bytes, expected {expected}")]
    BlobSize {
        msg_type: MsgType,
        index: usize,
        expected: usize,
        got: usize,
    },

    /// Message type that carries no payload arrived with blobs
    #[error("{msg_type} carries no payload, got {blobs} blobs")]
    UnexpectedPayload { msg_type: MsgType, blobs: usize },

    /// Typed view over a blob failed on size or alignment
    #[error("Cannot view {len} bytes as [{type_name}] (size or alignment mismatch)")]
    BlobView { type_name: &'static str, len: usize },

    /// Indexed read past the end of a blob
    #[error("Element {index} of [{type_name}] is out of bounds for a {len}-byte blob")]
    BlobIndex {
        type_name: &'static str,
        index: usize,
        len: usize,
    },

    /// Payload claims a rank other than the message source
    #[error("{msg_type} from rank {src} claims rank {claimed}")]
    SenderMismatch {
        msg_type: MsgType,
        src: Rank,
        claimed: Rank,
    },

    /// Reply requested for a message that is itself a reply
    #[error("{msg_type} is a reply and cannot be answered")]
    NotARequest { msg_type: MsgType },

    /// Node table snapshot failed validation
    #[error("Invalid node table: {0}")]
    Table(#[from] TypesError),
}

impl ProtocolError {
    /// Create an unexpected type error
    pub fn unexpected_type(expected: MsgType, got: MsgType) -> Self {
        Self::UnexpectedType { expected, got }
    }
}
