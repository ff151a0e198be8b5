//! # Tessera Codec
//!
//! ## Purpose
//!
//! The "rules" layer between the identity types and the runtime:
//! - [`Blob`]: ownership-bearing byte view with zero-copy typed access
//! - [`Message`]: the envelope every actor hand-off moves
//! - [`payload`]: encoders and validating decoders for the control payloads
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/actors → libs/network → libs/control
//!     ↑           ↓
//! Node, Role   Message + Blob
//! NodeTable    payload rules
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Byte-level framing for a particular transport (belongs to the transport)
//! - Threads, mailboxes, or routing (belongs in libs/actors and libs/network)

pub mod blob;
pub mod error;
pub mod message;
pub mod payload;

pub use blob::Blob;
pub use error::ProtocolError;
pub use message::Message;
pub use payload::{AbortNotice, ClockReply, ClockRequest, RegisterReply, RegisterRequest};

/// Result alias for codec operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
