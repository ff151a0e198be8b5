//! Control Message Envelope
//!
//! ```text
//! ┌─────────────────────────────────────────────┬──────────────────────┐
//! │ header                                      │ payload              │
//! │ src │ dst │ msg_type │ correlation          │ [Blob, Blob, ...]    │
//! └─────────────────────────────────────────────┴──────────────────────┘
//! ```
//!
//! A [`Message`] is deliberately not `Clone`: every hand-off (construct →
//! enqueue → dequeue → reply) moves it, so two actors never hold the same
//! message. The correlation id is stamped by the caller that expects a reply;
//! whoever answers copies it into the reply.

use crate::{Blob, ProtocolError, Result};
use types::{MsgType, Rank};

#[derive(Debug, PartialEq, Eq)]
pub struct Message {
    src: Rank,
    dst: Rank,
    msg_type: MsgType,
    correlation: u64,
    payload: Vec<Blob>,
}

impl Message {
    pub fn new(src: Rank, dst: Rank, msg_type: MsgType) -> Self {
        Self {
            src,
            dst,
            msg_type,
            correlation: 0,
            payload: Vec::new(),
        }
    }

    /// Builder-style correlation id
    pub fn with_correlation(mut self, correlation: u64) -> Self {
        self.correlation = correlation;
        self
    }

    /// Builder-style blob append
    pub fn with_blob(mut self, blob: Blob) -> Self {
        self.payload.push(blob);
        self
    }

    pub fn src(&self) -> Rank {
        self.src
    }

    pub fn dst(&self) -> Rank {
        self.dst
    }

    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    pub fn correlation(&self) -> u64 {
        self.correlation
    }

    pub fn set_src(&mut self, src: Rank) {
        self.src = src;
    }

    pub fn set_dst(&mut self, dst: Rank) {
        self.dst = dst;
    }

    pub fn set_correlation(&mut self, correlation: u64) {
        self.correlation = correlation;
    }

    /// Append a blob to the payload
    pub fn push(&mut self, blob: Blob) {
        self.payload.push(blob);
    }

    pub fn data(&self) -> &[Blob] {
        &self.payload
    }

    /// Payload blob `index`, or a protocol error naming this message type
    pub fn blob(&self, index: usize) -> Result<&Blob> {
        self.payload.get(index).ok_or(ProtocolError::MissingBlob {
            msg_type: self.msg_type,
            index,
        })
    }

    pub fn into_payload(self) -> Vec<Blob> {
        self.payload
    }

    /// Fail unless this message has the expected type
    pub fn expect_type(&self, expected: MsgType) -> Result<()> {
        if self.msg_type != expected {
            return Err(ProtocolError::unexpected_type(expected, self.msg_type));
        }
        Ok(())
    }

    /// Fail if a payload-free message type carries blobs
    pub fn expect_empty(&self) -> Result<()> {
        if !self.payload.is_empty() {
            return Err(ProtocolError::UnexpectedPayload {
                msg_type: self.msg_type,
                blobs: self.payload.len(),
            });
        }
        Ok(())
    }
}
