//! Control Payload Codecs
//!
//! Layouts (all integers native-endian, every rank runs the same build):
//!
//! | Message                  | Blob 0                                  | Blob 1                        |
//! |--------------------------|-----------------------------------------|-------------------------------|
//! | `Control_Register`       | `Node` (8 bytes)                        |                               |
//! | `Control_Reply_Register` | `NodeTable` (`size * 8` bytes)          | `[num_workers, num_servers]`  |
//! | `Control_Barrier`        |                                         |                               |
//! | `Control_Reply_Barrier`  |                                         |                               |
//! | `Control_Clock`          | `ClockRecord {rank, pad, clock}` (16 B) |                               |
//! | `Control_Reply_Clock`    | `min_clock: u64`                        |                               |
//! | `Control_Abort`          | reason, UTF-8                           |                               |
//!
//! Decoders check the message type first, then every blob length, so a
//! malformed message is rejected before any field is trusted.

use crate::{Blob, Message, ProtocolError, Result};
use types::{MsgType, Node, NodeTable, Rank};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

fn expect_len(msg: &Message, index: usize, expected: usize) -> Result<&Blob> {
    let blob = msg.blob(index)?;
    if blob.len() != expected {
        return Err(ProtocolError::BlobSize {
            msg_type: msg.msg_type(),
            index,
            expected,
            got: blob.len(),
        });
    }
    Ok(blob)
}

/// Join request: the sender's own node record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRequest {
    pub node: Node,
}

impl RegisterRequest {
    pub fn new(node: Node) -> Self {
        Self { node }
    }

    /// Build the request message for the controller at `dst`
    pub fn into_message(self, dst: Rank) -> Message {
        Message::new(self.node.rank, dst, MsgType::ControlRegister).with_blob(Blob::from_pod(&self.node))
    }

    pub fn decode(msg: &Message) -> Result<Self> {
        msg.expect_type(MsgType::ControlRegister)?;
        let blob = expect_len(msg, 0, Node::SIZE)?;
        let node = blob.read::<Node>(0)?;
        if node.rank != msg.src() {
            return Err(ProtocolError::SenderMismatch {
                msg_type: msg.msg_type(),
                src: msg.src(),
                claimed: node.rank,
            });
        }
        node.role()?;
        Ok(Self { node })
    }
}

/// Join completion: the full table and the role counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterReply {
    pub table: NodeTable,
    pub num_workers: u32,
    pub num_servers: u32,
}

impl RegisterReply {
    /// Build from a completed table, counting roles
    pub fn from_table(table: NodeTable) -> Self {
        let num_workers = table.num_workers() as u32;
        let num_servers = table.num_servers() as u32;
        Self {
            table,
            num_workers,
            num_servers,
        }
    }

    /// Append the table and count blobs to a reply message
    pub fn write_to(&self, msg: &mut Message) {
        msg.push(Blob::copy_from_slice(self.table.as_bytes()));
        msg.push(Blob::from_pod_slice(&[self.num_workers, self.num_servers]));
    }

    /// Decode a reply for a cluster of `size` ranks
    pub fn decode(msg: &Message, size: usize) -> Result<Self> {
        msg.expect_type(MsgType::ControlReplyRegister)?;
        let info = expect_len(msg, 0, NodeTable::snapshot_len(size))?;
        let counts = expect_len(msg, 1, 2 * std::mem::size_of::<u32>())?;

        let table = NodeTable::from_bytes(info.as_bytes(), size)?;
        Ok(Self {
            table,
            num_workers: counts.read::<u32>(0)?,
            num_servers: counts.read::<u32>(1)?,
        })
    }
}

/// Wire record of a clock report
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
struct ClockRecord {
    rank: u32,
    pad: u32,
    clock: u64,
}

/// Worker `rank` has finished logical tick `clock`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRequest {
    pub rank: Rank,
    pub clock: u64,
}

impl ClockRequest {
    pub const SIZE: usize = std::mem::size_of::<ClockRecord>();

    pub fn new(rank: Rank, clock: u64) -> Self {
        Self { rank, clock }
    }

    pub fn into_message(self, dst: Rank) -> Message {
        let record = ClockRecord {
            rank: self.rank,
            pad: 0,
            clock: self.clock,
        };
        Message::new(self.rank, dst, MsgType::ControlClock).with_blob(Blob::from_pod(&record))
    }

    pub fn decode(msg: &Message) -> Result<Self> {
        msg.expect_type(MsgType::ControlClock)?;
        let record = expect_len(msg, 0, Self::SIZE)?.read::<ClockRecord>(0)?;
        if record.rank != msg.src() {
            return Err(ProtocolError::SenderMismatch {
                msg_type: msg.msg_type(),
                src: msg.src(),
                claimed: record.rank,
            });
        }
        Ok(Self {
            rank: record.rank,
            clock: record.clock,
        })
    }
}

/// Permission to advance, with the slowest worker's clock at grant time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReply {
    pub min_clock: u64,
}

impl ClockReply {
    pub fn write_to(&self, msg: &mut Message) {
        msg.push(Blob::from_pod(&self.min_clock));
    }

    pub fn decode(msg: &Message) -> Result<Self> {
        msg.expect_type(MsgType::ControlReplyClock)?;
        let min_clock = expect_len(msg, 0, std::mem::size_of::<u64>())?.read::<u64>(0)?;
        Ok(Self { min_clock })
    }
}

/// Why the controller side gave up on a call
///
/// Carries the correlation id of the call it ends, like any other reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortNotice {
    pub reason: String,
}

impl AbortNotice {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Build the abort ending call `correlation` of rank `dst`
    pub fn into_message(self, src: Rank, dst: Rank, correlation: u64) -> Message {
        Message::new(src, dst, MsgType::ControlAbort)
            .with_correlation(correlation)
            .with_blob(Blob::copy_from_slice(self.reason.as_bytes()))
    }

    pub fn decode(msg: &Message) -> Result<Self> {
        msg.expect_type(MsgType::ControlAbort)?;
        let reason = String::from_utf8_lossy(msg.blob(0)?.as_bytes()).into_owned();
        Ok(Self { reason })
    }
}
