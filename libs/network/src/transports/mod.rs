//! Transport Layer
//!
//! The synchronous point-to-point contract the control plane consumes.
//! Implementations move whole messages between ranks; how they frame them on
//! a wire is their own business.

use crate::Result;
use codec::Message;
use std::time::Duration;
use types::Rank;

pub mod local;
pub mod metrics;

pub use local::{LocalNetwork, LocalTransport};
pub use metrics::{TransportMetrics, TransportStats};

/// Point-to-point delivery between ranks
pub trait Transport: Send + Sync {
    /// Bring the endpoint up; must precede any send or receive
    fn init(&self) -> Result<()>;

    /// Tear the endpoint down; later receives yield nothing
    fn finalize(&self) -> Result<()>;

    /// This process's rank
    fn rank(&self) -> Rank;

    /// Number of ranks in the cluster
    fn size(&self) -> usize;

    /// Ship a message to `msg.dst()`
    fn send(&self, msg: Message) -> Result<()>;

    /// Wait up to `timeout` for an inbound message
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Message>>;
}
