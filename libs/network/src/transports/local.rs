//! In-Process Transport
//!
//! [`LocalNetwork::build`] wires `size` endpoints together with one unbounded
//! crossbeam channel per rank. A send moves the [`Message`] (and the `Bytes`
//! behind its blobs) into the destination's inbox; nothing is copied or
//! serialized.
//!
//! ```text
//!   rank 0            rank 1            rank 2
//! ┌────────┐        ┌────────┐        ┌────────┐
//! │ inbox0 │◀──┬────│ send() │        │ send() │
//! └────────┘   └────┼────────┼────────│        │
//!                   │ inbox1 │◀───────│        │
//!                   └────────┘        └────────┘
//! ```

use super::{Transport, TransportMetrics};
use crate::{Result, TransportError};
use codec::Message;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};
use types::Rank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Running,
    Finalized,
}

/// Factory for a set of connected in-memory endpoints
pub struct LocalNetwork;

impl LocalNetwork {
    /// Build `size` endpoints; element `r` has rank `r`
    pub fn build(size: usize) -> Result<Vec<LocalTransport>> {
        if size == 0 {
            return Err(TransportError::configuration(
                "cluster needs at least one rank",
                Some("size"),
            ));
        }
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
        let peers: Arc<[Sender<Message>]> = senders.into();

        Ok(receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalTransport {
                rank: rank as Rank,
                peers: Arc::clone(&peers),
                inbox,
                state: RwLock::new(State::Created),
                metrics: Arc::new(TransportMetrics::new()),
            })
            .collect())
    }
}

/// One rank's endpoint of a [`LocalNetwork`]
pub struct LocalTransport {
    rank: Rank,
    peers: Arc<[Sender<Message>]>,
    inbox: Receiver<Message>,
    state: RwLock<State>,
    metrics: Arc<TransportMetrics>,
}

impl LocalTransport {
    pub fn metrics(&self) -> Arc<TransportMetrics> {
        Arc::clone(&self.metrics)
    }

    fn ensure_running(&self) -> Result<()> {
        match *self.state.read() {
            State::Running => Ok(()),
            State::Created => Err(TransportError::NotInitialized { rank: self.rank }),
            State::Finalized => Err(TransportError::Finalized { rank: self.rank }),
        }
    }
}

impl Transport for LocalTransport {
    fn init(&self) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            State::Created => {
                *state = State::Running;
                info!(rank = self.rank, size = self.peers.len(), "Local transport initialized");
                Ok(())
            }
            State::Running => Ok(()),
            State::Finalized => Err(TransportError::Finalized { rank: self.rank }),
        }
    }

    fn finalize(&self) -> Result<()> {
        let mut state = self.state.write();
        if *state != State::Finalized {
            let stats = self.metrics.snapshot();
            info!(
                rank = self.rank,
                messages_sent = stats.messages_sent,
                messages_received = stats.messages_received,
                "Local transport finalized"
            );
        }
        *state = State::Finalized;
        Ok(())
    }

    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, msg: Message) -> Result<()> {
        self.ensure_running()?;
        let dst = msg.dst();
        let peer = self
            .peers
            .get(dst as usize)
            .ok_or(TransportError::UnknownRank {
                rank: dst,
                size: self.peers.len(),
            })?;

        trace!(
            rank = self.rank,
            dst,
            msg_type = %msg.msg_type(),
            correlation = msg.correlation(),
            "Sending message"
        );
        self.metrics.record_send(&msg);
        peer.send(msg)
            .map_err(|_| TransportError::Closed { rank: dst })
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Message>> {
        match *self.state.read() {
            State::Running => {}
            State::Created => return Err(TransportError::NotInitialized { rank: self.rank }),
            State::Finalized => return Ok(None),
        }

        match self.inbox.recv_timeout(timeout) {
            Ok(msg) => {
                self.metrics.record_receive(&msg);
                Ok(Some(msg))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                debug!(rank = self.rank, "Every peer endpoint is gone");
                Ok(None)
            }
        }
    }
}
