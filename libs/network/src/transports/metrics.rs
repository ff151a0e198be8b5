//! Transport Counters
//!
//! Lock-free message and byte counters plus the time of the last activity,
//! shared between a transport and whoever inspects it.

use codec::Message;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Default)]
pub struct TransportMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    last_activity: RwLock<Option<Instant>>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

fn payload_bytes(msg: &Message) -> u64 {
    msg.data().iter().map(|blob| blob.len() as u64).sum()
}

impl TransportMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_send(&self, msg: &Message) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(payload_bytes(msg), Ordering::Relaxed);
        *self.last_activity.write() = Some(Instant::now());
    }

    pub fn record_receive(&self, msg: &Message) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(payload_bytes(msg), Ordering::Relaxed);
        *self.last_activity.write() = Some(Instant::now());
    }

    pub fn last_activity(&self) -> Option<Instant> {
        *self.last_activity.read()
    }

    pub fn snapshot(&self) -> TransportStats {
        TransportStats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}
