//! Unbounded MPSC Mailboxes
//!
//! Thin wrapper over an unbounded crossbeam channel. Pushes from one producer
//! are popped in push order; pushes from different producers interleave but
//! never reorder each other's sequences.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Consumer side, owned by exactly one thread
#[derive(Debug)]
pub struct Mailbox<T> {
    receiver: Receiver<T>,
}

/// Producer side, cloneable and usable from any thread
#[derive(Debug)]
pub struct MailboxSender<T> {
    sender: Sender<T>,
}

impl<T> Clone for MailboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> Mailbox<T> {
    /// Create a connected mailbox / sender pair
    pub fn new() -> (MailboxSender<T>, Mailbox<T>) {
        let (sender, receiver) = unbounded();
        (MailboxSender { sender }, Mailbox { receiver })
    }

    /// Block until a value arrives; `None` once every sender is gone
    pub fn pop(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Take a value if one is queued
    pub fn try_pop(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block for at most `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T> MailboxSender<T> {
    /// Enqueue a value, handing it back if the mailbox was dropped
    pub fn push(&self, value: T) -> Result<(), T> {
        self.sender.send(value).map_err(|err| err.into_inner())
    }
}
