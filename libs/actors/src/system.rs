//! Actor Lifecycle and Dispatch
//!
//! [`ActorHandle::spawn`] is the actor's `Start`: it creates the mailbox,
//! spawns a named OS thread, runs `on_start` there and waits for it to
//! succeed before returning. [`ActorHandle::stop`] is `Stop`: it queues a stop
//! signal behind every pending message, joins the thread and reports how the
//! loop ended. [`ActorRef::accept`] is `Accept` and may be called from any
//! thread.
//!
//! The handler table is built once per spawn and never changes, so a message
//! type the actor did not declare is a programming error: the loop logs it,
//! stops, and `stop` returns [`ActorError::UnhandledMessage`].
//!
//! However the loop ends, the mailbox is closed before `on_stop`: later
//! deliveries fail with [`ActorError::MailboxClosed`], and messages already
//! queued go to [`Actor::on_undelivered`] instead of vanishing.

use crate::{ActorError, Mailbox, MailboxSender, Result};
use codec::Message;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use types::MsgType;

/// Message handler bound to an actor type
pub type Handler<A> = fn(&mut A, Message) -> std::result::Result<(), <A as Actor>::Error>;

/// Closed mapping from message type to handler
pub struct HandlerTable<A: Actor> {
    handlers: HashMap<MsgType, Handler<A>>,
}

impl<A: Actor> HandlerTable<A> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Route `msg_type` to `handler`
    pub fn on(mut self, msg_type: MsgType, handler: Handler<A>) -> Self {
        self.handlers.insert(msg_type, handler);
        self
    }

    /// Route every type in `msg_types` to the same handler
    pub fn on_all(mut self, msg_types: &[MsgType], handler: Handler<A>) -> Self {
        for msg_type in msg_types {
            self.handlers.insert(*msg_type, handler);
        }
        self
    }

    pub fn get(&self, msg_type: MsgType) -> Option<Handler<A>> {
        self.handlers.get(&msg_type).copied()
    }

    pub fn handles(&self, msg_type: MsgType) -> bool {
        self.handlers.contains_key(&msg_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<A: Actor> Default for HandlerTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Behaviour of an actor
///
/// Handlers run one at a time on the actor's own thread.
pub trait Actor: Send + Sized + 'static {
    /// Error a handler or lifecycle hook may fail with
    type Error: std::error::Error + Send + Sync + 'static;

    /// Registry name, also used as the thread name
    fn name(&self) -> &str;

    /// Message types this actor accepts
    fn handlers(&self) -> HandlerTable<Self>;

    /// Runs on the actor thread before the first message
    fn on_start(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    /// Runs on the actor thread for each message still queued when the loop
    /// ended, before `on_stop`
    fn on_undelivered(&mut self, _msg: Message) {}

    /// Runs on the actor thread after the loop exits, whatever the reason
    fn on_stop(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// Anything that can take ownership of a message
pub trait Accept: Send + Sync {
    fn accept(&self, msg: Message) -> Result<()>;

    /// The producer feeding this sink stopped for good; nothing more will
    /// be accepted from it
    fn close(&self, _reason: &str) {}
}

enum Envelope {
    Deliver(Message),
    Stop,
}

/// Cloneable address of a running actor
#[derive(Clone)]
pub struct ActorRef {
    name: Arc<str>,
    sender: MailboxSender<Envelope>,
    processed: Arc<AtomicU64>,
    /// Set by the actor thread when its loop ends
    closed: Arc<RwLock<bool>>,
}

impl ActorRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages handled so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

impl Accept for ActorRef {
    fn accept(&self, msg: Message) -> Result<()> {
        // Held across the push so the closing thread sees every message
        // that got in
        let closed = self.closed.read();
        if *closed {
            return Err(ActorError::mailbox_closed(self.name.as_ref()));
        }
        self.sender
            .push(Envelope::Deliver(msg))
            .map_err(|_| ActorError::mailbox_closed(self.name.as_ref()))
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("name", &self.name)
            .field("processed", &self.processed())
            .finish()
    }
}

/// Owner of a running actor thread
#[derive(Debug)]
pub struct ActorHandle {
    actor_ref: ActorRef,
    thread: Option<JoinHandle<Result<()>>>,
}

impl ActorHandle {
    /// Start the actor on its own thread
    ///
    /// Returns once `on_start` has completed on that thread.
    pub fn spawn<A: Actor>(actor: A) -> Result<Self> {
        let name: Arc<str> = Arc::from(actor.name());
        let (sender, mailbox) = Mailbox::new();
        let processed = Arc::new(AtomicU64::new(0));
        let closed = Arc::new(RwLock::new(false));
        let (started_tx, started_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let thread = {
            let name = Arc::clone(&name);
            let processed = Arc::clone(&processed);
            let closed = Arc::clone(&closed);
            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || run(actor, mailbox, processed, closed, started_tx))
                .map_err(|source| ActorError::Spawn {
                    actor: name.to_string(),
                    source,
                })?
        };

        let mut handle = Self {
            actor_ref: ActorRef {
                name,
                sender,
                processed,
                closed,
            },
            thread: Some(thread),
        };

        match started_rx.recv() {
            Ok(Ok(())) => {
                info!(actor = %handle.name(), "Actor started");
                Ok(handle)
            }
            Ok(Err(e)) => {
                handle.join()?;
                Err(e)
            }
            // Thread died before reporting, join to surface the panic
            Err(_) => {
                handle.join()?;
                Err(ActorError::Panicked {
                    actor: handle.name().to_string(),
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        self.actor_ref.name()
    }

    pub fn actor_ref(&self) -> ActorRef {
        self.actor_ref.clone()
    }

    pub fn accept(&self, msg: Message) -> Result<()> {
        self.actor_ref.accept(msg)
    }

    pub fn processed(&self) -> u64 {
        self.actor_ref.processed()
    }

    /// True while the actor thread has not exited
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|thread| !thread.is_finished())
            .unwrap_or(false)
    }

    /// Stop after draining queued messages and wait for the thread
    ///
    /// Returns the error that ended the loop, if any. Calling `stop` again is
    /// a no-op.
    pub fn stop(&mut self) -> Result<()> {
        if self.thread.is_none() {
            return Ok(());
        }
        debug!(actor = %self.name(), "Stopping actor");
        // A loop that already exited has dropped its mailbox; join reports why
        let _ = self.actor_ref.sender.push(Envelope::Stop);
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(outcome) => outcome,
            Err(_) => Err(ActorError::Panicked {
                actor: self.name().to_string(),
            }),
        }
    }
}

impl Drop for ActorHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            warn!(actor = %self.name(), "Actor handle dropped without stop");
            if let Err(e) = self.stop() {
                error!(actor = %self.name(), error = %e, "Actor ended with error");
            }
        }
    }
}

fn run<A: Actor>(
    mut actor: A,
    mailbox: Mailbox<Envelope>,
    processed: Arc<AtomicU64>,
    closed: Arc<RwLock<bool>>,
    started: crossbeam_channel::Sender<Result<()>>,
) -> Result<()> {
    let name = actor.name().to_string();
    let task_start = Instant::now();

    if let Err(e) = actor.on_start() {
        *closed.write() = true;
        error!(actor = %name, error = %e, "Actor failed to start");
        let _ = started.send(Err(ActorError::lifecycle(&name, "start", e)));
        return Ok(());
    }
    let handlers = actor.handlers();
    let _ = started.send(Ok(()));
    drop(started);

    let outcome = loop {
        let msg = match mailbox.pop() {
            Some(Envelope::Deliver(msg)) => msg,
            Some(Envelope::Stop) | None => break Ok(()),
        };

        let msg_type = msg.msg_type();
        let Some(handler) = handlers.get(msg_type) else {
            error!(
                actor = %name,
                msg_type = %msg_type,
                src = msg.src(),
                "No handler registered for message type"
            );
            break Err(ActorError::UnhandledMessage {
                actor: name.clone(),
                msg_type,
            });
        };

        trace!(
            actor = %name,
            msg_type = %msg_type,
            src = msg.src(),
            correlation = msg.correlation(),
            "Dispatching message"
        );
        if let Err(e) = handler(&mut actor, msg) {
            error!(actor = %name, msg_type = %msg_type, error = %e, "Handler failed");
            break Err(ActorError::handler(&name, msg_type, e));
        }
        processed.fetch_add(1, Ordering::Relaxed);
    };

    *closed.write() = true;
    while let Some(envelope) = mailbox.try_pop() {
        let Envelope::Deliver(msg) = envelope else {
            continue;
        };
        warn!(
            actor = %name,
            msg_type = %msg.msg_type(),
            src = msg.src(),
            correlation = msg.correlation(),
            "Message left undelivered"
        );
        actor.on_undelivered(msg);
    }

    let stop_result = actor.on_stop();
    info!(
        actor = %name,
        processed = processed.load(Ordering::Relaxed),
        total_runtime_ms = task_start.elapsed().as_millis() as u64,
        "Actor stopped"
    );

    match (outcome, stop_result) {
        (Err(e), _) => Err(e),
        (Ok(()), Err(e)) => Err(ActorError::lifecycle(&name, "stop", e)),
        (Ok(()), Ok(())) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("rejected: {0}")]
    struct Rejected(&'static str);

    /// Records every barrier source it sees, rejects clock messages
    struct Recorder {
        seen: Arc<Mutex<Vec<u32>>>,
        fail_start: bool,
    }

    impl Actor for Recorder {
        type Error = Rejected;

        fn name(&self) -> &str {
            "recorder"
        }

        fn handlers(&self) -> HandlerTable<Self> {
            HandlerTable::new()
                .on(MsgType::ControlBarrier, Recorder::on_barrier)
                .on(MsgType::ControlClock, |_, _| Err(Rejected("clock")))
        }

        fn on_undelivered(&mut self, msg: Message) {
            self.seen.lock().unwrap().push(UNDELIVERED + msg.src());
        }

        fn on_start(&mut self) -> std::result::Result<(), Rejected> {
            if self.fail_start {
                return Err(Rejected("start"));
            }
            Ok(())
        }
    }

    impl Recorder {
        fn on_barrier(&mut self, msg: Message) -> std::result::Result<(), Rejected> {
            self.seen.lock().unwrap().push(msg.src());
            Ok(())
        }
    }

    /// Undelivered messages are recorded with this offset on their source
    const UNDELIVERED: u32 = 1000;

    fn recorder() -> (Recorder, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Recorder {
                seen: Arc::clone(&seen),
                fail_start: false,
            },
            seen,
        )
    }

    #[test]
    fn test_messages_processed_in_order() {
        let (actor, seen) = recorder();
        let mut handle = ActorHandle::spawn(actor).unwrap();
        for src in 0..50 {
            handle.accept(Message::new(src, 0, MsgType::ControlBarrier)).unwrap();
        }
        handle.stop().unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
        assert_eq!(handle.processed(), 50);
        assert!(!handle.is_running());
    }

    #[test]
    fn test_unhandled_message_is_fatal() {
        let (actor, seen) = recorder();
        let mut handle = ActorHandle::spawn(actor).unwrap();
        handle.accept(Message::new(1, 0, MsgType::ControlRegister)).unwrap();
        handle.accept(Message::new(2, 0, MsgType::ControlBarrier)).unwrap_or(());

        let err = handle.stop().unwrap_err();
        assert!(matches!(
            err,
            ActorError::UnhandledMessage { msg_type: MsgType::ControlRegister, .. }
        ));
        // Nothing after the fatal message was handled
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_error_stops_loop() {
        let (actor, _seen) = recorder();
        let mut handle = ActorHandle::spawn(actor).unwrap();
        handle.accept(Message::new(1, 0, MsgType::ControlClock)).unwrap();

        let err = handle.stop().unwrap_err();
        assert!(matches!(err, ActorError::Handler { msg_type: MsgType::ControlClock, .. }));
    }

    #[test]
    fn test_messages_behind_a_fatal_one_are_not_lost() {
        let (actor, seen) = recorder();
        let mut handle = ActorHandle::spawn(actor).unwrap();
        handle.accept(Message::new(0, 0, MsgType::ControlClock)).unwrap();
        let accepted: Vec<bool> = (1..=3)
            .map(|src| handle.accept(Message::new(src, 0, MsgType::ControlBarrier)).is_ok())
            .collect();
        handle.stop().unwrap_err();

        // Each barrier was either refused at the door or handed back
        let seen = seen.lock().unwrap();
        for (src, accepted) in (1..=3).zip(accepted) {
            assert_eq!(seen.contains(&(UNDELIVERED + src)), accepted, "source {src}");
        }
        assert!(!seen.iter().any(|src| *src < UNDELIVERED));
    }

    #[test]
    fn test_accept_after_stop_fails() {
        let (actor, _seen) = recorder();
        let mut handle = ActorHandle::spawn(actor).unwrap();
        let actor_ref = handle.actor_ref();
        handle.stop().unwrap();

        let err = actor_ref.accept(Message::new(0, 0, MsgType::ControlBarrier)).unwrap_err();
        assert!(matches!(err, ActorError::MailboxClosed { .. }));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (actor, _seen) = recorder();
        let mut handle = ActorHandle::spawn(actor).unwrap();
        handle.stop().unwrap();
        handle.stop().unwrap();
    }

    #[test]
    fn test_failed_start_is_reported() {
        let (mut actor, _seen) = recorder();
        actor.fail_start = true;
        let err = ActorHandle::spawn(actor).unwrap_err();
        assert!(matches!(err, ActorError::Lifecycle { phase: "start", .. }));
    }

    #[test]
    fn test_handler_table_is_closed() {
        let (actor, _seen) = recorder();
        let table = actor.handlers();
        assert_eq!(table.len(), 2);
        assert!(table.handles(MsgType::ControlBarrier));
        assert!(!table.handles(MsgType::ControlReplyBarrier));
    }
}
