//! Thread-Per-Actor Runtime
//!
//! Every actor owns one OS thread and one mailbox. The thread pops messages
//! in FIFO order and dispatches each through a closed handler table keyed by
//! [`MsgType`](types::MsgType), so an actor never runs two handlers at once
//! and its state needs no locking.
//!
//! # Architecture
//!
//! ```text
//!   any thread                     actor thread
//! ┌─────────────┐   Envelope    ┌──────────────────────────────┐
//! │ ActorRef    │──────────────▶│ Mailbox (FIFO, unbounded)    │
//! │  .accept()  │               │   │                          │
//! └─────────────┘               │   ▼                          │
//! ┌─────────────┐    Stop       │ HandlerTable[msg_type]       │
//! │ ActorHandle │──────────────▶│   │ unknown type → fatal     │
//! │  .stop()    │◀── join ──────│   ▼                          │
//! └─────────────┘               │ handler(&mut actor, msg)     │
//!                               └──────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use actors::{Actor, ActorHandle, HandlerTable};
//! use codec::Message;
//! use types::MsgType;
//!
//! struct Counter { seen: u64 }
//!
//! impl Actor for Counter {
//!     type Error = std::convert::Infallible;
//!
//!     fn name(&self) -> &str { "counter" }
//!
//!     fn handlers(&self) -> HandlerTable<Self> {
//!         HandlerTable::new().on(MsgType::ControlBarrier, |actor: &mut Counter, _msg| {
//!             actor.seen += 1;
//!             Ok(())
//!         })
//!     }
//! }
//!
//! let mut handle = ActorHandle::spawn(Counter { seen: 0 }).unwrap();
//! handle.accept(Message::new(0, 0, MsgType::ControlBarrier)).unwrap();
//! handle.stop().unwrap();
//! assert_eq!(handle.processed(), 1);
//! ```

pub mod error;
pub mod mailbox;
pub mod registry;
pub mod system;

pub use error::ActorError;
pub use mailbox::{Mailbox, MailboxSender};
pub use registry::ActorRegistry;
pub use system::{Accept, Actor, ActorHandle, ActorRef, Handler, HandlerTable};

/// Result alias for actor runtime operations
pub type Result<T> = std::result::Result<T, ActorError>;

/// Well-known names of the actors a process can host
pub mod names {
    pub const COMMUNICATOR: &str = "communicator";
    pub const CONTROLLER: &str = "controller";
    pub const WORKER: &str = "worker";
    pub const SERVER: &str = "server";
}
