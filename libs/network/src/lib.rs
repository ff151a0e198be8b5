//! Network Infrastructure
//!
//! The control plane talks to the network only through the [`Transport`]
//! trait: init/finalize, identity (`rank`, `size`), and point-to-point
//! `send`/`recv_timeout` of whole [`Message`](codec::Message)s. Real
//! transports are external collaborators; [`LocalNetwork`] connects N ranks
//! inside one process and backs the tests and the local-cluster launcher.
//!
//! The [`Communicator`] actor is the only component that touches the
//! transport. Outbound messages are pushed to it like to any other actor;
//! inbound messages are routed to the local controller (requests) or to the
//! local coordinator (replies).

pub mod communicator;
pub mod error;
pub mod transports;

pub use communicator::{Communicator, InboundRoutes};
pub use error::{Result, TransportError};
pub use transports::{LocalNetwork, LocalTransport, Transport, TransportMetrics, TransportStats};

/// Default interval the communicator's receive thread waits on the transport
/// before re-checking for shutdown
pub const DEFAULT_RECV_POLL_INTERVAL_MS: u64 = 10;
