//! Tessera Control Plane
//!
//! Cluster membership and synchronization for a parameter-server runtime.
//! Every process runs one [`Zoo`]; rank 0 additionally runs the
//! [`Controller`], which implements three rendezvous protocols as recurring
//! request/reply rounds:
//!
//! - **Register**: every rank announces `{rank, role}`; once all are in, each
//!   rank receives the complete membership table.
//! - **Barrier**: released only when every rank has arrived; early arrivals for
//!   the next round are held back, never double counted.
//! - **Clock**: bounded staleness; a worker finishing tick `c` may go on only
//!   while `c <= min_clock + staleness`.
//!
//! # Architecture
//!
//! ```text
//!              rank 0                                  rank r
//! ┌───────────────────────────────┐       ┌───────────────────────────────┐
//! │ Zoo ──▶ Communicator ◀────────┼───────┼──▶ Communicator ◀── Zoo       │
//! │            │    ▲             │ Trans-│                               │
//! │            ▼    │             │ port  │  Worker host / Server host    │
//! │        Controller             │       │                               │
//! │  Worker host / Server host    │       │                               │
//! └───────────────────────────────┘       └───────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use control::{StartupTables, Zoo, ZooOptions};
//! use network::LocalNetwork;
//! use std::sync::Arc;
//! use types::Role;
//!
//! let transport = LocalNetwork::build(1).unwrap().remove(0);
//! let zoo = Zoo::start(
//!     ZooOptions::new(Role::WORKER),
//!     Arc::new(transport),
//!     StartupTables::new(),
//! )
//! .unwrap();
//!
//! zoo.barrier().unwrap();
//! assert_eq!(zoo.clock(1).unwrap().min_clock, 1);
//! zoo.stop().unwrap();
//! ```

pub mod controller;
pub mod error;
pub mod hosts;
pub mod zoo;

pub use controller::{Controller, Waiter};
pub use error::{ControlError, Result};
pub use hosts::{
    HostKind, ServerHost, ServerTable, StartupTables, Table, TableHandle, TableHost, TableHosts,
    WorkerHost, WorkerTable,
};
pub use zoo::{ClockGrant, Zoo, ZooOptions};
