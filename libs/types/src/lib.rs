//! # Tessera Cluster Types
//!
//! Identity types shared by every crate of the control plane.
//!
//! ## Contents
//!
//! - **Rank**: integer identity of a process inside the cluster
//! - **Role**: bitmask of the capabilities a process hosts (worker, server, controller)
//! - **Node / NodeTable**: per-rank membership records, byte-exact and zero-copy
//!   convertible so the controller can ship the whole table as one blob
//! - **MsgType**: control-plane message discriminants; negative values are replies
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{Node, NodeTable, Role};
//!
//! let mut table = NodeTable::new(2);
//! table.set(Node::new(1, Role::WORKER | Role::SERVER)).unwrap();
//! assert_eq!(table.num_workers(), 1);
//! assert_eq!(table.as_bytes().len(), 2 * Node::SIZE);
//! ```

pub mod errors;
pub mod message_type;
pub mod node;

pub use errors::TypesError;
pub use message_type::MsgType;
pub use node::{Node, NodeTable, Rank, Role};

/// Rank of the process hosting the controller.
pub const CONTROLLER_RANK: Rank = 0;

/// Result alias for type validation
pub type Result<T> = std::result::Result<T, TypesError>;
