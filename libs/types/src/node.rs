//! Cluster Membership Records
//!
//! A [`Node`] is the 8-byte record `{rank, role}` every process contributes
//! when it joins. The controller collects them into a [`NodeTable`] and ships
//! the table back to every rank as a single blob, so the in-memory layout IS
//! the wire layout:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬───
//! │ Node rank 0  │ Node rank 1  │ Node rank 2  │ ...
//! │ rank │ role  │ rank │ role  │ rank │ role  │
//! │ u32  │ u32   │ u32  │ u32   │ u32  │ u32   │
//! └──────────────┴──────────────┴──────────────┴───
//! ```

use crate::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Process identity within the cluster
pub type Rank = u32;

/// Capabilities hosted by a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(u32);

impl Role {
    /// Hosts nothing besides the communicator
    pub const NONE: Role = Role(0);
    /// Hosts a worker actor
    pub const WORKER: Role = Role(0b001);
    /// Hosts a server actor
    pub const SERVER: Role = Role(0b010);
    /// Hosts the controller (rank 0 only)
    pub const CONTROLLER: Role = Role(0b100);

    const VALID_BITS: u32 = 0b111;

    /// Build a role from raw bits, rejecting unknown bits
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::VALID_BITS != 0 {
            return Err(TypesError::InvalidRole { bits });
        }
        Ok(Role(bits))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Role) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_worker(self) -> bool {
        self.contains(Self::WORKER)
    }

    pub const fn is_server(self) -> bool {
        self.contains(Self::SERVER)
    }

    pub const fn is_controller(self) -> bool {
        self.contains(Self::CONTROLLER)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Same role with the controller bit cleared
    pub const fn without_controller(self) -> Role {
        Role(self.0 & !Self::CONTROLLER.0)
    }
}

impl BitOr for Role {
    type Output = Role;

    fn bitor(self, rhs: Role) -> Role {
        Role(self.0 | rhs.0)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = [
            (Self::WORKER, "worker"),
            (Self::SERVER, "server"),
            (Self::CONTROLLER, "controller"),
        ]
        .iter()
        .filter(|(role, _)| self.contains(*role))
        .map(|(_, name)| *name)
        .collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Membership record for one rank (8 bytes, no padding)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsBytes, FromBytes, FromZeroes)]
pub struct Node {
    pub rank: u32,
    pub role: u32,
}

impl Node {
    /// Record size in bytes
    pub const SIZE: usize = std::mem::size_of::<Node>();

    pub fn new(rank: Rank, role: Role) -> Self {
        Self {
            rank,
            role: role.bits(),
        }
    }

    /// Placeholder for a rank that has not registered yet
    pub fn unknown(rank: Rank) -> Self {
        Self::new(rank, Role::NONE)
    }

    /// Decode the role bits, rejecting unknown bits
    pub fn role(&self) -> Result<Role> {
        Role::from_bits(self.role)
    }

    pub fn is_worker(&self) -> bool {
        self.role & Role::WORKER.bits() != 0
    }

    pub fn is_server(&self) -> bool {
        self.role & Role::SERVER.bits() != 0
    }

    /// Decode one node from exactly [`Node::SIZE`] bytes (no alignment needed)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Node::read_from(bytes).ok_or(TypesError::SnapshotSize {
            expected: Self::SIZE,
            got: bytes.len(),
            size: 1,
        })
    }
}

/// Rank-indexed membership table
///
/// Entry `r` always describes rank `r`. The table starts incomplete (only the
/// local rank is known) and becomes complete once the controller's snapshot
/// has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTable {
    nodes: Vec<Node>,
    complete: bool,
}

impl NodeTable {
    /// Table for `size` ranks with every role unknown
    pub fn new(size: usize) -> Self {
        Self {
            nodes: (0..size as u32).map(Node::unknown).collect(),
            complete: false,
        }
    }

    /// Byte length of a serialized table for `size` ranks
    pub const fn snapshot_len(size: usize) -> usize {
        size * Node::SIZE
    }

    /// Record a node under its own rank
    pub fn set(&mut self, node: Node) -> Result<()> {
        let size = self.nodes.len();
        let slot = self
            .nodes
            .get_mut(node.rank as usize)
            .ok_or(TypesError::RankOutOfRange {
                rank: node.rank,
                size,
            })?;
        *slot = node;
        Ok(())
    }

    pub fn get(&self, rank: Rank) -> Option<&Node> {
        self.nodes.get(rank as usize)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Wire form: the raw node records in rank order
    pub fn as_bytes(&self) -> &[u8] {
        self.nodes.as_slice().as_bytes()
    }

    /// Decode a snapshot of a `size`-rank table
    ///
    /// The result is marked complete. Every entry must sit under its own rank
    /// and carry a valid role.
    pub fn from_bytes(bytes: &[u8], size: usize) -> Result<Self> {
        let expected = Self::snapshot_len(size);
        if bytes.len() != expected {
            return Err(TypesError::SnapshotSize {
                expected,
                got: bytes.len(),
                size,
            });
        }

        let mut nodes = Vec::with_capacity(size);
        for (index, chunk) in bytes.chunks_exact(Node::SIZE).enumerate() {
            let node = Node::from_bytes(chunk)?;
            if node.rank as usize != index {
                return Err(TypesError::RankMismatch {
                    index,
                    rank: node.rank,
                });
            }
            node.role()?;
            nodes.push(node);
        }

        Ok(Self {
            nodes,
            complete: true,
        })
    }

    /// Replace every entry with the snapshot's entries
    ///
    /// Applying the same snapshot any number of times leaves the same table.
    pub fn overwrite_from(&mut self, snapshot: &NodeTable) -> Result<()> {
        if snapshot.len() != self.len() {
            return Err(TypesError::TableSizeMismatch {
                expected: self.len(),
                got: snapshot.len(),
            });
        }
        self.nodes.copy_from_slice(&snapshot.nodes);
        self.complete = true;
        Ok(())
    }

    pub fn num_workers(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_worker()).count()
    }

    pub fn num_servers(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_server()).count()
    }

    pub fn worker_ranks(&self) -> Vec<Rank> {
        self.nodes
            .iter()
            .filter(|node| node.is_worker())
            .map(|node| node.rank)
            .collect()
    }

    pub fn server_ranks(&self) -> Vec<Rank> {
        self.nodes
            .iter()
            .filter(|node| node.is_server())
            .map(|node| node.rank)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_is_eight_bytes() {
        assert_eq!(Node::SIZE, 8);
        assert_eq!(Node::new(3, Role::SERVER).as_bytes().len(), 8);
    }

    #[test]
    fn test_role_validation() {
        assert_eq!(Role::from_bits(0b011).unwrap(), Role::WORKER | Role::SERVER);
        assert_eq!(
            Role::from_bits(0b1000),
            Err(TypesError::InvalidRole { bits: 0b1000 })
        );
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::NONE.to_string(), "none");
        assert_eq!((Role::WORKER | Role::CONTROLLER).to_string(), "worker|controller");
    }

    #[test]
    fn test_new_table_is_self_consistent() {
        let table = NodeTable::new(5);
        assert!(!table.is_complete());
        for (index, node) in table.iter().enumerate() {
            assert_eq!(node.rank as usize, index);
            assert_eq!(node.role, 0);
        }
    }

    #[test]
    fn test_set_rejects_out_of_range_rank() {
        let mut table = NodeTable::new(2);
        let err = table.set(Node::new(2, Role::WORKER)).unwrap_err();
        assert_eq!(err, TypesError::RankOutOfRange { rank: 2, size: 2 });
    }

    #[test]
    fn test_counts_include_dual_role_ranks() {
        let mut table = NodeTable::new(3);
        table.set(Node::new(0, Role::WORKER | Role::SERVER)).unwrap();
        table.set(Node::new(1, Role::WORKER)).unwrap();
        table.set(Node::new(2, Role::SERVER)).unwrap();

        assert_eq!(table.num_workers(), 2);
        assert_eq!(table.num_servers(), 2);
        assert_eq!(table.worker_ranks(), vec![0, 1]);
        assert_eq!(table.server_ranks(), vec![0, 2]);
    }

    #[test]
    fn test_snapshot_decode() {
        let mut table = NodeTable::new(3);
        table.set(Node::new(1, Role::WORKER)).unwrap();
        table.set(Node::new(2, Role::SERVER)).unwrap();

        let decoded = NodeTable::from_bytes(table.as_bytes(), 3).unwrap();
        assert!(decoded.is_complete());
        assert_eq!(decoded.get(1), Some(&Node::new(1, Role::WORKER)));
        assert_eq!(decoded.get(2), Some(&Node::new(2, Role::SERVER)));
    }

    #[test]
    fn test_snapshot_wrong_size() {
        let table = NodeTable::new(3);
        let err = NodeTable::from_bytes(table.as_bytes(), 4).unwrap_err();
        assert_eq!(
            err,
            TypesError::SnapshotSize {
                expected: 32,
                got: 24,
                size: 4
            }
        );
    }

    #[test]
    fn test_snapshot_rank_mismatch() {
        let mut bytes = NodeTable::new(2).as_bytes().to_vec();
        // Rank field of entry 1 rewritten to 7
        bytes[8..12].copy_from_slice(&7u32.to_ne_bytes());
        let err = NodeTable::from_bytes(&bytes, 2).unwrap_err();
        assert_eq!(err, TypesError::RankMismatch { index: 1, rank: 7 });
    }

    #[test]
    fn test_overwrite_rejects_size_mismatch() {
        let mut local = NodeTable::new(2);
        let remote = NodeTable::new(3);
        assert!(local.overwrite_from(&remote).is_err());
        assert!(!local.is_complete());
    }
}
