//! Property tests for node table snapshots

use proptest::prelude::*;
use types::{Node, NodeTable, Role};

prop_compose! {
    fn valid_roles(max_size: usize)
        (roles in prop::collection::vec(0u32..4, 1..max_size)) -> Vec<u32> {
        roles
    }
}

fn table_from_roles(roles: &[u32]) -> NodeTable {
    let mut table = NodeTable::new(roles.len());
    for (rank, bits) in roles.iter().enumerate() {
        let role = Role::from_bits(*bits).unwrap();
        table.set(Node::new(rank as u32, role)).unwrap();
    }
    table
}

proptest! {
    /// Property: snapshot bytes decode to the same table, entry r is rank r
    #[test]
    fn snapshot_preserves_every_entry(roles in valid_roles(64)) {
        let table = table_from_roles(&roles);
        let bytes = table.as_bytes();
        prop_assert_eq!(bytes.len(), NodeTable::snapshot_len(roles.len()));

        let decoded = NodeTable::from_bytes(bytes, roles.len()).unwrap();
        for (rank, node) in decoded.iter().enumerate() {
            prop_assert_eq!(node.rank as usize, rank);
            prop_assert_eq!(node.role, roles[rank]);
        }
    }

    /// Property: applying a snapshot twice equals applying it once
    #[test]
    fn overwrite_is_idempotent(roles in valid_roles(64)) {
        let snapshot = table_from_roles(&roles);

        let mut once = NodeTable::new(roles.len());
        once.overwrite_from(&snapshot).unwrap();

        let mut twice = NodeTable::new(roles.len());
        twice.overwrite_from(&snapshot).unwrap();
        twice.overwrite_from(&snapshot).unwrap();

        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.len(), roles.len());
        prop_assert!(once.is_complete());
    }

    /// Property: worker and server counts match the role bits
    #[test]
    fn counts_match_roles(roles in valid_roles(64)) {
        let table = table_from_roles(&roles);
        let workers = roles.iter().filter(|bits| *bits & 0b01 != 0).count();
        let servers = roles.iter().filter(|bits| *bits & 0b10 != 0).count();
        prop_assert_eq!(table.num_workers(), workers);
        prop_assert_eq!(table.num_servers(), servers);
    }
}

#[test]
fn role_serializes_as_raw_bits() {
    let role = Role::WORKER | Role::SERVER;
    assert_eq!(serde_json::to_string(&role).unwrap(), "3");
    let back: Role = serde_json::from_str("3").unwrap();
    assert_eq!(back, role);
}
