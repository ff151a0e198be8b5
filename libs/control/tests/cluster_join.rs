//! Join completeness across whole clusters

mod common;

use common::{role_from_bits, run_cluster};
use control::HostKind;
use proptest::prelude::*;
use types::{NodeTable, Role};

fn expected_counts(roles: &[Role]) -> (u32, u32) {
    let workers = roles.iter().filter(|role| role.is_worker()).count() as u32;
    let servers = roles.iter().filter(|role| role.is_server()).count() as u32;
    (workers, servers)
}

#[test]
fn every_rank_sees_the_same_complete_table() {
    let roles = vec![
        Role::SERVER,
        Role::WORKER,
        Role::WORKER | Role::SERVER,
        Role::NONE,
        Role::WORKER,
    ];
    let views = run_cluster(&roles, 0, |zoo| {
        (
            zoo.nodes(),
            zoo.num_workers(),
            zoo.num_servers(),
            zoo.host_kind(),
            zoo.actor_names(),
        )
    });

    let (workers, servers) = expected_counts(&roles);
    let reference: &NodeTable = &views[0].0;
    for (rank, (table, num_workers, num_servers, hosts, actors)) in views.iter().enumerate() {
        assert!(table.is_complete());
        assert_eq!(table, reference);
        assert_eq!(*num_workers, workers);
        assert_eq!(*num_servers, servers);
        assert_eq!(*hosts, HostKind::from_role(roles[rank]));
        assert_eq!(actors.contains(&"controller".to_string()), rank == 0);
        for (index, node) in table.iter().enumerate() {
            assert_eq!(node.rank as usize, index);
            assert_eq!(node.role().unwrap(), roles[index]);
        }
    }
    assert_eq!(reference.worker_ranks(), vec![1, 2, 4]);
    assert_eq!(reference.server_ranks(), vec![0, 2]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Property: any roles, any join interleaving, every table is complete
    /// and the counts follow the roles (a rank may count toward both)
    #[test]
    fn join_is_complete_for_any_roles(bits in prop::collection::vec(0u32..4, 1..6)) {
        let roles: Vec<Role> = bits.into_iter().map(role_from_bits).collect();
        let views = run_cluster(&roles, 0, |zoo| (zoo.nodes(), zoo.num_workers(), zoo.num_servers()));

        let (workers, servers) = expected_counts(&roles);
        for (table, num_workers, num_servers) in views {
            prop_assert!(table.is_complete());
            prop_assert_eq!(table.len(), roles.len());
            prop_assert_eq!(num_workers, workers);
            prop_assert_eq!(num_servers, servers);
        }
    }
}
