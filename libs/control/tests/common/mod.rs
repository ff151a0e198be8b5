//! Multi-rank harness: one Zoo per thread over a LocalNetwork

#![allow(dead_code)]

use control::{StartupTables, Zoo, ZooOptions};
use network::{LocalNetwork, Transport};
use std::sync::{Arc, Barrier};
use std::thread;
use types::Role;

/// Start one Zoo per role, run `body` on every rank, stop, return results by rank
pub fn run_cluster<T, F>(roles: &[Role], staleness: u64, body: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(&Zoo) -> T + Send + Sync + 'static,
{
    let transports = LocalNetwork::build(roles.len()).unwrap();
    let body = Arc::new(body);
    // Lines the threads up so joins interleave as much as possible
    let gate = Arc::new(Barrier::new(roles.len()));

    let handles: Vec<_> = transports
        .into_iter()
        .map(|transport| {
            let role = roles[transport.rank() as usize];
            let body = Arc::clone(&body);
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.wait();
                let zoo = Zoo::start(
                    ZooOptions::new(role).with_staleness(staleness),
                    Arc::new(transport),
                    StartupTables::new(),
                )
                .unwrap();
                let result = body(&zoo);
                zoo.stop().unwrap();
                result
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

pub fn role_from_bits(bits: u32) -> Role {
    Role::from_bits(bits & 0b011).unwrap()
}
