//! Ordering and ownership guarantees of actor mailboxes under concurrent producers

use actors::{Accept, Actor, ActorHandle, HandlerTable};
use codec::{Blob, Message};
use proptest::prelude::*;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::thread;
use types::MsgType;

type Received = Arc<Mutex<Vec<(u32, u64, Vec<u8>)>>>;

/// Stores (producer, sequence, payload bytes) for every message it handles
struct Collector {
    received: Received,
}

impl Actor for Collector {
    type Error = Infallible;

    fn name(&self) -> &str {
        "collector"
    }

    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new().on(MsgType::ControlBarrier, |actor: &mut Collector, msg| {
            let sequence = msg.correlation();
            let producer = msg.src();
            let bytes = msg.into_payload().remove(0).as_bytes().to_vec();
            actor.received.lock().unwrap().push((producer, sequence, bytes));
            Ok(())
        })
    }
}

fn payload_for(producer: u32, sequence: u64, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (producer as usize * 31 + sequence as usize * 7 + i) as u8)
        .collect()
}

fn run_producers(producers: u32, per_producer: u64, len: usize) -> Vec<(u32, u64, Vec<u8>)> {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let mut handle = ActorHandle::spawn(Collector {
        received: Arc::clone(&received),
    })
    .unwrap();

    let threads: Vec<_> = (0..producers)
        .map(|producer| {
            let actor_ref = handle.actor_ref();
            thread::spawn(move || {
                for sequence in 0..per_producer {
                    let msg = Message::new(producer, 0, MsgType::ControlBarrier)
                        .with_correlation(sequence)
                        .with_blob(Blob::new(payload_for(producer, sequence, len)));
                    actor_ref.accept(msg).unwrap();
                }
            })
        })
        .collect();
    for producer in threads {
        producer.join().unwrap();
    }

    handle.stop().unwrap();
    let received = received.lock().unwrap().clone();
    received
}

#[test]
fn every_message_arrives_exactly_once() {
    let received = run_producers(4, 250, 16);
    assert_eq!(received.len(), 1000);

    let mut keys: Vec<(u32, u64)> = received.iter().map(|(p, s, _)| (*p, *s)).collect();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), 1000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: each producer's messages are observed in its push order
    #[test]
    fn same_producer_fifo(producers in 1u32..6, per_producer in 1u64..200) {
        let received = run_producers(producers, per_producer, 4);
        for producer in 0..producers {
            let sequences: Vec<u64> = received
                .iter()
                .filter(|(p, _, _)| *p == producer)
                .map(|(_, s, _)| *s)
                .collect();
            prop_assert_eq!(sequences, (0..per_producer).collect::<Vec<_>>());
        }
    }

    /// Property: payload bytes are delivered byte-exact under concurrent pushes
    #[test]
    fn payload_bytes_are_not_corrupted(producers in 1u32..5, len in 0usize..512) {
        let received = run_producers(producers, 20, len);
        for (producer, sequence, bytes) in received {
            prop_assert_eq!(bytes, payload_for(producer, sequence, len));
        }
    }
}
