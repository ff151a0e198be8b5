//! Every rank of a LocalNetwork talking to every other rank at once

use codec::{Blob, Message};
use network::{LocalNetwork, Transport};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use types::MsgType;

const PER_PEER: u64 = 50;

#[test]
fn all_to_all_is_complete_and_fifo_per_sender() {
    let size = 4;
    let transports: Vec<Arc<_>> = LocalNetwork::build(size)
        .unwrap()
        .into_iter()
        .map(Arc::new)
        .collect();
    for transport in &transports {
        transport.init().unwrap();
    }

    let threads: Vec<_> = transports
        .iter()
        .map(|transport| {
            let transport = Arc::clone(transport);
            thread::spawn(move || {
                let rank = transport.rank();
                for dst in 0..size as u32 {
                    for seq in 0..PER_PEER {
                        let payload = vec![rank as u8, dst as u8, seq as u8];
                        transport
                            .send(
                                Message::new(rank, dst, MsgType::ControlBarrier)
                                    .with_correlation(seq)
                                    .with_blob(Blob::new(payload)),
                            )
                            .unwrap();
                    }
                }

                let mut next = vec![0u64; size];
                for _ in 0..size as u64 * PER_PEER {
                    let msg = transport
                        .recv_timeout(Duration::from_secs(5))
                        .unwrap()
                        .expect("message within timeout");
                    let src = msg.src() as usize;
                    assert_eq!(msg.correlation(), next[src]);
                    assert_eq!(
                        msg.data()[0].as_bytes(),
                        &[src as u8, rank as u8, next[src] as u8]
                    );
                    next[src] += 1;
                }
                next
            })
        })
        .collect();

    for handle in threads {
        assert_eq!(handle.join().unwrap(), vec![PER_PEER; size]);
    }
    for transport in &transports {
        let stats = transport.metrics().snapshot();
        assert_eq!(stats.messages_sent, size as u64 * PER_PEER);
        assert_eq!(stats.messages_received, size as u64 * PER_PEER);
        transport.finalize().unwrap();
    }
}
