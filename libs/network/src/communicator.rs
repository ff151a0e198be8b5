//! Communicator Actor
//!
//! The only component that touches the [`Transport`]. It has two halves:
//!
//! ```text
//!            outbound (actor thread)                 inbound (receive thread)
//!  Zoo / Controller ──▶ Communicator mailbox      transport.recv_timeout(poll)
//!                          │                               │
//!              dst == rank ├──▶ InboundRoutes ◀────────────┘
//!                          │        │ request  ──▶ controller
//!              dst != rank └──▶ transport.send  │ reply    ──▶ coordinator
//! ```
//!
//! The receive thread polls with a bounded timeout so it notices shutdown;
//! `on_stop` clears the running flag, joins it and reports whatever ended it.
//!
//! Nobody waits forever on a dead path. A request that cannot be handed to a
//! controller (none on this rank, or its loop has exited) is bounced back to
//! its caller as `Control_Abort`. When either half stops, the reply sink is
//! closed so calls still waiting on this rank fail.

use crate::{Result, Transport, TransportError};
use actors::{names, Accept, Actor, HandlerTable};
use codec::{AbortNotice, Message};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use types::{MsgType, Rank};

enum ControllerRoute {
    /// This rank hosts no controller
    Absent,
    /// Controller not attached yet; requests wait here in arrival order
    Pending(Vec<Message>),
    Attached(Arc<dyn Accept>),
}

/// Where inbound messages go on this rank
pub struct InboundRoutes {
    rank: Rank,
    controller: Mutex<ControllerRoute>,
    replies: Arc<dyn Accept>,
}

impl InboundRoutes {
    /// `hosts_controller` is true on the rank that will attach a controller
    pub fn new(rank: Rank, hosts_controller: bool, replies: Arc<dyn Accept>) -> Self {
        let controller = if hosts_controller {
            ControllerRoute::Pending(Vec::new())
        } else {
            ControllerRoute::Absent
        };
        Self {
            rank,
            controller: Mutex::new(controller),
            replies,
        }
    }

    /// Attach the local controller and flush requests that arrived early
    pub fn attach_controller(&self, controller: Arc<dyn Accept>) -> Result<()> {
        let mut route = self.controller.lock();
        let early = match std::mem::replace(&mut *route, ControllerRoute::Absent) {
            ControllerRoute::Pending(early) => early,
            ControllerRoute::Absent | ControllerRoute::Attached(_) => Vec::new(),
        };
        if !early.is_empty() {
            debug!(rank = self.rank, count = early.len(), "Flushing early controller requests");
        }
        for msg in early {
            controller.accept(msg)?;
        }
        *route = ControllerRoute::Attached(controller);
        Ok(())
    }

    /// Route one inbound message by direction
    pub fn route(&self, msg: Message) -> Result<()> {
        if msg.msg_type().is_reply() {
            self.replies.accept(msg)?;
            return Ok(());
        }

        let mut route = self.controller.lock();
        match &mut *route {
            ControllerRoute::Attached(controller) => Ok(controller.accept(msg)?),
            ControllerRoute::Pending(early) => {
                early.push(msg);
                Ok(())
            }
            ControllerRoute::Absent => {
                error!(
                    rank = self.rank,
                    src = msg.src(),
                    msg_type = %msg.msg_type(),
                    "Control request reached a rank without a controller"
                );
                Err(TransportError::NoController {
                    msg_type: msg.msg_type(),
                    src: msg.src(),
                    rank: self.rank,
                })
            }
        }
    }

    /// No further replies will be routed
    pub fn close(&self, reason: &str) {
        self.replies.close(reason);
    }
}

/// Route an inbound message, bouncing requests that cannot be delivered
fn deliver(transport: &dyn Transport, routes: &InboundRoutes, msg: Message) -> Result<()> {
    if msg.msg_type().is_reply() {
        return routes.route(msg);
    }

    let (src, msg_type, correlation) = (msg.src(), msg.msg_type(), msg.correlation());
    let Err(e) = routes.route(msg) else {
        return Ok(());
    };
    let rank = transport.rank();
    warn!(rank, src, msg_type = %msg_type, correlation, error = %e, "Bouncing control request");
    let abort = AbortNotice::new(e.to_string()).into_message(rank, src, correlation);
    if src == rank {
        routes.route(abort)
    } else {
        transport.send(abort)
    }
}

pub struct Communicator {
    transport: Arc<dyn Transport>,
    routes: Arc<InboundRoutes>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<Result<()>>>,
}

impl Communicator {
    pub fn new(
        transport: Arc<dyn Transport>,
        routes: Arc<InboundRoutes>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport,
            routes,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            receiver: None,
        }
    }

    fn on_outbound(&mut self, msg: Message) -> Result<()> {
        let rank = self.transport.rank();
        if msg.dst() == rank {
            trace!(rank, msg_type = %msg.msg_type(), "Routing message locally");
            deliver(self.transport.as_ref(), &self.routes, msg)
        } else {
            self.transport.send(msg)
        }
    }
}

fn receive_loop(
    transport: Arc<dyn Transport>,
    routes: Arc<InboundRoutes>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) -> Result<()> {
    let rank = transport.rank();
    while running.load(Ordering::Acquire) {
        let Some(msg) = transport.recv_timeout(poll_interval)? else {
            continue;
        };
        trace!(
            rank,
            src = msg.src(),
            msg_type = %msg.msg_type(),
            correlation = msg.correlation(),
            "Received message"
        );
        deliver(transport.as_ref(), &routes, msg)?;
    }
    debug!(rank, "Receive loop exiting");
    Ok(())
}

impl Actor for Communicator {
    type Error = TransportError;

    fn name(&self) -> &str {
        names::COMMUNICATOR
    }

    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new().on_all(&MsgType::ALL, Communicator::on_outbound)
    }

    fn on_start(&mut self) -> Result<()> {
        let rank = self.transport.rank();
        self.running.store(true, Ordering::Release);

        let transport = Arc::clone(&self.transport);
        let routes = Arc::clone(&self.routes);
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;
        let receiver = thread::Builder::new()
            .name(format!("{}-recv-{}", names::COMMUNICATOR, rank))
            .spawn(move || {
                let outcome = receive_loop(
                    transport,
                    Arc::clone(&routes),
                    Arc::clone(&running),
                    poll_interval,
                );
                if let Err(e) = &outcome {
                    error!(rank, error = %e, "Receive loop failed");
                    running.store(false, Ordering::Release);
                    routes.close(&format!("receive loop of rank {rank} failed: {e}"));
                }
                outcome
            })
            .map_err(|source| TransportError::ReceiverSpawn { rank, source })?;
        self.receiver = Some(receiver);

        info!(
            rank,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Communicator receive thread started"
        );
        Ok(())
    }

    fn on_stop(&mut self) -> Result<()> {
        let rank = self.transport.rank();
        self.running.store(false, Ordering::Release);
        self.routes.close(&format!("communicator of rank {rank} stopped"));
        let Some(receiver) = self.receiver.take() else {
            return Ok(());
        };
        match receiver.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(rank, "Receive thread panicked");
                Err(TransportError::ReceiverPanicked { rank })
            }
        }
    }
}
