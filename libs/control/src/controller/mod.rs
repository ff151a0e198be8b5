//! Controller Actor
//!
//! Runs on rank 0 only and aggregates the three rendezvous protocols:
//!
//! ```text
//!                    ┌──────────────────────────────────────────┐
//! Control_Register ─▶│ RegisterRound   Collecting → Complete     │──▶ table to every rank
//! Control_Barrier  ─▶│ BarrierEpochs   Open(e) → Released → e+1  │──▶ empty reply to every waiter
//! Control_Clock    ─▶│ ClockTracker    grant iff c <= min + s    │──▶ {min_clock} per grant
//!                    └──────────────────────────────────────────┘
//! ```
//!
//! Replies are only sent once a quorum or bound is met. Every reply carries
//! the correlation id of the request it answers. Any protocol violation is
//! fatal to the controller and surfaces from its `stop`. Before the loop
//! exits, every request it still holds and the offending one are answered
//! with `Control_Abort` naming the violation, so no caller is left waiting.

pub mod barrier;
pub mod clock;
pub mod register;

pub use barrier::{BarrierEpochs, BarrierRelease};
pub use clock::{ClockRelease, ClockTracker};
pub use register::{RegisterPhase, RegisterRelease, RegisterRound};

use crate::{ControlError, Result};
use actors::{names, Accept, Actor, HandlerTable};
use codec::{AbortNotice, ClockReply, ClockRequest, Message, RegisterRequest};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use types::{MsgType, Rank};

/// A request waiting for its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Waiter {
    pub rank: Rank,
    pub correlation: u64,
}

impl Waiter {
    pub fn of(msg: &Message) -> Self {
        Self {
            rank: msg.src(),
            correlation: msg.correlation(),
        }
    }
}

pub struct Controller {
    rank: Rank,
    staleness: u64,
    outbound: Arc<dyn Accept>,
    register: RegisterRound,
    barrier: BarrierEpochs,
    clock: Option<ClockTracker>,
    /// Violation that ended the loop
    failure: Option<String>,
}

impl Controller {
    /// `outbound` is where replies go, normally the local communicator
    pub fn new(rank: Rank, size: usize, staleness: u64, outbound: Arc<dyn Accept>) -> Self {
        Self {
            rank,
            staleness,
            outbound,
            register: RegisterRound::new(size),
            barrier: BarrierEpochs::new(size),
            clock: None,
            failure: None,
        }
    }

    fn reply_to(&self, waiter: Waiter, msg_type: MsgType) -> Message {
        Message::new(self.rank, waiter.rank, msg_type).with_correlation(waiter.correlation)
    }

    /// Run `handle`; if it fails, abort every held request before the
    /// error ends the loop
    fn guarded(&mut self, msg: Message, handle: fn(&mut Self, Message) -> Result<()>) -> Result<()> {
        let offender = Waiter::of(&msg);
        let outcome = handle(self, msg);
        if let Err(e) = &outcome {
            self.abort_all(offender, e);
        }
        outcome
    }

    fn abort_all(&mut self, offender: Waiter, cause: &ControlError) {
        let mut waiters = self.register.drain_waiters();
        waiters.extend(self.barrier.drain_waiters());
        if let Some(tracker) = self.clock.as_mut() {
            waiters.extend(tracker.drain_waiters());
        }
        if !waiters.contains(&offender) {
            waiters.push(offender);
        }

        error!(
            offender = offender.rank,
            aborted = waiters.len(),
            error = %cause,
            "Controller failed, aborting held requests"
        );
        let reason = cause.to_string();
        for waiter in waiters {
            self.send_abort(waiter, &reason);
        }
        self.failure = Some(reason);
    }

    fn send_abort(&self, waiter: Waiter, reason: &str) {
        let abort = AbortNotice::new(reason).into_message(self.rank, waiter.rank, waiter.correlation);
        if let Err(e) = self.outbound.accept(abort) {
            warn!(rank = waiter.rank, error = %e, "Could not deliver abort");
        }
    }

    fn on_register(&mut self, msg: Message) -> Result<()> {
        let request = RegisterRequest::decode(&msg).inspect_err(|e| {
            error!(src = msg.src(), error = %e, "Malformed register request");
        })?;
        debug!(
            rank = request.node.rank,
            role = request.node.role,
            "Register request"
        );

        let Some(release) = self.register.record(Waiter::of(&msg), request.node)? else {
            return Ok(());
        };

        let workers = release.reply.table.worker_ranks();
        info!(
            ranks = release.waiters.len(),
            num_workers = release.reply.num_workers,
            num_servers = release.reply.num_servers,
            "Registration complete"
        );
        self.clock = Some(ClockTracker::new(workers, self.staleness));

        for waiter in release.waiters {
            let mut reply = self.reply_to(waiter, MsgType::ControlReplyRegister);
            release.reply.write_to(&mut reply);
            self.outbound.accept(reply)?;
        }
        Ok(())
    }

    fn on_barrier(&mut self, msg: Message) -> Result<()> {
        msg.expect_empty()?;
        for release in self.barrier.arrive(Waiter::of(&msg))? {
            info!(
                epoch = release.epoch,
                waiters = release.waiters.len(),
                "Barrier released"
            );
            for waiter in release.waiters {
                let reply = self.reply_to(waiter, MsgType::ControlReplyBarrier);
                self.outbound.accept(reply)?;
            }
        }
        Ok(())
    }

    fn on_clock(&mut self, msg: Message) -> Result<()> {
        let request = ClockRequest::decode(&msg)?;
        let Some(tracker) = self.clock.as_mut() else {
            error!(rank = request.rank, "Clock request before registration completed");
            return Err(ControlError::RegistrationIncomplete { rank: request.rank });
        };

        let granted = tracker.report(Waiter::of(&msg), request.clock)?;
        for release in granted {
            debug!(
                rank = release.waiter.rank,
                clock = release.clock,
                min_clock = release.min_clock,
                "Clock granted"
            );
            let mut reply = self.reply_to(release.waiter, MsgType::ControlReplyClock);
            ClockReply {
                min_clock: release.min_clock,
            }
            .write_to(&mut reply);
            self.outbound.accept(reply)?;
        }
        Ok(())
    }
}

impl Actor for Controller {
    type Error = ControlError;

    fn name(&self) -> &str {
        names::CONTROLLER
    }

    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on(MsgType::ControlRegister, |controller: &mut Controller, msg| {
                controller.guarded(msg, Controller::on_register)
            })
            .on(MsgType::ControlBarrier, |controller: &mut Controller, msg| {
                controller.guarded(msg, Controller::on_barrier)
            })
            .on(MsgType::ControlClock, |controller: &mut Controller, msg| {
                controller.guarded(msg, Controller::on_clock)
            })
    }

    fn on_undelivered(&mut self, msg: Message) {
        if msg.msg_type().is_request() {
            let reason = self.failure.as_deref().unwrap_or("controller stopped");
            self.send_abort(Waiter::of(&msg), reason);
        }
    }

    fn on_stop(&mut self) -> Result<()> {
        info!(
            barrier_epoch = self.barrier.epoch(),
            registered = self.register.registered(),
            min_clock = self.clock.as_ref().map(ClockTracker::min_clock).unwrap_or(0),
            "Controller shutting down"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actors::{ActorError, ActorHandle};
    use codec::{ProtocolError, RegisterReply};
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::time::Duration;
    use types::{Node, Role};

    struct Outbox(Sender<Message>);

    impl Accept for Outbox {
        fn accept(&self, msg: Message) -> actors::Result<()> {
            self.0.send(msg).map_err(|_| ActorError::mailbox_closed("outbox"))
        }
    }

    fn controller(size: usize, staleness: u64) -> (ActorHandle, Receiver<Message>) {
        let (tx, rx) = unbounded();
        let handle =
            ActorHandle::spawn(Controller::new(0, size, staleness, Arc::new(Outbox(tx)))).unwrap();
        (handle, rx)
    }

    fn register(rank: Rank, role: Role) -> Message {
        let mut msg = RegisterRequest::new(Node::new(rank, role)).into_message(0);
        msg.set_correlation(1000 + rank as u64);
        msg
    }

    fn recv(rx: &Receiver<Message>) -> Message {
        rx.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_register_replies_to_everyone() {
        let (mut handle, rx) = controller(3, 0);
        handle.accept(register(1, Role::WORKER)).unwrap();
        handle.accept(register(0, Role::SERVER)).unwrap();
        handle.accept(register(2, Role::WORKER | Role::SERVER)).unwrap();

        let mut replies: Vec<Message> = (0..3).map(|_| recv(&rx)).collect();
        replies.sort_by_key(|msg| msg.dst());
        for (rank, reply) in replies.iter().enumerate() {
            assert_eq!(reply.dst(), rank as Rank);
            assert_eq!(reply.correlation(), 1000 + rank as u64);
            let decoded = RegisterReply::decode(reply, 3).unwrap();
            assert_eq!(decoded.num_workers, 2);
            assert_eq!(decoded.num_servers, 2);
        }
        handle.stop().unwrap();
    }

    #[test]
    fn test_barrier_and_clock_after_registration() {
        let (mut handle, rx) = controller(2, 0);
        handle.accept(register(0, Role::WORKER)).unwrap();
        handle.accept(register(1, Role::WORKER)).unwrap();
        recv(&rx);
        recv(&rx);

        handle.accept(Message::new(1, 0, MsgType::ControlBarrier)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        handle.accept(Message::new(0, 0, MsgType::ControlBarrier)).unwrap();
        assert_eq!(recv(&rx).msg_type(), MsgType::ControlReplyBarrier);
        assert_eq!(recv(&rx).msg_type(), MsgType::ControlReplyBarrier);

        handle.accept(ClockRequest::new(0, 1).into_message(0)).unwrap();
        handle.accept(ClockRequest::new(1, 1).into_message(0)).unwrap();
        for _ in 0..2 {
            let reply = recv(&rx);
            assert_eq!(ClockReply::decode(&reply).unwrap().min_clock, 1);
        }
        handle.stop().unwrap();
    }

    #[test]
    fn test_clock_before_registration_is_fatal() {
        let (mut handle, _rx) = controller(2, 0);
        handle.accept(ClockRequest::new(1, 1).into_message(0)).unwrap();
        let err = handle.stop().unwrap_err();
        assert!(matches!(err, ActorError::Handler { msg_type: MsgType::ControlClock, .. }));
    }

    #[test]
    fn test_barrier_with_payload_is_fatal() {
        let (mut handle, _rx) = controller(1, 0);
        let msg = Message::new(0, 0, MsgType::ControlBarrier)
            .with_blob(codec::Blob::from_static(b"x"));
        handle.accept(msg).unwrap();
        let err = handle.stop().unwrap_err();
        let ActorError::Handler { source, .. } = err else {
            panic!("expected a handler error");
        };
        let control = source.downcast_ref::<ControlError>().unwrap();
        assert!(matches!(
            control,
            ControlError::Protocol(ProtocolError::UnexpectedPayload { blobs: 1, .. })
        ));
    }

    fn aborted(rx: &Receiver<Message>) -> Vec<(Rank, u64, String)> {
        let mut aborts: Vec<_> = rx
            .try_iter()
            .map(|msg| {
                assert_eq!(msg.msg_type(), MsgType::ControlAbort);
                let reason = AbortNotice::decode(&msg).unwrap().reason;
                (msg.dst(), msg.correlation(), reason)
            })
            .collect();
        aborts.sort();
        aborts
    }

    #[test]
    fn test_violation_aborts_held_requests() {
        let (mut handle, rx) = controller(2, 0);
        handle.accept(register(0, Role::SERVER)).unwrap();
        handle.accept(register(1, Role::WORKER)).unwrap();
        recv(&rx);
        recv(&rx);

        // Rank 0 waits in the barrier, rank 1 then regresses its clock
        handle
            .accept(Message::new(0, 0, MsgType::ControlBarrier).with_correlation(7))
            .unwrap();
        let mut first = ClockRequest::new(1, 2).into_message(0);
        first.set_correlation(8);
        handle.accept(first).unwrap();
        assert_eq!(recv(&rx).msg_type(), MsgType::ControlReplyClock);
        let mut stale = ClockRequest::new(1, 1).into_message(0);
        stale.set_correlation(9);
        handle.accept(stale).unwrap();

        let err = handle.stop().unwrap_err();
        assert!(matches!(err, ActorError::Handler { msg_type: MsgType::ControlClock, .. }));

        let aborts = aborted(&rx);
        assert_eq!(
            aborts.iter().map(|(rank, correlation, _)| (*rank, *correlation)).collect::<Vec<_>>(),
            vec![(0, 7), (1, 9)]
        );
        assert!(aborts.iter().all(|(_, _, reason)| reason.contains("reported clock 1 after 2")));
    }

    #[test]
    fn test_duplicate_register_aborts_waiting_ranks() {
        let (mut handle, rx) = controller(3, 0);
        handle.accept(register(1, Role::WORKER)).unwrap();
        handle.accept(register(1, Role::WORKER)).unwrap();

        let err = handle.stop().unwrap_err();
        assert!(matches!(err, ActorError::Handler { msg_type: MsgType::ControlRegister, .. }));
        // The first request was held, the duplicate is the offender; both
        // carry the same correlation
        let aborts = aborted(&rx);
        assert_eq!(aborts.len(), 1);
        assert_eq!((aborts[0].0, aborts[0].1), (1, 1001));
        assert!(aborts[0].2.contains("registered twice"));
    }
}
