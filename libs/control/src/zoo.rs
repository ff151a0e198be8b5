//! Zoo: Per-Process Coordinator
//!
//! One `Zoo` per process. It owns the cluster identity (rank, size, role,
//! membership table), the actors this process runs, and the blocking control
//! calls application code uses to join and synchronize with the cluster.
//!
//! ## Call Flow
//!
//! ```text
//!  caller thread                          actors
//! ┌────────────────────────┐
//! │ zoo.barrier()          │
//! │  correlation = next()  │   pending[correlation] = one-shot sender
//! │  communicator.accept ──┼──▶ Communicator ──▶ transport ──▶ rank 0 Controller
//! │  rx.recv() (blocks)    │                                        │
//! │        ▲               │                                        ▼
//! └────────┼───────────────┘   ReplyRouter ◀── Communicator ◀── reply (same id)
//!          └─────────── pending.remove(correlation).send(reply)
//! ```
//!
//! Each call waits on its own channel, so several threads of one process may
//! run control calls at the same time.
//!
//! ## Failure
//!
//! A call never outlives the path that would answer it. Local invariants
//! (join once, strictly increasing ticks) are checked before anything is
//! sent. A controller that gives up answers with `Control_Abort`, surfaced as
//! [`ControlError::ControllerAborted`]. When the communicator stops or its
//! receive loop fails, every waiting call and every later one fails with
//! [`ControlError::RepliesClosed`].
//!
//! ## Lifecycle
//!
//! `start`: validate the role, initialize the transport, start the
//! communicator, the controller (rank 0), the worker host and the server host
//! in that order, then join the cluster. `stop`: barrier, stop the actors in
//! reverse order, finalize the transport.

use crate::hosts::{
    HostKind, ServerHost, ServerTable, StartupTables, TableHandle, TableHosts, WorkerHost,
    WorkerTable,
};
use crate::{Controller, ControlError, Result};
use actors::{names, Accept, ActorHandle, ActorRegistry};
use cluster_config::ClusterConfig;
use codec::{
    AbortNotice, ClockReply, ClockRequest, Message, ProtocolError, RegisterReply, RegisterRequest,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use network::{Communicator, InboundRoutes, Transport, DEFAULT_RECV_POLL_INTERVAL_MS};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use types::{MsgType, Node, NodeTable, Rank, Role, CONTROLLER_RANK};
use uuid::Uuid;

/// Per-process start options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZooOptions {
    pub role: Role,
    /// Clock staleness bound used by the controller (rank 0 only)
    pub staleness: u64,
    pub recv_poll_interval: Duration,
    /// Run a barrier in `stop` before tearing down
    pub barrier_on_stop: bool,
}

impl ZooOptions {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            staleness: cluster_config::defaults::STALENESS,
            recv_poll_interval: Duration::from_millis(DEFAULT_RECV_POLL_INTERVAL_MS),
            barrier_on_stop: cluster_config::defaults::BARRIER_ON_STOP,
        }
    }

    /// Options for `rank` as described by `config`
    pub fn from_config(config: &ClusterConfig, rank: Rank) -> Result<Self> {
        Ok(Self {
            role: config.role_for(rank)?,
            staleness: config.staleness,
            recv_poll_interval: config.recv_poll_interval(),
            barrier_on_stop: config.barrier_on_stop,
        })
    }

    pub fn with_staleness(mut self, staleness: u64) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_barrier_on_stop(mut self, barrier_on_stop: bool) -> Self {
        self.barrier_on_stop = barrier_on_stop;
        self
    }

    pub fn with_recv_poll_interval(mut self, interval: Duration) -> Self {
        self.recv_poll_interval = interval;
        self
    }
}

/// Outcome of a clock call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockGrant {
    /// Tick this process reported as finished
    pub tick: u64,
    /// Slowest worker's clock when the grant was issued
    pub min_clock: u64,
}

impl ClockGrant {
    /// How far this worker is ahead of the slowest one
    pub fn lead(&self) -> u64 {
        self.tick.saturating_sub(self.min_clock)
    }
}

#[derive(Default)]
struct PendingCalls {
    waiting: HashMap<u64, Sender<Message>>,
    /// Set once the inbound path is gone
    closed: Option<String>,
}

/// Hands replies to the call waiting on their correlation id
#[derive(Default)]
struct ReplyRouter {
    calls: Mutex<PendingCalls>,
}

impl ReplyRouter {
    /// Wait slot for call `correlation`
    fn open(&self, correlation: u64) -> Result<Receiver<Message>> {
        let mut calls = self.calls.lock();
        if let Some(reason) = &calls.closed {
            return Err(ControlError::RepliesClosed {
                reason: reason.clone(),
            });
        }
        let (reply_tx, reply_rx) = bounded(1);
        calls.waiting.insert(correlation, reply_tx);
        Ok(reply_rx)
    }

    fn cancel(&self, correlation: u64) {
        self.calls.lock().waiting.remove(&correlation);
    }

    fn closed_reason(&self) -> Option<String> {
        self.calls.lock().closed.clone()
    }

    fn route(&self, msg: Message) -> Result<()> {
        let waiting = self.calls.lock().waiting.remove(&msg.correlation());
        match waiting {
            Some(reply_tx) => {
                // A dropped receiver means the caller is gone, nothing to do
                let _ = reply_tx.send(msg);
                Ok(())
            }
            None => Err(ControlError::UnmatchedReply {
                msg_type: msg.msg_type(),
                src: msg.src(),
                correlation: msg.correlation(),
            }),
        }
    }
}

impl Accept for ReplyRouter {
    fn accept(&self, msg: Message) -> actors::Result<()> {
        if let Err(e) = self.route(msg) {
            warn!(error = %e, "Dropping reply");
        }
        Ok(())
    }

    /// Fail every waiting call and refuse new ones
    fn close(&self, reason: &str) {
        let mut calls = self.calls.lock();
        if calls.closed.is_none() {
            calls.closed = Some(reason.to_string());
        }
        let abandoned = calls.waiting.len();
        // Dropping the senders wakes every waiter
        calls.waiting.clear();
        if abandoned > 0 {
            warn!(abandoned, reason, "Reply path closed with calls in flight");
        }
    }
}

/// A sent request waiting for its reply
struct PendingCall {
    msg_type: MsgType,
    expected: MsgType,
    correlation: u64,
    reply_rx: Receiver<Message>,
}

#[derive(Debug)]
struct Membership {
    table: NodeTable,
    num_workers: u32,
    num_servers: u32,
}

pub struct Zoo {
    session: Uuid,
    rank: Rank,
    size: usize,
    role: Role,
    options: ZooOptions,
    transport: Arc<dyn Transport>,
    membership: RwLock<Membership>,
    replies: Arc<ReplyRouter>,
    next_correlation: AtomicU64,
    /// Set by the first `register_node`
    joined: AtomicBool,
    /// Last tick this worker reported
    last_tick: Mutex<Option<u64>>,
    registry: ActorRegistry,
    /// In start order
    actors: Vec<ActorHandle>,
    hosts: TableHosts,
    stopped: bool,
}

impl Zoo {
    /// Bring this process into the cluster
    ///
    /// Returns once every rank has registered and the membership table is
    /// complete.
    pub fn start(
        options: ZooOptions,
        transport: Arc<dyn Transport>,
        tables: StartupTables,
    ) -> Result<Self> {
        let started_at = Instant::now();
        let rank = transport.rank();
        let role = Role::from_bits(options.role.bits())?;
        if role.is_controller() && rank != CONTROLLER_RANK {
            error!(rank, role = %role, "Controller role requested off rank 0");
            return Err(ControlError::invalid_role(
                rank,
                role,
                "only rank 0 hosts the controller",
            ));
        }

        transport.init()?;
        let size = transport.size();
        if size == 0 {
            return Err(ControlError::EmptyCluster);
        }

        let mut table = NodeTable::new(size);
        table.set(Node::new(rank, role))?;

        let mut zoo = Self {
            session: Uuid::new_v4(),
            rank,
            size,
            role,
            options,
            transport,
            membership: RwLock::new(Membership {
                table,
                num_workers: 0,
                num_servers: 0,
            }),
            replies: Arc::new(ReplyRouter::default()),
            next_correlation: AtomicU64::new(1),
            joined: AtomicBool::new(false),
            last_tick: Mutex::new(None),
            registry: ActorRegistry::new(),
            actors: Vec::new(),
            hosts: TableHosts::default(),
            stopped: false,
        };
        info!(session = %zoo.session, rank, size, role = %role, "Starting zoo");

        let joined = zoo
            .start_actors(tables)
            .and_then(|()| zoo.register_node());
        if let Err(e) = joined {
            error!(session = %zoo.session, rank, error = %e, "Zoo failed to start");
            if let Err(teardown) = zoo.teardown() {
                warn!(rank, error = %teardown, "Teardown after failed start also failed");
            }
            return Err(e);
        }

        info!(
            session = %zoo.session,
            rank,
            size,
            num_workers = zoo.num_workers(),
            num_servers = zoo.num_servers(),
            hosts = %zoo.host_kind(),
            startup_ms = started_at.elapsed().as_millis() as u64,
            "Zoo ready"
        );
        Ok(zoo)
    }

    fn start_actors(&mut self, tables: StartupTables) -> Result<()> {
        let hosts_controller = self.rank == CONTROLLER_RANK;
        let replies: Arc<dyn Accept> = self.replies.clone();
        let routes = Arc::new(InboundRoutes::new(self.rank, hosts_controller, replies));

        let communicator = ActorHandle::spawn(Communicator::new(
            Arc::clone(&self.transport),
            Arc::clone(&routes),
            self.options.recv_poll_interval,
        ))?;
        let outbound: Arc<dyn Accept> = Arc::new(communicator.actor_ref());
        self.adopt(communicator)?;

        if hosts_controller {
            let controller = ActorHandle::spawn(Controller::new(
                self.rank,
                self.size,
                self.options.staleness,
                outbound,
            ))?;
            routes.attach_controller(Arc::new(controller.actor_ref()))?;
            self.adopt(controller)?;
        }

        if self.role.is_worker() {
            let host = WorkerHost::worker(self.rank);
            self.hosts.worker = Some(host.store());
            self.adopt(ActorHandle::spawn(host)?)?;
        }
        if self.role.is_server() {
            let host = ServerHost::server(self.rank);
            self.hosts.server = Some(host.store());
            self.adopt(ActorHandle::spawn(host)?)?;
        }

        for table in tables.worker {
            self.register_worker_table(table)?;
        }
        for table in tables.server {
            self.register_server_table(table)?;
        }
        Ok(())
    }

    fn adopt(&mut self, handle: ActorHandle) -> Result<()> {
        self.registry.register(handle.actor_ref())?;
        self.actors.push(handle);
        Ok(())
    }

    /// Leave the cluster
    ///
    /// Every rank must call `stop`; with `barrier_on_stop` it returns only
    /// after all of them did.
    pub fn stop(mut self) -> Result<()> {
        let barrier = if self.options.barrier_on_stop {
            self.barrier()
        } else {
            Ok(())
        };
        let teardown = self.teardown();
        info!(session = %self.session, rank = self.rank, "Zoo stopped");
        barrier.and(teardown)
    }

    /// Stop actors in reverse start order, then finalize the transport
    fn teardown(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        let mut first_error: Option<ControlError> = None;
        while let Some(mut handle) = self.actors.pop() {
            if let Err(e) = handle.stop() {
                error!(rank = self.rank, actor = %handle.name(), error = %e, "Actor stopped with error");
                first_error.get_or_insert(e.into());
            }
        }
        if let Err(e) = self.transport.finalize() {
            first_error.get_or_insert(e.into());
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    pub fn size(&self) -> usize {
        self.transport.size()
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn host_kind(&self) -> HostKind {
        self.hosts.kind()
    }

    /// Snapshot of the membership table
    pub fn nodes(&self) -> NodeTable {
        self.membership.read().table.clone()
    }

    pub fn num_workers(&self) -> u32 {
        self.membership.read().num_workers
    }

    pub fn num_servers(&self) -> u32 {
        self.membership.read().num_servers
    }

    /// Names of the actors this process runs
    pub fn actor_names(&self) -> Vec<String> {
        self.registry.names().into_iter().map(str::to_string).collect()
    }

    /// Route a message to a named local actor
    pub fn deliver(&self, name: &str, msg: Message) -> Result<()> {
        Ok(self.registry.deliver(name, msg)?)
    }

    /// Hand a reply to the call waiting for it
    pub fn accept(&self, msg: Message) -> Result<()> {
        self.replies.route(msg)
    }

    /// Send `request` to the controller and block for its reply
    fn call(&self, request: Message) -> Result<Message> {
        let pending = self.send_request(request)?;
        self.wait(pending)
    }

    /// Stamp a fresh correlation id on `request` and hand it to the communicator
    fn send_request(&self, mut request: Message) -> Result<PendingCall> {
        let msg_type = request.msg_type();
        let expected = msg_type
            .reply_type()
            .ok_or(ProtocolError::NotARequest { msg_type })?;
        let correlation = self.next_correlation.fetch_add(1, Ordering::Relaxed);
        request.set_correlation(correlation);
        let reply_rx = self.replies.open(correlation)?;

        debug!(rank = self.rank, msg_type = %msg_type, correlation, "Sending control request");
        if let Err(e) = self.registry.deliver(names::COMMUNICATOR, request) {
            self.replies.cancel(correlation);
            return Err(e.into());
        }
        Ok(PendingCall {
            msg_type,
            expected,
            correlation,
            reply_rx,
        })
    }

    fn wait(&self, pending: PendingCall) -> Result<Message> {
        let PendingCall {
            msg_type,
            expected,
            correlation,
            reply_rx,
        } = pending;

        let reply = reply_rx.recv().map_err(|_| match self.replies.closed_reason() {
            Some(reason) => ControlError::RepliesClosed { reason },
            None => ControlError::ReplyDropped {
                msg_type,
                correlation,
            },
        })?;

        if reply.msg_type() == MsgType::ControlAbort {
            let AbortNotice { reason } = AbortNotice::decode(&reply)?;
            error!(
                rank = self.rank,
                msg_type = %msg_type,
                correlation,
                reason = %reason,
                "Control call aborted"
            );
            return Err(ControlError::ControllerAborted {
                msg_type,
                correlation,
                reason,
            });
        }
        if reply.msg_type() != expected {
            error!(
                rank = self.rank,
                correlation,
                expected = %expected,
                got = %reply.msg_type(),
                "Reply of the wrong type"
            );
            return Err(ProtocolError::unexpected_type(expected, reply.msg_type()).into());
        }
        Ok(reply)
    }

    /// Join the cluster and adopt the controller's membership table
    ///
    /// A process joins once; a second call fails here without reaching the
    /// controller.
    pub fn register_node(&self) -> Result<()> {
        if self.joined.swap(true, Ordering::AcqRel) {
            warn!(rank = self.rank, "Node already registered");
            return Err(ControlError::RegistrationClosed { rank: self.rank });
        }
        let node = Node::new(self.rank, self.role);
        let reply = self.call(RegisterRequest::new(node).into_message(CONTROLLER_RANK))?;
        self.apply_register_reply(&reply)
    }

    /// Decode a register reply and overwrite the local table with it
    ///
    /// Applying the same reply again leaves the same state.
    pub fn apply_register_reply(&self, msg: &Message) -> Result<()> {
        let reply = RegisterReply::decode(msg, self.size)?;
        let mut membership = self.membership.write();
        membership.table.overwrite_from(&reply.table)?;
        membership.num_workers = reply.num_workers;
        membership.num_servers = reply.num_servers;
        debug!(
            rank = self.rank,
            num_workers = reply.num_workers,
            num_servers = reply.num_servers,
            "Membership table updated"
        );
        Ok(())
    }

    /// Block until every rank reached the same barrier
    pub fn barrier(&self) -> Result<()> {
        let reply = self.call(Message::new(self.rank, CONTROLLER_RANK, MsgType::ControlBarrier))?;
        reply.expect_empty()?;
        Ok(())
    }

    /// Report tick `tick` as finished and wait until the staleness bound
    /// allows this worker to go on
    ///
    /// Ticks must strictly increase; a stale tick is rejected here so it
    /// never reaches the controller.
    pub fn clock(&self, tick: u64) -> Result<ClockGrant> {
        if !self.role.is_worker() {
            return Err(ControlError::NotAWorker { rank: self.rank });
        }
        let pending = {
            let mut last_tick = self.last_tick.lock();
            if let Some(previous) = *last_tick {
                if tick <= previous {
                    warn!(rank = self.rank, previous, tick, "Clock tick does not advance");
                    return Err(ControlError::ClockRegression {
                        rank: self.rank,
                        previous,
                        got: tick,
                    });
                }
            }
            // Sent under the lock so ticks leave in the order they were checked
            let pending =
                self.send_request(ClockRequest::new(self.rank, tick).into_message(CONTROLLER_RANK))?;
            *last_tick = Some(tick);
            pending
        };
        let reply = self.wait(pending)?;
        let ClockReply { min_clock } = ClockReply::decode(&reply)?;
        Ok(ClockGrant { tick, min_clock })
    }

    pub fn register_worker_table(&self, table: Box<dyn WorkerTable>) -> Result<TableHandle> {
        self.hosts.register_worker_table(table)
    }

    pub fn register_server_table(&self, table: Box<dyn ServerTable>) -> Result<TableHandle> {
        self.hosts.register_server_table(table)
    }
}

impl Drop for Zoo {
    fn drop(&mut self) {
        if !self.stopped {
            warn!(rank = self.rank, "Zoo dropped without stop");
            if let Err(e) = self.teardown() {
                error!(rank = self.rank, error = %e, "Teardown failed");
            }
        }
    }
}
