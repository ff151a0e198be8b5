//! Table Hosts
//!
//! Data-plane actors that own worker-side and server-side tables. The
//! coordinator never looks at a host's concrete type: it holds each host's
//! [`TableHost`] capability in [`TableHosts`] and asks it to register tables,
//! getting an integer [`TableHandle`] back.
//!
//! ```text
//!  Zoo ── TableHosts { worker: Option<TableStore>, server: Option<TableStore> }
//!            │ register_table (direct call, no message)
//!            ▼
//!     Arc<TableStore> ◀── shared ──  HostActor "worker" / "server"
//! ```
//!
//! Registration is a direct capability call on the shared [`TableStore`]; it
//! is never a message to the host actor and works the same whether or not
//! the actor is running. The [`HostActor`] gives the host its place in the
//! process: a registry name, a thread started after the controller and
//! stopped before it, and the shutdown record of what it held. No control
//! message is ever addressed to a host, so its handler table is empty.

use crate::{ControlError, Result};
use actors::{names, Actor, HandlerTable};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use types::{Rank, Role};

/// Index of a table within its host, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableHandle(u32);

impl TableHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// Anything a host can keep
pub trait Table: Send + Sync {
    fn name(&self) -> &str;
}

/// Worker-side view of a distributed table
pub trait WorkerTable: Table {}

/// Server-side shard of a distributed table
pub trait ServerTable: Table {}

/// Capability to register tables with a host
pub trait TableHost: Send + Sync {
    type Table: ?Sized;

    fn register_table(&self, table: Box<Self::Table>) -> TableHandle;

    fn num_tables(&self) -> usize;
}

/// Which table hosts a process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    None,
    Worker,
    Server,
    Both,
}

impl HostKind {
    pub fn from_role(role: Role) -> Self {
        match (role.is_worker(), role.is_server()) {
            (true, true) => HostKind::Both,
            (true, false) => HostKind::Worker,
            (false, true) => HostKind::Server,
            (false, false) => HostKind::None,
        }
    }

    pub fn has_worker(self) -> bool {
        matches!(self, HostKind::Worker | HostKind::Both)
    }

    pub fn has_server(self) -> bool {
        matches!(self, HostKind::Server | HostKind::Both)
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostKind::None => "none",
            HostKind::Worker => "worker",
            HostKind::Server => "server",
            HostKind::Both => "worker+server",
        };
        f.write_str(name)
    }
}

/// Tables owned by one host, shared between the host actor and the Zoo
pub struct TableStore<T: ?Sized> {
    kind: &'static str,
    rank: Rank,
    tables: Mutex<Vec<Box<T>>>,
}

impl<T: ?Sized + Table> TableStore<T> {
    pub fn new(kind: &'static str, rank: Rank) -> Self {
        Self {
            kind,
            rank,
            tables: Mutex::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .lock()
            .iter()
            .map(|table| table.name().to_string())
            .collect()
    }
}

impl<T: ?Sized + Table> TableHost for TableStore<T> {
    type Table = T;

    fn register_table(&self, table: Box<T>) -> TableHandle {
        let mut tables = self.tables.lock();
        let handle = TableHandle(tables.len() as u32);
        debug!(
            rank = self.rank,
            host = self.kind,
            table = table.name(),
            handle = handle.id(),
            "Registered table"
        );
        tables.push(table);
        handle
    }

    fn num_tables(&self) -> usize {
        self.tables.lock().len()
    }
}

impl<T: ?Sized> fmt::Debug for TableStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableStore")
            .field("kind", &self.kind)
            .field("rank", &self.rank)
            .field("tables", &self.tables.lock().len())
            .finish()
    }
}

/// Named lifetime of a host's tables
///
/// Any delivery to a host is a routing bug and ends its loop.
pub struct HostActor<T: ?Sized> {
    name: &'static str,
    store: Arc<TableStore<T>>,
}

pub type WorkerHost = HostActor<dyn WorkerTable>;
pub type ServerHost = HostActor<dyn ServerTable>;

impl HostActor<dyn WorkerTable> {
    pub fn worker(rank: Rank) -> Self {
        Self {
            name: names::WORKER,
            store: Arc::new(TableStore::new("worker", rank)),
        }
    }
}

impl HostActor<dyn ServerTable> {
    pub fn server(rank: Rank) -> Self {
        Self {
            name: names::SERVER,
            store: Arc::new(TableStore::new("server", rank)),
        }
    }
}

impl<T: ?Sized + Table + 'static> HostActor<T> {
    pub fn store(&self) -> Arc<TableStore<T>> {
        Arc::clone(&self.store)
    }
}

impl<T: ?Sized + Table + 'static> Actor for HostActor<T> {
    type Error = Infallible;

    fn name(&self) -> &str {
        self.name
    }

    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
    }

    fn on_stop(&mut self) -> std::result::Result<(), Infallible> {
        info!(
            rank = self.store.rank,
            host = self.name,
            tables = self.store.num_tables(),
            "Table host stopped"
        );
        Ok(())
    }
}

/// The table-host capabilities of one process
#[derive(Debug, Default, Clone)]
pub struct TableHosts {
    pub worker: Option<Arc<TableStore<dyn WorkerTable>>>,
    pub server: Option<Arc<TableStore<dyn ServerTable>>>,
}

impl TableHosts {
    pub fn kind(&self) -> HostKind {
        match (self.worker.is_some(), self.server.is_some()) {
            (true, true) => HostKind::Both,
            (true, false) => HostKind::Worker,
            (false, true) => HostKind::Server,
            (false, false) => HostKind::None,
        }
    }

    pub fn register_worker_table(&self, table: Box<dyn WorkerTable>) -> Result<TableHandle> {
        let host = self
            .worker
            .as_ref()
            .ok_or(ControlError::MissingHost { kind: "worker" })?;
        Ok(host.register_table(table))
    }

    pub fn register_server_table(&self, table: Box<dyn ServerTable>) -> Result<TableHandle> {
        let host = self
            .server
            .as_ref()
            .ok_or(ControlError::MissingHost { kind: "server" })?;
        Ok(host.register_table(table))
    }
}

/// Tables to register while the process starts
#[derive(Default)]
pub struct StartupTables {
    pub worker: Vec<Box<dyn WorkerTable>>,
    pub server: Vec<Box<dyn ServerTable>>,
}

impl StartupTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker(mut self, table: impl WorkerTable + 'static) -> Self {
        self.worker.push(Box::new(table));
        self
    }

    pub fn with_server(mut self, table: impl ServerTable + 'static) -> Self {
        self.server.push(Box::new(table));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.worker.is_empty() && self.server.is_empty()
    }
}

impl fmt::Debug for StartupTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupTables")
            .field("worker", &self.worker.len())
            .field("server", &self.server.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Table for Named {
        fn name(&self) -> &str {
            self.0
        }
    }
    impl WorkerTable for Named {}
    impl ServerTable for Named {}

    #[test]
    fn test_host_kind_from_role() {
        assert_eq!(HostKind::from_role(Role::NONE), HostKind::None);
        assert_eq!(HostKind::from_role(Role::WORKER), HostKind::Worker);
        assert_eq!(HostKind::from_role(Role::SERVER | Role::CONTROLLER), HostKind::Server);
        assert_eq!(HostKind::from_role(Role::WORKER | Role::SERVER), HostKind::Both);
        assert!(HostKind::Both.has_worker() && HostKind::Both.has_server());
    }

    #[test]
    fn test_handles_follow_registration_order() {
        let host = WorkerHost::worker(1);
        let store = host.store();
        assert_eq!(store.register_table(Box::new(Named("w0"))), TableHandle(0));
        assert_eq!(store.register_table(Box::new(Named("w1"))), TableHandle(1));
        assert_eq!(store.num_tables(), 2);
        assert_eq!(store.table_names(), vec!["w0", "w1"]);
    }

    #[test]
    fn test_missing_host() {
        let hosts = TableHosts {
            worker: None,
            server: Some(ServerHost::server(0).store()),
        };
        assert_eq!(hosts.kind(), HostKind::Server);
        assert!(matches!(
            hosts.register_worker_table(Box::new(Named("w"))),
            Err(ControlError::MissingHost { kind: "worker" })
        ));
        assert_eq!(
            hosts.register_server_table(Box::new(Named("s"))).unwrap().id(),
            0
        );
    }

    #[test]
    fn test_registration_bypasses_the_host_mailbox() {
        let host = ServerHost::server(2);
        let store = host.store();
        let mut handle = actors::ActorHandle::spawn(host).unwrap();

        assert_eq!(store.register_table(Box::new(Named("s0"))).id(), 0);
        assert_eq!(handle.processed(), 0);
        handle.stop().unwrap();

        // The store outlives the actor
        assert_eq!(store.register_table(Box::new(Named("s1"))).id(), 1);
    }

    #[test]
    fn test_message_to_host_is_fatal() {
        let mut handle = actors::ActorHandle::spawn(WorkerHost::worker(0)).unwrap();
        handle
            .accept(codec::Message::new(0, 0, types::MsgType::ControlBarrier))
            .unwrap();
        assert!(matches!(
            handle.stop(),
            Err(actors::ActorError::UnhandledMessage { .. })
        ));
    }
}
