//! Actor Registry
//!
//! Name → actor routing for locally addressed deliveries. The registry is
//! filled while the process starts its actors and only read afterwards; it
//! is owned by whoever starts the actors, never a global.

use crate::{Accept, ActorError, ActorRef, Result};
use codec::Message;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct ActorRegistry {
    actors: BTreeMap<String, ActorRef>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor under its own name
    pub fn register(&mut self, actor: ActorRef) -> Result<()> {
        let name = actor.name().to_string();
        if self.actors.contains_key(&name) {
            return Err(ActorError::DuplicateActor { name });
        }
        debug!(actor = %name, "Registering local actor");
        self.actors.insert(name, actor);
        Ok(())
    }

    /// Route a message to the named actor
    pub fn deliver(&self, name: &str, msg: Message) -> Result<()> {
        self.get(name)
            .ok_or_else(|| ActorError::UnknownActor {
                name: name.to_string(),
            })?
            .accept(msg)
    }

    pub fn get(&self, name: &str) -> Option<&ActorRef> {
        self.actors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.actors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Actor, ActorHandle, HandlerTable};
    use std::convert::Infallible;
    use types::MsgType;

    struct Sink(&'static str);

    impl Actor for Sink {
        type Error = Infallible;

        fn name(&self) -> &str {
            self.0
        }

        fn handlers(&self) -> HandlerTable<Self> {
            HandlerTable::new().on(MsgType::ControlBarrier, |_, _| Ok(()))
        }
    }

    #[test]
    fn test_registry_routes_by_name() {
        let mut handle = ActorHandle::spawn(Sink("sink")).unwrap();
        let mut registry = ActorRegistry::new();
        registry.register(handle.actor_ref()).unwrap();

        assert!(registry.contains("sink"));
        assert_eq!(registry.names(), vec!["sink"]);
        registry
            .deliver("sink", Message::new(0, 0, MsgType::ControlBarrier))
            .unwrap();

        handle.stop().unwrap();
        assert_eq!(handle.processed(), 1);
    }

    #[test]
    fn test_unknown_destination() {
        let registry = ActorRegistry::new();
        let err = registry
            .deliver("worker", Message::new(0, 0, MsgType::ControlBarrier))
            .unwrap_err();
        assert!(matches!(err, ActorError::UnknownActor { name } if name == "worker"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut first = ActorHandle::spawn(Sink("dup")).unwrap();
        let mut second = ActorHandle::spawn(Sink("dup")).unwrap();
        let mut registry = ActorRegistry::new();
        registry.register(first.actor_ref()).unwrap();

        let err = registry.register(second.actor_ref()).unwrap_err();
        assert!(matches!(err, ActorError::DuplicateActor { .. }));

        first.stop().unwrap();
        second.stop().unwrap();
    }
}
