//! Actor runtime errors

use thiserror::Error;
use types::MsgType;

#[derive(Error, Debug)]
pub enum ActorError {
    /// Message type missing from the actor's handler table
    #[error("Actor '{actor}' has no handler for {msg_type}")]
    UnhandledMessage { actor: String, msg_type: MsgType },

    /// Handler returned an error; the actor loop stopped
    #[error("Actor '{actor}' failed handling {msg_type}: {source}")]
    Handler {
        actor: String,
        msg_type: MsgType,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Lifecycle hook failed
    #[error("Actor '{actor}' failed during {phase}: {source}")]
    Lifecycle {
        actor: String,
        phase: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Delivery to an actor whose loop has exited
    #[error("Mailbox of actor '{actor}' is closed")]
    MailboxClosed { actor: String },

    /// Delivery to a name nobody registered
    #[error("No local actor named '{name}'")]
    UnknownActor { name: String },

    /// Second actor registered under an existing name
    #[error("Actor name '{name}' is already registered")]
    DuplicateActor { name: String },

    /// OS refused to create the actor thread
    #[error("Failed to spawn thread for actor '{actor}': {source}")]
    Spawn {
        actor: String,
        source: std::io::Error,
    },

    /// Actor thread panicked
    #[error("Actor '{actor}' panicked")]
    Panicked { actor: String },
}

impl ActorError {
    /// Create a handler error
    pub fn handler(
        actor: impl Into<String>,
        msg_type: MsgType,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Handler {
            actor: actor.into(),
            msg_type,
            source: Box::new(source),
        }
    }

    /// Create a lifecycle error
    pub fn lifecycle(
        actor: impl Into<String>,
        phase: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Lifecycle {
            actor: actor.into(),
            phase,
            source: Box::new(source),
        }
    }

    /// Create a mailbox closed error
    pub fn mailbox_closed(actor: impl Into<String>) -> Self {
        Self::MailboxClosed {
            actor: actor.into(),
        }
    }
}
