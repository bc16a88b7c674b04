//! Message routing by type.
//!
//! Handlers are registered against a concrete [`MsgType`]. An incoming type
//! is matched against registered types with minor-version tolerance: a
//! handler registered for `1.0` also serves `1.3`, and when several
//! compatible handlers exist the one with the highest registered minor wins.
//! Major versions never cross-match.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use static_agent_core::{Message, MsgType, MsgVersion};
use tracing::debug;

use crate::connection::Connection;
use crate::error::{Error, Result};

type HandlerFn = Arc<dyn Fn(Connection, Message) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A registered message handler: a type and the function serving it.
#[derive(Clone)]
pub struct Handler {
    msg_type: MsgType,
    func: HandlerFn,
}

impl Handler {
    /// Wrap an async function as a handler for `msg_type`.
    pub fn new<F, Fut>(msg_type: MsgType, func: F) -> Self
    where
        F: Fn(Connection, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            msg_type,
            func: Arc::new(move |conn, msg| -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(func(conn, msg))
            }),
        }
    }

    /// The type this handler was registered for.
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    pub(crate) async fn call(&self, connection: Connection, message: Message) -> Result<()> {
        let msg_type = message.msg_type.clone();
        (self.func)(connection, message)
            .await
            .map_err(|source| Error::HandlerExecution { msg_type, source })
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("msg_type", &self.msg_type)
            .finish_non_exhaustive()
    }
}

/// Key identifying a protocol message independent of version.
type VersionlessKey = (String, String, String);

fn versionless(msg_type: &MsgType) -> VersionlessKey {
    (
        msg_type.doc_uri.clone(),
        msg_type.protocol.clone(),
        msg_type.name.clone(),
    )
}

/// Routes messages to handlers by type.
#[derive(Debug, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
    versions: HashMap<VersionlessKey, BTreeSet<MsgVersion>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Fails when one is already registered for the
    /// exact same type.
    pub fn register(&mut self, handler: Handler) -> Result<()> {
        let key = handler.msg_type.to_string();
        if self.handlers.contains_key(&key) {
            return Err(Error::DuplicateHandler(handler.msg_type.clone()));
        }
        debug!(msg_type = %key, "registering handler");
        self.versions
            .entry(versionless(&handler.msg_type))
            .or_default()
            .insert(handler.msg_type.version);
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Remove the handler registered for exactly `msg_type`. Removing an
    /// unregistered type is a no-op.
    pub fn remove(&mut self, msg_type: &MsgType) {
        if self.handlers.remove(&msg_type.to_string()).is_some() {
            let key = versionless(msg_type);
            if let Some(versions) = self.versions.get_mut(&key) {
                versions.remove(&msg_type.version);
                if versions.is_empty() {
                    self.versions.remove(&key);
                }
            }
        }
    }

    /// Whether a handler is registered for exactly `msg_type`.
    #[must_use]
    pub fn contains(&self, msg_type: &MsgType) -> bool {
        self.handlers.contains_key(&msg_type.to_string())
    }

    /// Remove every registered handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
        self.versions.clear();
    }

    /// Find the best handler for a concrete incoming type: among registered
    /// versions with the same major and a minor no greater than the incoming
    /// one, the highest minor wins.
    #[must_use]
    pub fn select(&self, msg_type: &MsgType) -> Option<&Handler> {
        let versions = self.versions.get(&versionless(msg_type))?;
        let best = versions
            .iter()
            .rev()
            .find(|v| v.major == msg_type.version.major && v.minor <= msg_type.version.minor)?;
        let registered =
            MsgType::from_parts(&msg_type.doc_uri, &msg_type.protocol, *best, &msg_type.name);
        self.handlers.get(&registered.to_string())
    }

    /// Dispatch a message to its handler over `connection`.
    pub async fn dispatch(&self, connection: Connection, message: Message) -> Result<()> {
        let handler = self
            .select(&message.msg_type)
            .ok_or_else(|| Error::NoRegisteredHandler(message.msg_type.clone()))?
            .clone();
        debug!(msg_type = %message.msg_type, handler = %handler.msg_type, "dispatching");
        handler.call(connection, message).await
    }
}
