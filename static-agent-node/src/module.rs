//! Grouping handlers under a protocol.
//!
//! A module collects the handlers for one protocol identifier so they can be
//! registered and removed as a unit on a connection.

use std::future::Future;

use static_agent_core::{Message, MsgType, ProtocolIdentifier};

use crate::connection::Connection;
use crate::dispatcher::Handler;

/// A set of handlers for one protocol.
#[derive(Debug)]
pub struct ModuleRouter {
    protocol: ProtocolIdentifier,
    handlers: Vec<Handler>,
}

impl ModuleRouter {
    /// Start an empty module for `protocol`.
    #[must_use]
    pub fn new(protocol: ProtocolIdentifier) -> Self {
        Self {
            protocol,
            handlers: Vec::new(),
        }
    }

    /// The protocol this module serves.
    #[must_use]
    pub fn protocol(&self) -> &ProtocolIdentifier {
        &self.protocol
    }

    /// Add a handler for the message `name` under this module's protocol.
    #[must_use]
    pub fn route<F, Fut>(self, name: &str, func: F) -> Self
    where
        F: Fn(Connection, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let msg_type = self.protocol.msg_type(name);
        self.route_type(msg_type, func)
    }

    /// Add a handler for an explicit type, e.g. a different minor version
    /// than the module's own.
    #[must_use]
    pub fn route_type<F, Fut>(mut self, msg_type: MsgType, func: F) -> Self
    where
        F: Fn(Connection, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.handlers.push(Handler::new(msg_type, func));
        self
    }

    /// The handlers collected so far.
    #[must_use]
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn routes_build_types_from_protocol() {
        let module = ModuleRouter::new("doc/proto/1.0".parse().unwrap())
            .route("first", |_conn, _msg| async { Ok(()) })
            .route("second", |_conn, _msg| async { Ok(()) })
            .route_type("doc/proto/1.1/second".parse().unwrap(), |_conn, _msg| {
                async { Ok(()) }
            });

        let types: Vec<String> = module
            .handlers()
            .iter()
            .map(|h| h.msg_type().to_string())
            .collect();
        assert_eq!(
            types,
            vec![
                "doc/proto/1.0/first",
                "doc/proto/1.0/second",
                "doc/proto/1.1/second",
            ]
        );
    }
}
