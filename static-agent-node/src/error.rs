//! Error types for connection and dispatch operations.

use static_agent_core::MsgType;
use thiserror::Error;

/// Errors raised by connections, dispatchers and transports.
#[derive(Debug, Error)]
pub enum Error {
    /// An envelope or message-model error from the core crate.
    #[error(transparent)]
    Core(#[from] static_agent_core::Error),

    /// A handler is already registered for this exact type.
    #[error("a handler is already registered for {0}")]
    DuplicateHandler(MsgType),

    /// No registered handler is compatible with the message type.
    #[error("no handler registered for {0}")]
    NoRegisteredHandler(MsgType),

    /// A handler ran and returned an error.
    #[error("handler for {msg_type} failed: {source}")]
    HandlerExecution {
        /// The type the failing handler was selected for.
        msg_type: MsgType,
        /// The handler's error.
        #[source]
        source: anyhow::Error,
    },

    /// A target was built with no recipient keys.
    #[error("target has no recipients")]
    NoRecipients,

    /// A target was built with both a single verkey and a recipient list.
    #[error("their_vk and recipients are mutually exclusive")]
    MutuallyExclusive,

    /// The message could not be delivered.
    #[error("message could not be delivered: {0}")]
    Delivery(String),

    /// The transport returned response bytes when none were requested.
    #[error("unexpected response over transport: {0}")]
    UnexpectedResponse(String),

    /// No matching reply arrived in time.
    #[error("timed out awaiting a reply")]
    Timeout,

    /// An HTTP transport failure.
    #[error("http transport error")]
    Http(#[from] reqwest::Error),
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
