//! The agent message model.
//!
//! A message is a JSON object with two reserved keys, `@type` and `@id`, and
//! an arbitrary remainder. `@type` must parse as a [`MsgType`]; `@id` is
//! generated when absent.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::keys::VerKey;
use crate::trust::TrustContext;
use crate::types::MsgType;

/// Message type of a routing-forward request.
pub const FORWARD: &str = "https://didcomm.org/routing/1.0/forward";

/// Return-route request carried in the `~transport` decorator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnRoute {
    /// Return all messages over the delivering channel.
    All,
    /// Return only messages in the given thread.
    Thread(String),
    /// Do not return messages.
    None,
}

impl ReturnRoute {
    fn as_value(&self) -> Value {
        match self {
            ReturnRoute::All => json!({ "return_route": "all" }),
            ReturnRoute::Thread(thid) => json!({
                "return_route": "thread",
                "return_route_thread": thid,
            }),
            ReturnRoute::None => json!({ "return_route": "none" }),
        }
    }
}

fn random_id() -> String {
    Uuid::new_v4().to_string()
}

/// An agent-to-agent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The message type.
    #[serde(rename = "@type")]
    pub msg_type: MsgType,
    /// Unique opaque message identifier.
    #[serde(rename = "@id", default = "random_id")]
    pub id: String,
    /// All remaining fields of the message.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip)]
    pub(crate) trust: TrustContext,
}

impl Message {
    /// Create an empty message of the given type with a random id.
    #[must_use]
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            msg_type,
            id: random_id(),
            fields: Map::new(),
            trust: TrustContext::default(),
        }
    }

    /// Build a message from a JSON object. Fails when `@type` is missing or
    /// does not parse, or when the value is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::MalformedMessage(e.to_string()))
    }

    /// Deserialize a message from JSON bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::MalformedMessage(e.to_string()))
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// A routing-forward request asking a mediator to relay `msg` to `to`.
    #[must_use]
    pub fn forward(to: &VerKey, msg: Value) -> Self {
        let forward_type = MsgType::from_parts(
            "https://didcomm.org/",
            "routing",
            crate::types::MsgVersion::new(1, 0),
            "forward",
        );
        let mut message = Self::new(forward_type);
        message.fields.insert("to".to_string(), json!(to.to_b58()));
        message.fields.insert("msg".to_string(), msg);
        message
    }

    /// Access a non-reserved field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Thread id from the `~thread` decorator, if any.
    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        self.fields.get("~thread")?.get("thid")?.as_str()
    }

    /// Return-route request from the `~transport` decorator, if any.
    #[must_use]
    pub fn return_route(&self) -> Option<&str> {
        self.fields.get("~transport")?.get("return_route")?.as_str()
    }

    /// Copy of this message with a `~transport` return-route decorator.
    #[must_use]
    pub fn with_transport(mut self, return_route: &ReturnRoute) -> Self {
        self.fields
            .insert("~transport".to_string(), return_route.as_value());
        self
    }

    /// Copy of this message threaded under `thid`.
    #[must_use]
    pub fn with_thread(mut self, thid: &str) -> Self {
        self.fields
            .insert("~thread".to_string(), json!({ "thid": thid }));
        self
    }

    /// The trust context this message was received under.
    #[must_use]
    pub fn trust(&self) -> &TrustContext {
        &self.trust
    }

    /// Mutable trust context, e.g. to affirm nonrepudiation after verifying
    /// a signed field.
    pub fn trust_mut(&mut self) -> &mut TrustContext {
        &mut self.trust
    }
}
