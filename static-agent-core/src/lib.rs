//! Protocol engine for a DIDComm v1 static agent.
//!
//! This crate holds the pure, transport-free parts of the protocol: the
//! message model, type-URI parsing and matching, key pairs, envelope
//! packing/unpacking (including nested forward envelopes for mediated
//! routing), trust contexts and detached field signing.
//!
//! # Architecture
//!
//! The crate is organized into these main modules:
//! - `types`: message type and protocol identifier parsing
//! - `message`: the JSON message model with reserved `@type`/`@id` keys
//! - `keys`: ed25519 key pairs and verkeys, with x25519 conversion
//! - `envelope`: authenticated/anonymous envelope encryption and forwarding
//! - `trust`: the trust context attached to unpacked messages
//! - `sign`: detached signing of message fields
//! - `error`: error types and handling
//!
//! # Examples
//!
//! ```rust
//! use static_agent_core::{pack_message, unpack_message, KeyPair, Message};
//! use serde_json::json;
//!
//! # fn main() -> static_agent_core::Result<()> {
//! let alice = KeyPair::generate();
//! let bob = KeyPair::generate();
//!
//! let msg = Message::from_value(json!({
//!     "@type": "https://example.com/protocol/1.0/test",
//!     "content": "hello",
//! }))?;
//!
//! let packed = pack_message(&msg, &[*bob.verkey()], &[], Some(&alice))?;
//! let unpacked = unpack_message(&packed, &bob)?;
//! assert!(unpacked.trust().is_authcrypted());
//! # Ok(())
//! # }
//! ```
//!
//! # Security Considerations
//!
//! - Content keys are fresh per pack and zeroized after use
//! - Envelopes are never partially accepted: any authentication failure
//!   rejects the whole message
//! - Plaintext input is accepted but explicitly marked in the trust context

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod envelope;
pub mod error;
pub mod keys;
pub mod message;
pub mod sign;
pub mod trust;
pub mod types;

#[cfg(test)]
mod tests;

pub use envelope::{open_envelope, pack_message, seal_envelope, unpack_message, Envelope};
pub use error::{Error, Result};
pub use keys::{KeyPair, VerKey};
pub use message::{Message, ReturnRoute, FORWARD};
pub use sign::{sign_field, verify_signed_field, SIGNATURE_TYPE};
pub use trust::{Encryption, TrustContext};
pub use types::{MsgType, MsgVersion, ProtocolIdentifier};
