//! Static agent connections: dispatch, transport and reply awaiting.
//!
//! This crate pairs the envelope layer from `static-agent-core` with the
//! runtime side of a static agent: a [`Connection`] holding fixed keys and a
//! fixed counterparty [`Target`], a [`Dispatcher`] routing inbound messages
//! to async handlers with minor-version tolerance, and a [`Transport`] for
//! delivery (HTTP out of the box).
//!
//! ```no_run
//! use static_agent_core::{KeyPair, Message};
//! use static_agent_node::{Connection, Target};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let keys = KeyPair::generate();
//! let their_vk = *KeyPair::generate().verkey();
//! let target = Target::new(their_vk).with_endpoint("http://example.com/msg");
//! let conn = Connection::new(keys, Some(target));
//!
//! conn.route("doc/basicmessage/1.0/message".parse()?, |_conn, msg| async move {
//!     println!("got: {:?}", msg.get("content"));
//!     Ok(())
//! })
//! .await?;
//!
//! let ping = Message::new("doc/trustping/1.0/ping".parse()?);
//! conn.send(&ping).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod module;
pub mod transport;

pub use connection::{Connection, PackMode, Target};
pub use dispatcher::{Dispatcher, Handler};
pub use error::{Error, Result};
pub use module::ModuleRouter;
pub use transport::{HttpTransport, Transport, WIRE_CONTENT_TYPE};
