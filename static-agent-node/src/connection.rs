//! A fixed-key connection to one counterparty.
//!
//! A connection owns a key pair, an optional [`Target`] describing where and
//! to whom messages go, a dispatcher of registered handlers, and a transport.
//! Cloning a connection is cheap and shares all of that state, which is how
//! handlers get a handle back to the connection that invoked them.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use static_agent_core::{
    pack_message, unpack_message, KeyPair, Message, MsgType, ReturnRoute, VerKey,
};
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, warn};

use crate::dispatcher::{Dispatcher, Handler};
use crate::error::{Error, Result};
use crate::module::ModuleRouter;
use crate::transport::{HttpTransport, Transport};

/// Where outbound messages go: recipient keys, mediator routing keys and an
/// endpoint.
#[derive(Debug, Clone, Default)]
pub struct Target {
    recipients: Vec<VerKey>,
    routing_keys: Vec<VerKey>,
    endpoint: Option<String>,
}

impl Target {
    /// A target with a single recipient key and nothing else.
    #[must_use]
    pub fn new(their_vk: VerKey) -> Self {
        Self {
            recipients: vec![their_vk],
            routing_keys: Vec::new(),
            endpoint: None,
        }
    }

    /// Build a target from optional parts. Exactly one of `their_vk` and
    /// `recipients` must be given.
    pub fn from_parts(
        their_vk: Option<VerKey>,
        recipients: Option<Vec<VerKey>>,
        routing_keys: Vec<VerKey>,
        endpoint: Option<String>,
    ) -> Result<Self> {
        let recipients = match (their_vk, recipients) {
            (Some(_), Some(_)) => return Err(Error::MutuallyExclusive),
            (Some(vk), None) => vec![vk],
            (None, Some(keys)) => keys,
            (None, None) => return Err(Error::NoRecipients),
        };
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }
        Ok(Self {
            recipients,
            routing_keys,
            endpoint,
        })
    }

    /// Replace the routing keys, ordered innermost-first.
    #[must_use]
    pub fn with_routing_keys(mut self, routing_keys: Vec<VerKey>) -> Self {
        self.routing_keys = routing_keys;
        self
    }

    /// Set the delivery endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Recipient verkeys.
    #[must_use]
    pub fn recipients(&self) -> &[VerKey] {
        &self.recipients
    }

    /// Mediator routing keys, innermost-first.
    #[must_use]
    pub fn routing_keys(&self) -> &[VerKey] {
        &self.routing_keys
    }

    /// Delivery endpoint, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

/// How to encrypt an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackMode {
    /// Encrypt and reveal the sender to the recipients.
    Authcrypt,
    /// Encrypt without any sender identity.
    Anoncrypt,
    /// Do not encrypt. Handshake and administrative flows only.
    Plaintext,
}

struct PendingReply {
    token: u64,
    predicate: Box<dyn Fn(&Message) -> bool + Send + Sync>,
    tx: oneshot::Sender<Message>,
}

struct Inner {
    keys: KeyPair,
    target: RwLock<Option<Target>>,
    dispatcher: RwLock<Dispatcher>,
    pending: Mutex<Vec<PendingReply>>,
    next_token: AtomicU64,
    transport: Box<dyn Transport>,
}

/// A static connection: fixed keys, one counterparty.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Create a connection delivering over HTTP.
    #[must_use]
    pub fn new(keys: KeyPair, target: Option<Target>) -> Self {
        Self::with_transport(keys, target, Box::new(HttpTransport::new()))
    }

    /// Create a connection with a custom transport.
    #[must_use]
    pub fn with_transport(
        keys: KeyPair,
        target: Option<Target>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                keys,
                target: RwLock::new(target),
                dispatcher: RwLock::new(Dispatcher::new()),
                pending: Mutex::new(Vec::new()),
                next_token: AtomicU64::new(0),
                transport,
            }),
        }
    }

    /// This connection's verification key.
    #[must_use]
    pub fn verkey(&self) -> &VerKey {
        self.inner.keys.verkey()
    }

    /// This connection's verification key, base58 encoded.
    #[must_use]
    pub fn verkey_b58(&self) -> String {
        self.inner.keys.verkey_b58()
    }

    /// DID derived from this connection's verkey.
    #[must_use]
    pub fn did(&self) -> String {
        self.inner.keys.did()
    }

    /// Replace the target, e.g. after a handshake reveals the counterparty's
    /// real keys and endpoint.
    pub async fn update_target(&self, target: Option<Target>) {
        *self.inner.target.write().await = target;
    }

    /// Pack a message for the current target.
    pub async fn pack(&self, message: &Message, mode: PackMode) -> Result<Vec<u8>> {
        if mode == PackMode::Plaintext {
            return Ok(message.to_bytes()?);
        }
        let target = self.inner.target.read().await;
        let target = target.as_ref().ok_or(Error::NoRecipients)?;
        let sender = match mode {
            PackMode::Authcrypt => Some(&self.inner.keys),
            _ => None,
        };
        Ok(pack_message(
            message,
            target.recipients(),
            target.routing_keys(),
            sender,
        )?)
    }

    /// Unpack wire bytes with this connection's keys.
    pub fn unpack(&self, raw: &[u8]) -> Result<Message> {
        Ok(unpack_message(raw, &self.inner.keys)?)
    }

    /// Register a handler for `msg_type`.
    pub async fn route<F, Fut>(&self, msg_type: MsgType, func: F) -> Result<()>
    where
        F: Fn(Connection, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner
            .dispatcher
            .write()
            .await
            .register(Handler::new(msg_type, func))
    }

    /// Register every handler of a module, or none of them: any conflict
    /// with an existing registration (or within the module itself) rejects
    /// the module whole.
    pub async fn route_module(&self, module: &ModuleRouter) -> Result<()> {
        let mut dispatcher = self.inner.dispatcher.write().await;
        let mut claimed = HashSet::new();
        for handler in module.handlers() {
            if dispatcher.contains(handler.msg_type())
                || !claimed.insert(handler.msg_type().to_string())
            {
                return Err(Error::DuplicateHandler(handler.msg_type().clone()));
            }
        }
        for handler in module.handlers() {
            dispatcher.register(handler.clone())?;
        }
        Ok(())
    }

    /// Remove every handler of a module.
    pub async fn remove_module(&self, module: &ModuleRouter) {
        let mut dispatcher = self.inner.dispatcher.write().await;
        for handler in module.handlers() {
            dispatcher.remove(handler.msg_type());
        }
    }

    /// Remove all registered handlers.
    pub async fn clear_routes(&self) {
        self.inner.dispatcher.write().await.clear();
    }

    /// Unpack inbound wire bytes and dispatch the message.
    pub async fn handle(&self, raw: &[u8]) -> Result<()> {
        let message = self.unpack(raw)?;
        self.dispatch(message).await
    }

    /// Offer the message to pending awaits first, then to registered
    /// handlers. The removal of a pending entry under the lock is what
    /// claims the message, so an await can never both receive a message and
    /// time out.
    async fn dispatch(&self, message: Message) -> Result<()> {
        let message = {
            let mut pending = self.inner.pending.lock().await;
            match pending.iter().position(|p| (p.predicate)(&message)) {
                Some(i) => {
                    let entry = pending.remove(i);
                    match entry.tx.send(message) {
                        Ok(()) => return Ok(()),
                        // Awaiter was cancelled without deregistering; fall
                        // through to the registered handlers.
                        Err(message) => message,
                    }
                }
                None => message,
            }
        };

        let handler = {
            let dispatcher = self.inner.dispatcher.read().await;
            dispatcher.select(&message.msg_type).cloned()
        };
        match handler {
            Some(handler) => handler.call(self.clone(), message).await,
            None => {
                warn!(msg_type = %message.msg_type, "no handler for message");
                Err(Error::NoRegisteredHandler(message.msg_type.clone()))
            }
        }
    }

    async fn deliver(&self, packed: &[u8]) -> Result<Option<Vec<u8>>> {
        let endpoint = {
            let target = self.inner.target.read().await;
            target
                .as_ref()
                .and_then(|t| t.endpoint().map(str::to_string))
        };
        let endpoint =
            endpoint.ok_or_else(|| Error::Delivery("no endpoint configured".to_string()))?;
        self.inner.transport.send(packed, &endpoint).await
    }

    /// Authcrypt and deliver a message.
    ///
    /// When the message requests a return route and the transport hands back
    /// response bytes, the response is handled as an inbound message. A
    /// response without a return-route request is an error.
    pub async fn send(&self, message: &Message) -> Result<()> {
        self.send_with(message, PackMode::Authcrypt).await
    }

    /// Deliver a message with an explicit pack mode.
    pub async fn send_with(&self, message: &Message, mode: PackMode) -> Result<()> {
        let packed = self.pack(message, mode).await?;
        debug!(msg_type = %message.msg_type, ?mode, "sending message");
        match self.deliver(&packed).await? {
            None => Ok(()),
            Some(response) => match message.return_route() {
                Some("all" | "thread") => self.handle(&response).await,
                _ => Err(Error::UnexpectedResponse(format!(
                    "{} bytes returned without a return-route request",
                    response.len()
                ))),
            },
        }
    }

    async fn register_await<F>(&self, predicate: F) -> (u64, oneshot::Receiver<Message>)
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.push(PendingReply {
            token,
            predicate: Box::new(predicate),
            tx,
        });
        (token, rx)
    }

    async fn remove_pending(&self, token: u64) -> bool {
        let mut pending = self.inner.pending.lock().await;
        match pending.iter().position(|p| p.token == token) {
            Some(i) => {
                pending.remove(i);
                true
            }
            None => false,
        }
    }

    async fn wait(
        &self,
        token: u64,
        mut rx: oneshot::Receiver<Message>,
        timeout: Duration,
    ) -> Result<Message> {
        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(Error::Timeout),
            Err(_) => {
                if self.remove_pending(token).await {
                    Err(Error::Timeout)
                } else {
                    // Already claimed between the deadline and our removal
                    // attempt; the message is sitting in the channel.
                    rx.try_recv().map_err(|_| Error::Timeout)
                }
            }
        }
    }

    /// Wait for the next inbound message satisfying `condition`. Matching
    /// messages bypass registered handlers while the await is outstanding.
    pub async fn await_message<F>(&self, condition: F, timeout: Duration) -> Result<Message>
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        let (token, rx) = self.register_await(condition).await;
        self.wait(token, rx, timeout).await
    }

    /// Send a message requesting a return route and wait for an inbound
    /// message satisfying `condition`. The await is registered before the
    /// send, so a reply arriving on the transport response channel is
    /// claimed rather than dispatched.
    pub async fn send_and_await<F>(
        &self,
        message: &Message,
        condition: F,
        timeout: Duration,
    ) -> Result<Message>
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        let (token, rx) = self.register_await(condition).await;
        let message = message.clone().with_transport(&ReturnRoute::All);
        if let Err(e) = self.send(&message).await {
            self.remove_pending(token).await;
            return Err(e);
        }
        self.wait(token, rx, timeout).await
    }

    /// Send a message and wait for a reply in its thread.
    pub async fn send_and_await_reply(
        &self,
        message: &Message,
        timeout: Duration,
    ) -> Result<Message> {
        let thid = message.id.clone();
        self.send_and_await(
            message,
            move |reply: &Message| reply.thread_id() == Some(thid.as_str()),
            timeout,
        )
        .await
    }

    /// Send a message and wait for the next inbound message, whatever its
    /// thread.
    pub async fn send_and_await_returned(
        &self,
        message: &Message,
        timeout: Duration,
    ) -> Result<Message> {
        self.send_and_await(message, |_: &Message| true, timeout).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("verkey", &self.inner.keys.verkey())
            .finish_non_exhaustive()
    }
}
