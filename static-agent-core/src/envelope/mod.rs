//! Envelope packing and unpacking.
//!
//! The wire form is a JSON object of base64url fields: a `protected` header,
//! `iv`, `ciphertext` and `tag`. The protected header carries the content
//! encryption algorithm and a per-recipient list of encrypted copies of the
//! content encryption key, keyed by the recipient's base58 verkey (`kid`).
//!
//! Two recipient-key modes exist:
//!
//! - **Authcrypt**: the content key is encrypted under a key agreed between
//!   the sender's and recipient's static keys; the sender's verkey travels
//!   sealed inside the recipient header, so only the recipient learns it.
//! - **Anoncrypt**: the content key is sealed to the recipient with an
//!   ephemeral key; no sender identity exists anywhere in the envelope.
//!
//! Mediated routing wraps the whole envelope as the `msg` field of a
//! `forward` message packed anoncrypt to the next routing key. Routing keys
//! are ordered innermost-first: index 0 is the mediator closest to the
//! recipient, and the last routing key receives the outermost envelope (it
//! is the first hop, so the connection endpoint should be that mediator's).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::trace;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::keys::{KeyPair, VerKey};
use crate::message::Message;
use crate::trust::TrustContext;

pub(crate) mod algorithms;

use algorithms::{
    decrypt_combined, decrypt_detached, derive_key, encrypt_combined, encrypt_detached,
    random_bytes, seal, seal_open, KEY_SIZE, NONCE_SIZE,
};

const ENC: &str = "chacha20poly1305_ietf";
const TYP: &str = "JWM/1.0";
const ALG_AUTH: &str = "Authcrypt";
const ALG_ANON: &str = "Anoncrypt";
const CEK_WRAP_INFO: &[u8] = b"static-agent/cek-wrap";

/// An encrypted envelope in wire form. All fields are base64url encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The protected header.
    pub protected: String,
    /// Content encryption nonce.
    pub iv: String,
    /// Encrypted payload.
    pub ciphertext: String,
    /// Payload authentication tag.
    pub tag: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Protected {
    enc: String,
    typ: String,
    alg: String,
    recipients: Vec<Recipient>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Recipient {
    encrypted_key: String,
    header: RecipientHeader,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecipientHeader {
    kid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iv: Option<String>,
}

fn b64_field(encoded: &str, field: &'static str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|source| Error::Base64 { field, source })
}

/// Encrypt `plaintext` into an envelope for `recipients`.
///
/// With a `sender`, each recipient can authenticate the sender's identity;
/// without one, the envelope is anonymous. A fresh content key and nonce are
/// generated per call, so repeated packs of the same plaintext never produce
/// identical envelopes.
pub fn seal_envelope(
    plaintext: &[u8],
    recipients: &[VerKey],
    sender: Option<&KeyPair>,
) -> Result<Envelope> {
    if recipients.is_empty() {
        return Err(Error::InvalidEnvelope("no recipients".to_string()));
    }

    let cek = Zeroizing::new(random_bytes(KEY_SIZE));
    let mut recipient_headers = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        let recipient_pk = recipient.to_x25519()?;
        let entry = match sender {
            Some(sender) => {
                let shared = sender.to_x25519().diffie_hellman(&recipient_pk);
                let kek = derive_key(shared.as_bytes(), &[], CEK_WRAP_INFO, KEY_SIZE)?;
                let iv = random_bytes(NONCE_SIZE);
                let encrypted_key = encrypt_combined(&kek, &iv, &cek)?;
                let sealed_sender = seal(&recipient_pk, sender.verkey_b58().as_bytes())?;
                Recipient {
                    encrypted_key: URL_SAFE_NO_PAD.encode(encrypted_key),
                    header: RecipientHeader {
                        kid: recipient.to_b58(),
                        sender: Some(URL_SAFE_NO_PAD.encode(sealed_sender)),
                        iv: Some(URL_SAFE_NO_PAD.encode(iv)),
                    },
                }
            }
            None => Recipient {
                encrypted_key: URL_SAFE_NO_PAD.encode(seal(&recipient_pk, &cek)?),
                header: RecipientHeader {
                    kid: recipient.to_b58(),
                    sender: None,
                    iv: None,
                },
            },
        };
        recipient_headers.push(entry);
    }

    let protected = Protected {
        enc: ENC.to_string(),
        typ: TYP.to_string(),
        alg: if sender.is_some() { ALG_AUTH } else { ALG_ANON }.to_string(),
        recipients: recipient_headers,
    };
    let protected = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&protected)?);

    let iv = random_bytes(NONCE_SIZE);
    let (ciphertext, tag) = encrypt_detached(&cek, &iv, protected.as_bytes(), plaintext)?;

    Ok(Envelope {
        protected,
        iv: URL_SAFE_NO_PAD.encode(iv),
        ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        tag: URL_SAFE_NO_PAD.encode(tag),
    })
}

/// Decrypt an envelope addressed to `keys`, returning the plaintext and the
/// trust context it was received under.
pub fn open_envelope(envelope: &Envelope, keys: &KeyPair) -> Result<(Vec<u8>, TrustContext)> {
    let protected_raw = b64_field(&envelope.protected, "protected")?;
    let protected: Protected = serde_json::from_slice(&protected_raw)
        .map_err(|e| Error::InvalidEnvelope(format!("protected header: {e}")))?;
    if protected.enc != ENC {
        return Err(Error::InvalidEnvelope(format!(
            "unsupported content encryption: {}",
            protected.enc
        )));
    }

    let own_kid = keys.verkey_b58();
    let recipient = protected
        .recipients
        .iter()
        .find(|r| r.header.kid == own_kid)
        .ok_or(Error::Undeliverable)?;
    let own_secret = keys.to_x25519();
    let encrypted_key = b64_field(&recipient.encrypted_key, "encrypted_key")?;

    // An authenticated recipient entry carries the sealed sender identity;
    // absent that, the content key itself is a sealed box.
    let (cek, sender) = match &recipient.header.sender {
        Some(sealed_sender) => {
            let sender_b58 = seal_open(&own_secret, &b64_field(sealed_sender, "sender")?)?;
            let sender_b58 = String::from_utf8(sender_b58)
                .map_err(|_| Error::Decryption("sender key is not valid UTF-8".to_string()))?;
            let sender = VerKey::from_b58(&sender_b58)?;
            let shared = own_secret.diffie_hellman(&sender.to_x25519()?);
            let kek = derive_key(shared.as_bytes(), &[], CEK_WRAP_INFO, KEY_SIZE)?;
            let iv = recipient
                .header
                .iv
                .as_ref()
                .ok_or_else(|| Error::InvalidEnvelope("missing recipient iv".to_string()))?;
            let cek = decrypt_combined(&kek, &b64_field(iv, "recipient iv")?, &encrypted_key)?;
            (Zeroizing::new(cek), Some(sender))
        }
        None => (
            Zeroizing::new(seal_open(&own_secret, &encrypted_key)?),
            None,
        ),
    };

    let iv = b64_field(&envelope.iv, "iv")?;
    let ciphertext = b64_field(&envelope.ciphertext, "ciphertext")?;
    let tag = b64_field(&envelope.tag, "tag")?;
    let plaintext = decrypt_detached(&cek, &iv, envelope.protected.as_bytes(), &ciphertext, &tag)?;

    let trust = match sender {
        Some(sender) => TrustContext::authcrypted(sender, *keys.verkey()),
        None => TrustContext::anoncrypted(*keys.verkey()),
    };
    Ok((plaintext, trust))
}

/// Pack a message into wire bytes, wrapping one forward envelope per routing
/// key. `routing_keys` is ordered innermost-first (see module docs); pass an
/// empty slice for a direct connection.
pub fn pack_message(
    msg: &Message,
    recipients: &[VerKey],
    routing_keys: &[VerKey],
    sender: Option<&KeyPair>,
) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(Error::InvalidEnvelope("no recipients".to_string()));
    }

    let envelope = seal_envelope(&msg.to_bytes()?, recipients, sender)?;
    let mut packed = serde_json::to_vec(&envelope)?;

    // Sender identity is never propagated through mediators: every forward
    // wrap is anonymous.
    let mut forward_to = recipients[0];
    for routing_key in routing_keys {
        trace!(next_hop = %routing_key, "wrapping forward envelope");
        let forward = Message::forward(&forward_to, serde_json::from_slice(&packed)?);
        let envelope = seal_envelope(
            &forward.to_bytes()?,
            std::slice::from_ref(routing_key),
            None,
        )?;
        packed = serde_json::to_vec(&envelope)?;
        forward_to = *routing_key;
    }

    Ok(packed)
}

/// Unpack wire bytes into a message with its trust context.
///
/// Input that is a JSON object without a `protected` field is treated as a
/// plaintext message and marked as such; handshake and administrative flows
/// are the only producers of plaintext input.
pub fn unpack_message(raw: &[u8], keys: &KeyPair) -> Result<Message> {
    let value: serde_json::Value = serde_json::from_slice(raw)
        .map_err(|e| Error::InvalidEnvelope(format!("not valid JSON: {e}")))?;

    if value.get("protected").is_none() {
        let mut msg = Message::from_value(value)?;
        msg.trust = TrustContext::plaintext();
        return Ok(msg);
    }

    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|e| Error::InvalidEnvelope(e.to_string()))?;
    let (plaintext, trust) = open_envelope(&envelope, keys)?;
    let mut msg = Message::deserialize(&plaintext)?;
    msg.trust = trust;
    Ok(msg)
}
