//! Detached signing of message fields.
//!
//! A signed field is replaced by a JSON object carrying the signer's verkey,
//! the base64url signed data (an 8-byte big-endian unix timestamp followed
//! by the canonical JSON bytes of the field) and the detached ed25519
//! signature. Verification recomputes and returns the original field value
//! together with the signer's key.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::Signature;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::keys::{KeyPair, VerKey};

/// Message type of a signed field object.
pub const SIGNATURE_TYPE: &str = "https://didcomm.org/signature/1.0/ed25519Sha512_single";

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn sign_field_at(keys: &KeyPair, field: &Value, timestamp: u64) -> Result<Value> {
    let mut sig_data = timestamp.to_be_bytes().to_vec();
    sig_data.extend_from_slice(&serde_json::to_vec(field)?);
    let signature = keys.sign(&sig_data);

    Ok(json!({
        "@type": SIGNATURE_TYPE,
        "signer": keys.verkey_b58(),
        "sig_data": URL_SAFE_NO_PAD.encode(&sig_data),
        "signature": URL_SAFE_NO_PAD.encode(signature.to_bytes()),
    }))
}

/// Sign a message field, producing its signed replacement object.
pub fn sign_field(keys: &KeyPair, field: &Value) -> Result<Value> {
    sign_field_at(keys, field, unix_timestamp())
}

fn string_field<'a>(signed: &'a Value, key: &'static str) -> Result<&'a str> {
    signed
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::SignatureVerification(format!("missing {key}")))
}

/// Verify a signed field object, returning the original field value and the
/// signer's verkey.
pub fn verify_signed_field(signed: &Value) -> Result<(Value, VerKey)> {
    if string_field(signed, "@type")? != SIGNATURE_TYPE {
        return Err(Error::SignatureVerification(
            "unexpected signature type".to_string(),
        ));
    }

    let signer = VerKey::from_b58(string_field(signed, "signer")?)?;
    let sig_data = URL_SAFE_NO_PAD
        .decode(string_field(signed, "sig_data")?)
        .map_err(|e| Error::SignatureVerification(format!("sig_data: {e}")))?;
    if sig_data.len() < 8 {
        return Err(Error::SignatureVerification(
            "sig_data too short to carry a timestamp".to_string(),
        ));
    }
    let signature = URL_SAFE_NO_PAD
        .decode(string_field(signed, "signature")?)
        .map_err(|e| Error::SignatureVerification(format!("signature: {e}")))?;
    let signature = Signature::from_slice(&signature)
        .map_err(|e| Error::SignatureVerification(e.to_string()))?;

    signer.verify(&sig_data, &signature)?;

    let field = serde_json::from_slice(&sig_data[8..])
        .map_err(|e| Error::SignatureVerification(format!("signed field: {e}")))?;
    Ok((field, signer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sign_and_verify_round_trip() {
        let keys = KeyPair::generate();
        let field = json!({"connection": {"did": "abc"}});
        let signed = sign_field(&keys, &field).unwrap();
        assert_eq!(signed["@type"], SIGNATURE_TYPE);

        let (recovered, signer) = verify_signed_field(&signed).unwrap();
        assert_eq!(recovered, field);
        assert_eq!(&signer, keys.verkey());
    }

    #[test]
    fn tampered_data_rejected() {
        let keys = KeyPair::generate();
        let mut signed = sign_field(&keys, &json!({"n": 1})).unwrap();

        let mut sig_data = URL_SAFE_NO_PAD
            .decode(signed["sig_data"].as_str().unwrap())
            .unwrap();
        let last = sig_data.len() - 1;
        sig_data[last] ^= 1;
        signed["sig_data"] = json!(URL_SAFE_NO_PAD.encode(sig_data));

        assert!(matches!(
            verify_signed_field(&signed),
            Err(Error::SignatureVerification(_))
        ));
    }

    #[test]
    fn wrong_signer_rejected() {
        let keys = KeyPair::generate();
        let other = KeyPair::generate();
        let mut signed = sign_field(&keys, &json!({"n": 1})).unwrap();
        signed["signer"] = json!(other.verkey_b58());
        assert!(verify_signed_field(&signed).is_err());
    }

    #[test]
    fn truncated_sig_data_rejected() {
        let keys = KeyPair::generate();
        let mut signed = sign_field(&keys, &json!({"n": 1})).unwrap();
        signed["sig_data"] = json!(URL_SAFE_NO_PAD.encode([1u8, 2, 3]));
        assert!(matches!(
            verify_signed_field(&signed),
            Err(Error::SignatureVerification(_))
        ));
    }

    #[test]
    fn timestamp_is_prefixed() {
        let keys = KeyPair::generate();
        let signed = sign_field_at(&keys, &json!("x"), 42).unwrap();
        let sig_data = URL_SAFE_NO_PAD
            .decode(signed["sig_data"].as_str().unwrap())
            .unwrap();
        assert_eq!(u64::from_be_bytes(sig_data[..8].try_into().unwrap()), 42);
    }
}
