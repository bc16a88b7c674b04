//! Envelope pack/unpack tests across key pairs.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::envelope::{pack_message, unpack_message, Envelope};
use crate::error::Error;
use crate::keys::KeyPair;
use crate::message::{Message, FORWARD};

fn test_message() -> Message {
    Message::from_value(json!({
        "@type": "doc/protocol/1.0/name",
        "content": "hello",
    }))
    .unwrap()
}

#[test]
fn pack_unpack_auth() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let msg = test_message();

    let packed = pack_message(&msg, &[*bob.verkey()], &[], Some(&alice)).unwrap();
    let unpacked = unpack_message(&packed, &bob).unwrap();

    assert_eq!(unpacked.id, msg.id);
    assert_eq!(unpacked.fields, msg.fields);
    assert!(unpacked.trust().is_authcrypted());
    assert_eq!(unpacked.trust().sender(), Some(alice.verkey()));
    assert_eq!(unpacked.trust().recipient(), Some(bob.verkey()));
}

#[test]
fn pack_unpack_anon() {
    let bob = KeyPair::generate();
    let msg = test_message();

    let packed = pack_message(&msg, &[*bob.verkey()], &[], None).unwrap();
    let unpacked = unpack_message(&packed, &bob).unwrap();

    assert!(unpacked.trust().is_anoncrypted());
    assert_eq!(unpacked.trust().sender(), None);
    assert_eq!(unpacked.trust().recipient(), Some(bob.verkey()));
}

#[test]
fn unpack_plaintext() {
    let bob = KeyPair::generate();
    let msg = test_message();

    let unpacked = unpack_message(&msg.to_bytes().unwrap(), &bob).unwrap();
    assert!(unpacked.trust().is_plaintext());
    assert_eq!(unpacked.trust().sender(), None);
    assert_eq!(unpacked.trust().recipient(), None);
}

#[test]
fn multiple_recipients_can_each_open() {
    let alice = KeyPair::generate();
    let recipients: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
    let verkeys: Vec<_> = recipients.iter().map(|k| *k.verkey()).collect();
    let msg = test_message();

    let packed = pack_message(&msg, &verkeys, &[], Some(&alice)).unwrap();
    for recipient in &recipients {
        let unpacked = unpack_message(&packed, recipient).unwrap();
        assert!(unpacked.trust().is_authcrypted());
        assert_eq!(unpacked.trust().recipient(), Some(recipient.verkey()));
    }
}

#[test]
fn wrong_key_is_undeliverable() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let eve = KeyPair::generate();

    let packed = pack_message(&test_message(), &[*bob.verkey()], &[], Some(&alice)).unwrap();
    assert!(matches!(
        unpack_message(&packed, &eve),
        Err(Error::Undeliverable)
    ));
}

fn tamper(packed: &[u8], field: fn(&mut Envelope) -> &mut String) -> Vec<u8> {
    let mut envelope: Envelope = serde_json::from_slice(packed).unwrap();
    let mut bytes = URL_SAFE_NO_PAD.decode(field(&mut envelope).as_str()).unwrap();
    bytes[0] ^= 1;
    *field(&mut envelope) = URL_SAFE_NO_PAD.encode(bytes);
    serde_json::to_vec(&envelope).unwrap()
}

#[test]
fn tampered_ciphertext_rejected() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let packed = pack_message(&test_message(), &[*bob.verkey()], &[], Some(&alice)).unwrap();

    let tampered = tamper(&packed, |e| &mut e.ciphertext);
    assert!(matches!(
        unpack_message(&tampered, &bob),
        Err(Error::Decryption(_))
    ));
}

#[test]
fn tampered_tag_rejected() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let packed = pack_message(&test_message(), &[*bob.verkey()], &[], Some(&alice)).unwrap();

    let tampered = tamper(&packed, |e| &mut e.tag);
    assert!(matches!(
        unpack_message(&tampered, &bob),
        Err(Error::Decryption(_))
    ));
}

#[test]
fn packing_is_randomized() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let msg = test_message();

    let a = pack_message(&msg, &[*bob.verkey()], &[], Some(&alice)).unwrap();
    let b = pack_message(&msg, &[*bob.verkey()], &[], Some(&alice)).unwrap();
    assert_ne!(a, b);
}

#[test]
fn invalid_base64_field_rejected() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let packed = pack_message(&test_message(), &[*bob.verkey()], &[], Some(&alice)).unwrap();

    let mut envelope: Envelope = serde_json::from_slice(&packed).unwrap();
    envelope.iv = "!!not base64url!!".to_string();
    let raw = serde_json::to_vec(&envelope).unwrap();
    assert!(matches!(
        unpack_message(&raw, &bob),
        Err(Error::Base64 { field: "iv", .. })
    ));
}

#[test]
fn garbage_input_is_invalid_envelope() {
    let bob = KeyPair::generate();
    assert!(matches!(
        unpack_message(b"not json at all", &bob),
        Err(Error::InvalidEnvelope(_))
    ));
}

#[test]
fn routing_keys_produce_forward_chain() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let route1 = KeyPair::generate();
    let route2 = KeyPair::generate();

    // routing_keys are innermost-first: route1 sits next to bob, route2 is
    // the first hop and gets the outermost envelope.
    let packed = pack_message(
        &test_message(),
        &[*bob.verkey()],
        &[*route1.verkey(), *route2.verkey()],
        Some(&alice),
    )
    .unwrap();

    let route2_msg = unpack_message(&packed, &route2).unwrap();
    assert_eq!(route2_msg.msg_type.to_string(), FORWARD);
    assert_eq!(route2_msg.get("to"), Some(&json!(route1.verkey_b58())));
    assert!(route2_msg.trust().is_anoncrypted());

    let inner = serde_json::to_vec(route2_msg.get("msg").unwrap()).unwrap();
    let route1_msg = unpack_message(&inner, &route1).unwrap();
    assert_eq!(route1_msg.msg_type.to_string(), FORWARD);
    assert_eq!(route1_msg.get("to"), Some(&json!(bob.verkey_b58())));
    assert!(route1_msg.trust().is_anoncrypted());

    let inner = serde_json::to_vec(route1_msg.get("msg").unwrap()).unwrap();
    let bob_msg = unpack_message(&inner, &bob).unwrap();
    assert_eq!(bob_msg.msg_type.to_string(), "doc/protocol/1.0/name");
    assert!(bob_msg.trust().is_authcrypted());
    assert_eq!(bob_msg.trust().sender(), Some(alice.verkey()));
}
