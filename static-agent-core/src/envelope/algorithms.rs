//! Cryptographic primitives for envelope packing.
//!
//! Content and key encryption both use ChaCha20-Poly1305 (IETF, 12-byte
//! nonce). Key agreement is x25519 ECDH with HKDF-SHA512 key derivation.
//! Anonymous ("sealed") encryption uses a fresh ephemeral key pair whose
//! public half is prepended to the ciphertext.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use sha2::Sha512;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// ChaCha20-Poly1305 key size in bytes.
pub(crate) const KEY_SIZE: usize = 32;

/// ChaCha20-Poly1305 nonce size in bytes.
pub(crate) const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size in bytes.
pub(crate) const TAG_SIZE: usize = 16;

const SEAL_INFO: &[u8] = b"static-agent/seal";

/// Generates random bytes from the system RNG.
pub(crate) fn random_bytes(size: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; size];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Derives `length` key bytes from a shared secret via HKDF-SHA512.
pub(crate) fn derive_key(
    shared_secret: &[u8],
    salt: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha512>::new(Some(salt), shared_secret);
    let mut okm = Zeroizing::new(vec![0u8; length]);
    hk.expand(info, &mut okm)
        .map_err(|e| Error::InvalidKeyMaterial(format!("HKDF error: {e}")))?;
    Ok(okm)
}

fn cipher(key: &[u8]) -> Result<ChaCha20Poly1305> {
    ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))
}

/// Encrypts with ChaCha20-Poly1305, returning ciphertext and detached tag.
pub(crate) fn encrypt_detached(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    if nonce.len() != NONCE_SIZE {
        return Err(Error::InvalidKeyMaterial("invalid nonce length".to_string()));
    }
    let mut combined = cipher(key)?
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|e| Error::Decryption(format!("encryption failed: {e}")))?;
    let tag = combined.split_off(combined.len() - TAG_SIZE);
    Ok((combined, tag))
}

/// Decrypts ChaCha20-Poly1305 ciphertext with a detached tag.
pub(crate) fn decrypt_detached(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(Error::Decryption("invalid nonce length".to_string()));
    }
    if tag.len() != TAG_SIZE {
        return Err(Error::Decryption("invalid tag length".to_string()));
    }
    let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);
    cipher(key)?
        .decrypt(Nonce::from_slice(nonce), Payload { msg: &combined, aad })
        .map_err(|_| Error::Decryption("authentication failed".to_string()))
}

/// Encrypts with ChaCha20-Poly1305, tag appended to the ciphertext.
pub(crate) fn encrypt_combined(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(Error::InvalidKeyMaterial("invalid nonce length".to_string()));
    }
    cipher(key)?
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| Error::Decryption(format!("encryption failed: {e}")))
}

/// Decrypts combined ChaCha20-Poly1305 ciphertext.
pub(crate) fn decrypt_combined(key: &[u8], nonce: &[u8], combined: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(Error::Decryption("invalid nonce length".to_string()));
    }
    cipher(key)?
        .decrypt(Nonce::from_slice(nonce), combined)
        .map_err(|_| Error::Decryption("authentication failed".to_string()))
}

fn seal_keys(shared: &[u8], ephemeral_pk: &PublicKey, recipient_pk: &PublicKey) -> Result<Zeroizing<Vec<u8>>> {
    let mut salt = Vec::with_capacity(64);
    salt.extend_from_slice(ephemeral_pk.as_bytes());
    salt.extend_from_slice(recipient_pk.as_bytes());
    derive_key(shared, &salt, SEAL_INFO, KEY_SIZE + NONCE_SIZE)
}

/// Anonymously encrypts to a recipient: no sender identity is revealed.
///
/// Output is the 32-byte ephemeral public key followed by the combined
/// ciphertext. The key and nonce are derived from the ephemeral ECDH shared
/// secret, so the nonce is single-use by construction.
pub(crate) fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_pk = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);
    let okm = seal_keys(shared.as_bytes(), &ephemeral_pk, recipient)?;
    let combined = encrypt_combined(&okm[..KEY_SIZE], &okm[KEY_SIZE..], plaintext)?;

    let mut sealed = Vec::with_capacity(32 + combined.len());
    sealed.extend_from_slice(ephemeral_pk.as_bytes());
    sealed.extend_from_slice(&combined);
    Ok(sealed)
}

/// Opens a sealed box produced by [`seal`].
pub(crate) fn seal_open(secret: &StaticSecret, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < 32 + TAG_SIZE {
        return Err(Error::Decryption("sealed box too short".to_string()));
    }
    let (epk_bytes, combined) = sealed.split_at(32);
    let mut epk = [0u8; 32];
    epk.copy_from_slice(epk_bytes);
    let ephemeral_pk = PublicKey::from(epk);
    let recipient_pk = PublicKey::from(secret);
    let shared = secret.diffie_hellman(&ephemeral_pk);
    let okm = seal_keys(shared.as_bytes(), &ephemeral_pk, &recipient_pk)?;
    decrypt_combined(&okm[..KEY_SIZE], &okm[KEY_SIZE..], combined)
}
