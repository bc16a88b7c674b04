//! Key pairs and verification keys.
//!
//! Keys are ed25519; for envelope encryption they are converted to their
//! x25519 (Montgomery) form. Verification keys are identified on the wire by
//! their base58 encoding.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{Error, Result};

/// A validated 32-byte ed25519 verification key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerKey([u8; 32]);

impl VerKey {
    /// Construct from raw bytes, validating that they form a curve point.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        VerifyingKey::from_bytes(bytes)
            .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))?;
        Ok(Self(*bytes))
    }

    /// Construct from a base58-encoded key string.
    pub fn from_b58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::InvalidKeyMaterial(format!("invalid base58 key: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKeyMaterial("key must be 32 bytes".to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base58 encoding, used as the recipient key identifier on the wire.
    #[must_use]
    pub fn to_b58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Verkey-based DID: base58 of the first 16 key bytes.
    #[must_use]
    pub fn did(&self) -> String {
        bs58::encode(&self.0[..16]).into_string()
    }

    /// Verify a detached signature over `data`.
    pub fn verify(&self, data: &[u8], signature: &Signature) -> Result<()> {
        self.verifying_key()?
            .verify(data, signature)
            .map_err(|e| Error::SignatureVerification(e.to_string()))
    }

    pub(crate) fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| Error::InvalidKeyMaterial(e.to_string()))
    }

    /// The x25519 form of this key, for ECDH.
    pub(crate) fn to_x25519(&self) -> Result<PublicKey> {
        let montgomery = self.verifying_key()?.to_montgomery();
        Ok(PublicKey::from(montgomery.to_bytes()))
    }
}

impl fmt::Display for VerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_b58())
    }
}

impl fmt::Debug for VerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerKey({})", self.to_b58())
    }
}

/// An exclusively owned ed25519 key pair. Immutable once constructed.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
    verkey: VerKey,
}

impl KeyPair {
    /// Generate a fresh random key pair.
    #[must_use]
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let verkey = VerKey(signing.verifying_key().to_bytes());
        Self { signing, verkey }
    }

    /// Derive a key pair from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(seed);
        let verkey = VerKey(signing.verifying_key().to_bytes());
        Self { signing, verkey }
    }

    /// Reconstruct from a verkey and the 32-byte secret seed, checking that
    /// the two halves belong together.
    pub fn from_parts(verkey: VerKey, sigkey: &[u8; 32]) -> Result<Self> {
        let pair = Self::from_seed(sigkey);
        if pair.verkey != verkey {
            return Err(Error::InvalidKeyMaterial(
                "verkey does not match signing key".to_string(),
            ));
        }
        Ok(pair)
    }

    /// This key pair's verification key.
    #[must_use]
    pub fn verkey(&self) -> &VerKey {
        &self.verkey
    }

    /// Base58 encoding of the verification key.
    #[must_use]
    pub fn verkey_b58(&self) -> String {
        self.verkey.to_b58()
    }

    /// Verkey-based DID for this key pair.
    #[must_use]
    pub fn did(&self) -> String {
        self.verkey.did()
    }

    /// Sign `data` with the ed25519 secret key.
    #[must_use]
    pub fn sign(&self, data: &[u8]) -> Signature {
        self.signing.sign(data)
    }

    /// The x25519 secret corresponding to this ed25519 key, for ECDH.
    pub(crate) fn to_x25519(&self) -> StaticSecret {
        // Standard ed25519-to-x25519 secret conversion: the scalar half of
        // the SHA-512 expansion of the seed.
        let digest = Sha512::digest(self.signing.to_bytes());
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&digest[..32]);
        StaticSecret::from(secret)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({}, ...)", self.verkey_b58())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha256;

    #[test]
    fn generate_and_round_trip_b58() {
        let pair = KeyPair::generate();
        let b58 = pair.verkey_b58();
        let parsed = VerKey::from_b58(&b58).unwrap();
        assert_eq!(&parsed, pair.verkey());
    }

    #[test]
    fn from_seed_is_deterministic() {
        let seed: [u8; 32] = Sha256::digest(b"test-keypair-from-seed").into();
        let a = KeyPair::from_seed(&seed);
        let b = KeyPair::from_seed(&seed);
        assert_eq!(a.verkey(), b.verkey());
    }

    #[test]
    fn from_parts_checks_consistency() {
        let pair = KeyPair::generate();
        let other = KeyPair::generate();
        let seed = pair.signing.to_bytes();
        assert!(KeyPair::from_parts(*pair.verkey(), &seed).is_ok());
        assert!(KeyPair::from_parts(*other.verkey(), &seed).is_err());
    }

    #[test]
    fn sign_and_verify() {
        let pair = KeyPair::generate();
        let sig = pair.sign(b"data");
        pair.verkey().verify(b"data", &sig).unwrap();
        assert!(pair.verkey().verify(b"other", &sig).is_err());
    }

    #[test]
    fn x25519_agreement_matches() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let ab = alice
            .to_x25519()
            .diffie_hellman(&bob.verkey().to_x25519().unwrap());
        let ba = bob
            .to_x25519()
            .diffie_hellman(&alice.verkey().to_x25519().unwrap());
        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn did_is_first_half_of_key() {
        let pair = KeyPair::generate();
        let decoded = bs58::decode(pair.did()).into_vec().unwrap();
        assert_eq!(&decoded[..], &pair.verkey().as_bytes()[..16]);
    }
}
