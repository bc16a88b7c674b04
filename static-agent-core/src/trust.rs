//! Trust context attached to unpacked messages.
//!
//! Records the confidentiality and authentication properties under which a
//! message was received, so handlers can refuse messages that arrived with
//! less protection than a protocol step requires.

use crate::keys::VerKey;

/// How a message was protected in transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    /// Not established; the message was constructed locally, not received.
    #[default]
    None,
    /// Received unencrypted.
    Plaintext,
    /// Encrypted without sender identity.
    Anoncrypt,
    /// Encrypted with a verified sender identity.
    Authcrypt,
}

/// Immutable record of how an inbound message was received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustContext {
    encryption: Encryption,
    sender: Option<VerKey>,
    recipient: Option<VerKey>,
    nonrepudiation: bool,
}

impl TrustContext {
    /// Context for an authenticated-encrypted message.
    #[must_use]
    pub fn authcrypted(sender: VerKey, recipient: VerKey) -> Self {
        Self {
            encryption: Encryption::Authcrypt,
            sender: Some(sender),
            recipient: Some(recipient),
            nonrepudiation: false,
        }
    }

    /// Context for an anonymously encrypted message.
    #[must_use]
    pub fn anoncrypted(recipient: VerKey) -> Self {
        Self {
            encryption: Encryption::Anoncrypt,
            sender: None,
            recipient: Some(recipient),
            nonrepudiation: false,
        }
    }

    /// Context for a message received as plaintext.
    #[must_use]
    pub fn plaintext() -> Self {
        Self {
            encryption: Encryption::Plaintext,
            sender: None,
            recipient: None,
            nonrepudiation: false,
        }
    }

    /// The encryption mode the message arrived under.
    #[must_use]
    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    /// Sender verkey, present only for authcrypted messages.
    #[must_use]
    pub fn sender(&self) -> Option<&VerKey> {
        self.sender.as_ref()
    }

    /// The key the message was addressed to.
    #[must_use]
    pub fn recipient(&self) -> Option<&VerKey> {
        self.recipient.as_ref()
    }

    /// Whether the sender identity was authenticated and equals `expected`.
    #[must_use]
    pub fn sender_is(&self, expected: &VerKey) -> bool {
        self.sender.as_ref() == Some(expected)
    }

    #[must_use]
    /// Message was confidential and sender-authenticated.
    pub fn is_authcrypted(&self) -> bool {
        self.encryption == Encryption::Authcrypt
    }

    /// Message was confidential but carries no sender identity.
    #[must_use]
    pub fn is_anoncrypted(&self) -> bool {
        self.encryption == Encryption::Anoncrypt
    }

    /// Message arrived unencrypted.
    #[must_use]
    pub fn is_plaintext(&self) -> bool {
        self.encryption == Encryption::Plaintext
    }

    /// Whether a signed field of the payload has been verified.
    #[must_use]
    pub fn nonrepudiation(&self) -> bool {
        self.nonrepudiation
    }

    /// Record that a signed field of the payload was verified.
    pub fn affirm_nonrepudiation(&mut self) {
        self.nonrepudiation = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn modes_are_distinguishable() {
        let sender = *KeyPair::generate().verkey();
        let recipient = *KeyPair::generate().verkey();

        let auth = TrustContext::authcrypted(sender, recipient);
        assert!(auth.is_authcrypted());
        assert!(auth.sender_is(&sender));
        assert!(!auth.sender_is(&recipient));

        let anon = TrustContext::anoncrypted(recipient);
        assert!(anon.is_anoncrypted());
        assert!(anon.sender().is_none());
        assert!(!anon.sender_is(&sender));

        let plain = TrustContext::plaintext();
        assert!(plain.is_plaintext());
        assert_eq!(plain.recipient(), None);

        let unestablished = TrustContext::default();
        assert!(!unestablished.is_plaintext());
        assert_eq!(unestablished.encryption(), Encryption::None);
    }

    #[test]
    fn nonrepudiation_flag() {
        let mut ctx = TrustContext::plaintext();
        assert!(!ctx.nonrepudiation());
        ctx.affirm_nonrepudiation();
        assert!(ctx.nonrepudiation());
    }
}
