//! Cryptographic building blocks for Nova direct messaging.
//!
//! - [`EnvelopeCipher`]: hybrid encryption. A fresh AES-256-GCM content key per message,
//!   wrapped once per participant with RSA-OAEP (SHA-256).
//! - [`ContentIntegrity`]: HMAC-SHA256 tags over stored content plus its record context.
//! - [`keys`]: PEM parsing/encoding for participant key pairs.

pub mod envelope;
pub mod hash;
pub mod integrity;
pub mod keys;

pub use envelope::{EnvelopeCipher, SealedEnvelope, ENVELOPE_VERSION};
pub use hash::{public_key_fingerprint, sha256};
pub use integrity::{ContentIntegrity, RecordContext};
pub use keys::{parse_private_key_pem, parse_public_key_pem, public_key_to_pem, MIN_RSA_BITS};
pub use rsa::{RsaPrivateKey, RsaPublicKey};

/// Error returned by every operation in this crate.
///
/// Decryption failures are intentionally collapsed into a single variant: callers cannot tell a
/// wrong private key from a tampered ciphertext or a malformed encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption error")]
    Encryption,
    #[error("decryption error")]
    Decryption,
    #[error("invalid key material")]
    InvalidKey,
}
