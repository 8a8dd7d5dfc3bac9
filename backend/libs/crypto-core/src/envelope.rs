//! Envelope (hybrid) encryption for 1:1 messages.
//!
//! ## Stored format
//!
//! All three outputs are standard base64:
//! - `ciphertext`: `[nonce (12 bytes)][AES-256-GCM ciphertext][tag (16 bytes)]`
//! - `wrapped_key_for_*`: RSA-OAEP(SHA-256) encryption of the 32-byte content key
//!
//! The content key only lives inside a single `encrypt` call and is zeroized on drop.
//! There is no ratchet: every message carries its own independent content key.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{rngs::OsRng, RngCore};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::CryptoError;

/// Format version stamped on stored envelopes.
pub const ENVELOPE_VERSION: i32 = 1;

const CONTENT_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const ENVELOPE_AAD: &[u8] = b"nova-dm-envelope-v1";

/// Output of [`EnvelopeCipher::encrypt`]; the only artifacts that reach storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    pub ciphertext: String,
    pub wrapped_key_for_sender: String,
    pub wrapped_key_for_receiver: String,
}

/// Stateless hybrid cipher.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCipher;

impl EnvelopeCipher {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt `plaintext` under a fresh content key and wrap that key for both participants.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        sender_key: &RsaPublicKey,
        receiver_key: &RsaPublicKey,
    ) -> Result<SealedEnvelope, CryptoError> {
        let mut content_key = Zeroizing::new([0u8; CONTENT_KEY_LEN]);
        OsRng.fill_bytes(&mut content_key[..]);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let cipher =
            Aes256Gcm::new_from_slice(&content_key[..]).map_err(|_| CryptoError::Encryption)?;
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: ENVELOPE_AAD,
                },
            )
            .map_err(|_| CryptoError::Encryption)?;

        let mut body = Vec::with_capacity(NONCE_LEN + sealed.len());
        body.extend_from_slice(&nonce_bytes);
        body.extend_from_slice(&sealed);

        Ok(SealedEnvelope {
            ciphertext: BASE64.encode(body),
            wrapped_key_for_sender: wrap_content_key(&content_key, sender_key)?,
            wrapped_key_for_receiver: wrap_content_key(&content_key, receiver_key)?,
        })
    }

    /// Unwrap the content key with `private_key` and authenticate-decrypt `ciphertext`.
    ///
    /// Every failure (bad base64, wrong key, tampered bytes) is [`CryptoError::Decryption`].
    pub fn decrypt(
        &self,
        ciphertext: &str,
        wrapped_key: &str,
        private_key: &RsaPrivateKey,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let content_key = unwrap_content_key(wrapped_key, private_key)?;

        let body = BASE64
            .decode(ciphertext)
            .map_err(|_| CryptoError::Decryption)?;
        if body.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decryption);
        }
        let (nonce_bytes, sealed) = body.split_at(NONCE_LEN);

        let cipher =
            Aes256Gcm::new_from_slice(&content_key[..]).map_err(|_| CryptoError::Decryption)?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: sealed,
                    aad: ENVELOPE_AAD,
                },
            )
            .map_err(|_| CryptoError::Decryption)?;

        Ok(Zeroizing::new(plaintext))
    }
}

fn wrap_content_key(
    content_key: &[u8; CONTENT_KEY_LEN],
    recipient: &RsaPublicKey,
) -> Result<String, CryptoError> {
    let wrapped = recipient
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), content_key)
        .map_err(|_| CryptoError::Encryption)?;
    Ok(BASE64.encode(wrapped))
}

fn unwrap_content_key(
    wrapped: &str,
    private_key: &RsaPrivateKey,
) -> Result<Zeroizing<[u8; CONTENT_KEY_LEN]>, CryptoError> {
    let wrapped = BASE64.decode(wrapped).map_err(|_| CryptoError::Decryption)?;
    let raw = Zeroizing::new(
        private_key
            .decrypt(Oaep::new::<Sha256>(), &wrapped)
            .map_err(|_| CryptoError::Decryption)?,
    );
    if raw.len() != CONTENT_KEY_LEN {
        return Err(CryptoError::Decryption);
    }
    let mut key = Zeroizing::new([0u8; CONTENT_KEY_LEN]);
    key.copy_from_slice(&raw);
    Ok(key)
}
