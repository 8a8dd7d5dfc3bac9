//! Keyed digests that detect tampering with stored content.
//!
//! The tag covers the content together with its record context, so moving content to another
//! author, timestamp or version also breaks verification. Fields are length-prefixed before
//! hashing; no two distinct inputs share a canonical encoding.

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum secret length accepted by [`ContentIntegrity::new`].
pub const MIN_SECRET_LEN: usize = 32;

const DOMAIN: &[u8] = b"nova-content-integrity-v1";

/// Metadata bound into every tag alongside the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordContext {
    /// Only microsecond precision participates, matching what Postgres stores.
    pub timestamp: DateTime<Utc>,
    pub author_id: Uuid,
    pub version: i32,
}

/// HMAC-SHA256 signer holding the process-wide integrity secret.
#[derive(Clone)]
pub struct ContentIntegrity {
    secret: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for ContentIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentIntegrity")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl ContentIntegrity {
    pub fn new(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::InvalidKey);
        }
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
        })
    }

    /// Hex-encoded tag over `content` and `context`.
    pub fn sign(&self, content: &[u8], context: &RecordContext) -> String {
        hex::encode(self.mac(content, context).finalize().into_bytes())
    }

    /// Recompute the tag and compare in constant time.
    pub fn verify(&self, content: &[u8], context: &RecordContext, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        self.mac(content, context).verify_slice(&expected).is_ok()
    }

    fn mac(&self, content: &[u8], context: &RecordContext) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(DOMAIN);
        update_field(&mut mac, content);
        update_field(&mut mac, &context.timestamp.timestamp_micros().to_be_bytes());
        update_field(&mut mac, context.author_id.as_bytes());
        update_field(&mut mac, &context.version.to_be_bytes());
        mac
    }
}

fn update_field(mac: &mut HmacSha256, bytes: &[u8]) {
    mac.update(&(bytes.len() as u64).to_be_bytes());
    mac.update(bytes);
}
