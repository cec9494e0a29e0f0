//! `X-Hub-Signature` verification for pushed content.
//!
//! A hub signs each content distribution with HMAC over the raw body, keyed by
//! the subscriber's shared secret, and sends `algo=hexdigest`. OStatus-era
//! hubs use `sha1`; WebSub also allows the SHA-2 family.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl SignatureAlgorithm {
    pub fn prefix(self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
            SignatureAlgorithm::Sha384 => "sha384",
            SignatureAlgorithm::Sha512 => "sha512",
        }
    }

    /// Exact, lowercase match only.
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "sha1" => Some(SignatureAlgorithm::Sha1),
            "sha256" => Some(SignatureAlgorithm::Sha256),
            "sha384" => Some(SignatureAlgorithm::Sha384),
            "sha512" => Some(SignatureAlgorithm::Sha512),
            _ => None,
        }
    }

    fn mac(self, key: &[u8], payload: &[u8]) -> Option<Vec<u8>> {
        macro_rules! hmac_bytes {
            ($digest:ty) => {
                match Hmac::<$digest>::new_from_slice(key) {
                    Ok(mut mac) => {
                        mac.update(payload);
                        Some(mac.finalize().into_bytes().to_vec())
                    }
                    Err(_) => None,
                }
            };
        }

        match self {
            SignatureAlgorithm::Sha1 => hmac_bytes!(Sha1),
            SignatureAlgorithm::Sha256 => hmac_bytes!(Sha256),
            SignatureAlgorithm::Sha384 => hmac_bytes!(Sha384),
            SignatureAlgorithm::Sha512 => hmac_bytes!(Sha512),
        }
    }
}

/// Signs `payload` the way OStatus hubs do: `sha1=<lowercase hex>`.
pub fn sign(payload: &[u8], secret: &str) -> String {
    sign_with(SignatureAlgorithm::Sha1, payload, secret)
}

pub fn sign_with(algorithm: SignatureAlgorithm, payload: &[u8], secret: &str) -> String {
    let digest = algorithm
        .mac(secret.as_bytes(), payload)
        .map(hex::encode)
        .unwrap_or_default();
    format!("{}={}", algorithm.prefix(), digest)
}

/// Checks an `X-Hub-Signature` value against `payload` and `secret`.
///
/// Returns `false` for an empty secret, an unknown algorithm, anything that
/// is not lowercase hex, or a digest mismatch. The digest comparison is
/// constant-time. Never panics on hostile input.
pub fn verify(payload: &[u8], signature: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }

    let Some((prefix, digest_hex)) = signature.split_once('=') else {
        return false;
    };
    let Some(algorithm) = SignatureAlgorithm::from_prefix(prefix) else {
        return false;
    };
    // Uppercase hex would decode to the same bytes; hubs send lowercase and
    // anything else is treated as tampering.
    if !digest_hex
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return false;
    }
    let Ok(provided) = hex::decode(digest_hex) else {
        return false;
    };
    let Some(expected) = algorithm.mac(secret.as_bytes(), payload) else {
        return false;
    };

    expected.ct_eq(&provided).into()
}
