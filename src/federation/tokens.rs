use rand::rngs::OsRng;
use rand::RngCore;

/// Source of the per-feed `verify_token` and `secret`.
///
/// Injected into the sync layer so tests can supply fixed tokens.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> String;
}

/// 32 random bytes from the OS CSPRNG, hex-encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn token(&self) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_hex_and_distinct() {
        let a = OsTokenSource.token();
        let b = OsTokenSource.token();
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
