use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Smallest accepted token size in bytes (128 bits).
pub const MIN_TOKEN_BYTES: usize = 16;

/// Opaque per-session authenticity token.
///
/// The value is URL-safe base64 without padding, so it can travel in form
/// fields, headers and JSON bodies unescaped. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Generate `bytes` random bytes from the operating system CSPRNG.
    /// Sizes below [`MIN_TOKEN_BYTES`] are raised to it.
    pub fn generate(bytes: usize) -> Self {
        let mut raw = vec![0u8; bytes.max(MIN_TOKEN_BYTES)];
        OsRng.fill_bytes(&mut raw);
        Self(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Wrap a value read back from session storage.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Exact comparison against a submitted value in time independent of
    /// where the first differing byte is.
    pub fn matches(&self, submitted: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), submitted.as_bytes())
    }
}

impl std::fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CsrfToken(<redacted>)")
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_generation() {
        let token = CsrfToken::generate(32);
        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(token.as_str().len(), 43);
        assert!(
            token
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_minimum_entropy_enforced() {
        let token = CsrfToken::generate(4);
        let decoded = URL_SAFE_NO_PAD.decode(token.as_str()).unwrap();
        assert_eq!(decoded.len(), MIN_TOKEN_BYTES);
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..1000)
            .map(|_| CsrfToken::generate(32).into_string())
            .collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_matches_is_exact() {
        let token = CsrfToken::new("abcDEF123");
        assert!(token.matches("abcDEF123"));
        assert!(!token.matches("abcDEF123x"));
        assert!(!token.matches("abcDEF12"));
        assert!(!token.matches("ABCDEF123"));
        assert!(!token.matches(""));
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = CsrfToken::new("secret-value");
        assert!(!format!("{:?}", token).contains("secret-value"));
    }

    #[test]
    fn test_serde_transparent() {
        let token = CsrfToken::new("v1");
        assert_eq!(serde_json::to_value(&token).unwrap(), serde_json::json!("v1"));
    }
}
