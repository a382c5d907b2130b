use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Wraps a bot token with secrecy protection (zeroized on drop, redacted
/// in Debug). The plaintext lives only in process memory; the store keeps
/// a masked preview and a one-way hash.
#[derive(Clone)]
pub struct BotToken(SecretString);

impl BotToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for BotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BotToken([REDACTED])")
    }
}

/// Display form of a token: every character masked except the last 4.
/// Counts characters, not bytes; tokens are opaque strings.
pub fn mask_token(token: &str) -> String {
    let char_count = token.chars().count();
    if char_count < 4 {
        return "****".to_string();
    }
    let masked = char_count - 4;
    let mut preview = "*".repeat(masked);
    preview.extend(token.chars().skip(masked));
    preview
}

/// One-way verification hash of a token (hex SHA-256). Used to detect a
/// re-submitted token; the plaintext is never recoverable from it.
pub fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
