use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const LOGIN_TOKEN_BYTES: usize = 32;

pub const LOGIN_PATH: &str = "/pollbot/login";

/// Fresh unguessable token, safe to place in a query string unescaped.
pub fn generate_login_token() -> String {
    let mut buf = [0u8; LOGIN_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut buf);
    BASE64_URL_SAFE_NO_PAD.encode(buf)
}

/// Login link delivered to a user in a direct conversation.
pub fn login_link(http_prefix: &str, token: &str, username: &str) -> String {
    format!(
        "{}{}?token={}&username={}",
        http_prefix.trim_end_matches('/'),
        LOGIN_PATH,
        urlencoding::encode(token),
        urlencoding::encode(username)
    )
}

/// Random secret for signing session cookies when none is configured.
pub fn generate_secret() -> String {
    let mut buf = [0u8; 48];
    rand::thread_rng().fill_bytes(&mut buf);
    BASE64_URL_SAFE_NO_PAD.encode(buf)
}

/// Tokens are persisted only as their SHA-256 digest.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Constant-time string equality.
pub fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut out = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        out |= x ^ y;
    }
    out == 0
}
