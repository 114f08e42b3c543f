use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;

/// Random bytes behind every CSRF state and session id.
pub const TOKEN_ENTROPY_BYTES: usize = 32;

/// Generate a URL-safe random token (32 bytes, base64url, 43 characters).
pub fn random_token() -> String {
    let random_bytes: [u8; TOKEN_ENTROPY_BYTES] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generate the CSRF state for one authorization request.
pub fn generate_state() -> String {
    random_token()
}
