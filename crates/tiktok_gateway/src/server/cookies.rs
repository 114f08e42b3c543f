use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use sha2::{Digest, Sha512};

use crate::auth::SessionId;
use crate::config::Secret;

pub const SESSION_COOKIE_NAME: &str = "tiktok_session";

/// Derive the 64-byte cookie signing key from `SESSION_SECRET`.
pub fn cookie_key(secret: &Secret) -> Key {
    let digest = Sha512::digest(secret.expose().as_bytes());
    Key::from(digest.as_slice())
}

/// Create the signed session cookie.
pub(crate) fn session_cookie(id: &SessionId, ttl: Duration, secure: bool) -> Cookie<'static> {
    let max_age = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

    Cookie::build((SESSION_COOKIE_NAME, id.as_str().to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// Create removal cookie for session.
pub(crate) fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

/// Session id from a correctly signed cookie. Tampered values never verify.
pub(crate) fn session_id(jar: &SignedCookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE_NAME)
        .and_then(|cookie| SessionId::parse(cookie.value()))
}
