//! Signed session cookie handling.
//!
//! The cookie carries a short-lived signed claim set mirroring a subset of
//! the persisted session record. It is never trusted on its own: the
//! validator requires a matching, token-equal record before honoring it.

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cookie name for the session claims.
pub const SESSION_COOKIE: &str = "paneld_session";

/// Claim set stored in the signed session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub is_logged_in: bool,
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub token: String,
    pub last_activity: DateTime<Utc>,
    /// Impersonation overlay: cookie-only, never written to stored profiles.
    #[serde(default)]
    pub is_impersonating: bool,
    #[serde(default)]
    pub original_username: Option<String>,
}

/// Read and parse claims from the jar, if the cookie is present and intact.
pub fn read_claims<K>(jar: &SignedCookieJar<K>) -> Option<SessionClaims> {
    let cookie = jar.get(SESSION_COOKIE)?;
    match serde_json::from_str(cookie.value()) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!("Discarding unparseable session cookie: {}", e);
            None
        }
    }
}

fn build_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}

/// Write claims into the jar, replacing any existing session cookie.
pub fn write_claims<K>(jar: SignedCookieJar<K>, claims: &SessionClaims) -> SignedCookieJar<K> {
    // Serialization of a plain struct cannot fail.
    let value = serde_json::to_string(claims).unwrap_or_default();
    jar.add(build_cookie(value))
}

/// Destroy the session cookie. This is what actually denies access on the
/// client side; record deletion is best-effort on top.
pub fn clear<K>(jar: SignedCookieJar<K>) -> SignedCookieJar<K> {
    jar.remove(build_cookie(String::new()))
}
