//! HTTP API: shared state, router, and handlers.

pub mod error;
pub mod routes;

use crate::audit::AuditLog;
use crate::config::SessionConfig;
use crate::session::SessionValidator;
use crate::users::UserStore;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::path::PathBuf;
use std::sync::Arc;

pub use error::ApiError;
pub use routes::router;

/// State shared by all API handlers.
pub struct AppState {
    /// Reconciles cookie claims with persisted session records
    pub validator: SessionValidator,
    /// Canonical user profiles and credentials
    pub users: Arc<UserStore>,
    /// Fire-and-forget audit event log
    pub audit: AuditLog,
    /// Sandbox base for all file operations
    pub base_dir: PathBuf,
    /// Session defaults applied at login
    pub session: SessionConfig,
    /// Key for signing session cookies
    pub cookie_key: Key,
}

/// Newtype over the cookie [`Key`] so it can be extracted from
/// `Arc<AppState>`; the orphan rule forbids implementing [`FromRef`]
/// for the foreign `Key` type directly.
#[derive(Clone)]
pub struct CookieKey(pub Key);

impl FromRef<Arc<AppState>> for CookieKey {
    fn from_ref(state: &Arc<AppState>) -> CookieKey {
        CookieKey(state.cookie_key.clone())
    }
}

impl From<CookieKey> for Key {
    fn from(key: CookieKey) -> Key {
        key.0
    }
}
