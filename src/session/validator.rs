//! Session validation: reconciling cookie claims with the persisted record.
//!
//! One pure decision path with explicit side effects: every success
//! refreshes both layers (sliding inactivity window), every failure
//! best-effort deletes the record. The HTTP layer destroys the cookie on
//! failure (that is what actually denies access), so record-deletion
//! failures are logged and never escalated.

use crate::session::cookie::SessionClaims;
use crate::session::store::SessionStore;
use crate::users::{UserProfile, UserStore};
use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a session failed validation. All kinds surface as 401; the sub-kind
/// goes to the server log only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no session")]
    NoSession,

    #[error("session record not found")]
    SessionNotFound,

    #[error("session token mismatch")]
    InvalidToken,

    #[error("session expired due to inactivity")]
    InactivityTimeout,

    #[error("session user no longer exists")]
    ProfileNotFound,
}

/// The effective identity of a validated request.
///
/// Impersonation is a cookie-only overlay: the effective profile is the
/// impersonated user's canonical profile, and the original username rides
/// along without ever touching stored profiles.
#[derive(Debug, Clone)]
pub enum Identity {
    Normal(UserProfile),
    Impersonating {
        user: UserProfile,
        original_username: String,
    },
}

impl Identity {
    /// The profile this request acts as.
    pub fn profile(&self) -> &UserProfile {
        match self {
            Identity::Normal(profile) => profile,
            Identity::Impersonating { user, .. } => user,
        }
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    pub inactivity_timeout_minutes: u64,
    pub disable_auto_logout: bool,
}

/// Reconciles the two session layers on every privileged request.
pub struct SessionValidator {
    store: SessionStore,
    users: Arc<UserStore>,
}

impl SessionValidator {
    pub fn new(store: SessionStore, users: Arc<UserStore>) -> Self {
        Self { store, users }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Best-effort record deletion on a failure path.
    fn discard_record(&self, username: &str, role: &str) {
        if let Err(e) = self.store.delete(username, role) {
            warn!(username, role, "Failed to delete session record: {}", e);
        }
    }

    /// Validate cookie claims against the persisted record.
    ///
    /// On success returns the authenticated user and the refreshed claims
    /// the caller must write back into the cookie. On failure the caller
    /// must destroy the cookie; the record has already been disposed of.
    pub async fn validate(
        &self,
        claims: Option<SessionClaims>,
    ) -> Result<(AuthenticatedUser, SessionClaims), AuthError> {
        let claims = claims.ok_or(AuthError::NoSession)?;
        if !claims.is_logged_in
            || claims.user_id.is_empty()
            || claims.username.is_empty()
            || claims.role.is_empty()
        {
            return Err(AuthError::NoSession);
        }

        let mut record = match self.store.load(&claims.username, &claims.role) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(AuthError::SessionNotFound),
            Err(e) => {
                warn!(username = %claims.username, "Failed to load session record: {}", e);
                return Err(AuthError::SessionNotFound);
            }
        };

        if claims.token != record.token {
            debug!(username = %claims.username, "Session token mismatch");
            self.discard_record(&claims.username, &claims.role);
            return Err(AuthError::InvalidToken);
        }

        let now = Utc::now();
        if !record.disable_auto_logout {
            let idle = now.signed_duration_since(record.last_activity);
            if idle > Duration::minutes(record.inactivity_timeout_minutes as i64) {
                debug!(
                    username = %claims.username,
                    idle_minutes = idle.num_minutes(),
                    "Session expired due to inactivity"
                );
                self.discard_record(&claims.username, &claims.role);
                return Err(AuthError::InactivityTimeout);
            }
        }

        // Sliding refresh: touch both layers. A lost record write only
        // stales the timeout clock, so it is logged and tolerated.
        record.last_activity = now;
        if let Err(e) = self.store.save(&record) {
            warn!(username = %record.username, "Failed to refresh session record: {}", e);
        }

        let profile = match self.users.load_user_by_id(&record.user_id).await {
            Some(profile) => profile,
            None => {
                warn!(user_id = %record.user_id, "Session references missing profile");
                self.discard_record(&claims.username, &claims.role);
                return Err(AuthError::ProfileNotFound);
            }
        };

        // Profile is authoritative for role/status/grants; the cookie is
        // authoritative for the impersonation overlay.
        let identity = match (claims.is_impersonating, &claims.original_username) {
            (true, Some(original)) => Identity::Impersonating {
                user: profile,
                original_username: original.clone(),
            },
            _ => Identity::Normal(profile),
        };

        let refreshed = SessionClaims {
            is_logged_in: true,
            user_id: record.user_id.clone(),
            username: record.username.clone(),
            role: record.role.clone(),
            token: record.token.clone(),
            last_activity: now,
            is_impersonating: claims.is_impersonating,
            original_username: claims.original_username.clone(),
        };

        Ok((
            AuthenticatedUser {
                identity,
                inactivity_timeout_minutes: record.inactivity_timeout_minutes,
                disable_auto_logout: record.disable_auto_logout,
            },
            refreshed,
        ))
    }
}
