//! Persisted session records.
//!
//! One live record per (username, role), stored as a JSON document whose
//! name is derived from the sanitized username and role. The record is the
//! server-side proof of login, independent of the client-held cookie.

use crate::kv::{sanitize_name, KvStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::users::UserProfile;

/// Server-persisted session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub token: String,
    pub last_activity: DateTime<Utc>,
    pub inactivity_timeout_minutes: u64,
    pub disable_auto_logout: bool,
    #[serde(default)]
    pub is_impersonating: bool,
    #[serde(default)]
    pub original_username: Option<String>,
}

/// Derive the store name for a (username, role) pair.
///
/// Both parts are sanitized before they touch a filename.
pub fn record_key(username: &str, role: &str) -> String {
    format!("session_{}_{}", sanitize_name(username), sanitize_name(role))
}

/// Generate a cryptographically random session token.
fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Store of session records over the key/value store.
pub struct SessionStore {
    kv: KvStore,
}

impl SessionStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Create and persist a fresh record for a logged-in profile.
    pub fn create(
        &self,
        profile: &UserProfile,
        inactivity_timeout_minutes: u64,
        disable_auto_logout: bool,
    ) -> Result<SessionRecord> {
        let record = SessionRecord {
            user_id: profile.id.clone(),
            username: profile.username.clone(),
            role: profile.role.clone(),
            token: generate_token(),
            last_activity: Utc::now(),
            inactivity_timeout_minutes,
            disable_auto_logout,
            is_impersonating: false,
            original_username: None,
        };
        self.save(&record)?;
        Ok(record)
    }

    pub fn load(&self, username: &str, role: &str) -> Result<Option<SessionRecord>> {
        self.kv.load(&record_key(username, role))
    }

    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        self.kv
            .save(&record_key(&record.username, &record.role), record)
    }

    /// Delete the record for (username, role). Returns true if one existed.
    pub fn delete(&self, username: &str, role: &str) -> Result<bool> {
        self.kv.delete(&record_key(username, role))
    }
}
