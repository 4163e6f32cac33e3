//! User profiles and credentials.
//!
//! Handles password hashing (argon2) and the profile store consulted by the
//! session validator. Profiles are canonical for role/status/grants; the
//! session layer only ever references them by id.

use crate::kv::KvStore;
use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Disabled,
}

/// Canonical user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub role: String,
    pub status: UserStatus,
    pub grants: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored user: profile plus credentials. The hash never leaves this module.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    profile: UserProfile,
    password_hash: String,
}

const USERS_DOC: &str = "users";

/// File-backed store of users, keyed by user id.
pub struct UserStore {
    kv: KvStore,
    users: RwLock<HashMap<String, StoredUser>>,
}

impl UserStore {
    /// Open the user store, loading existing users from disk.
    pub fn open(kv: KvStore) -> Result<Self> {
        let users = kv
            .load::<HashMap<String, StoredUser>>(USERS_DOC)?
            .unwrap_or_default();
        Ok(Self {
            kv,
            users: RwLock::new(users),
        })
    }

    /// Hash a password using Argon2id.
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    async fn persist(&self) -> Result<()> {
        let users = self.users.read().await;
        self.kv.save(USERS_DOC, &*users)
    }

    /// Create a new user and return its profile.
    pub async fn create_user(&self, username: &str, role: &str, password: &str) -> Result<UserProfile> {
        let password_hash = Self::hash_password(password)?;
        let now = Utc::now();
        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            role: role.to_string(),
            status: UserStatus::Active,
            grants: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        {
            let mut users = self.users.write().await;
            if users
                .values()
                .any(|u| u.profile.username == username && u.profile.role == role)
            {
                return Err(anyhow!("User already exists: {username} ({role})"));
            }
            users.insert(
                profile.id.clone(),
                StoredUser {
                    profile: profile.clone(),
                    password_hash,
                },
            );
        }

        self.persist().await?;
        Ok(profile)
    }

    /// Delete a user by username. Returns true if a user was removed.
    pub async fn delete_user(&self, username: &str) -> Result<bool> {
        let removed = {
            let mut users = self.users.write().await;
            let before = users.len();
            users.retain(|_, u| u.profile.username != username);
            users.len() != before
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Load the canonical profile for a user id.
    pub async fn load_user_by_id(&self, id: &str) -> Option<UserProfile> {
        let users = self.users.read().await;
        users.get(id).map(|u| u.profile.clone())
    }

    /// List all profiles.
    pub async fn list_users(&self) -> Vec<UserProfile> {
        let users = self.users.read().await;
        let mut profiles: Vec<UserProfile> = users.values().map(|u| u.profile.clone()).collect();
        profiles.sort_by(|a, b| a.username.cmp(&b.username));
        profiles
    }

    /// Verify credentials and return the profile if the account may log in.
    ///
    /// Returns `None` for unknown users, wrong passwords, and disabled
    /// accounts; callers cannot distinguish which.
    pub async fn authenticate(&self, username: &str, password: &str) -> Option<UserProfile> {
        let users = self.users.read().await;
        let user = users.values().find(|u| u.profile.username == username)?;
        if !Self::verify_password(password, &user.password_hash) {
            return None;
        }
        if user.profile.status != UserStatus::Active {
            return None;
        }
        Some(user.profile.clone())
    }
}
