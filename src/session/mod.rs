//! Session management: dual-layer state and validation.
//!
//! Provides:
//! - Signed cookie claims (the client-held layer)
//! - Persisted session records (the server-held layer)
//! - The validator reconciling the two on every privileged request

pub mod cookie;
pub mod store;
pub mod validator;

pub use cookie::{SessionClaims, SESSION_COOKIE};
pub use store::{SessionRecord, SessionStore};
pub use validator::{AuthError, AuthenticatedUser, Identity, SessionValidator};
