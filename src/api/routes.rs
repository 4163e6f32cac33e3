//! API route handlers.
//!
//! Every privileged handler validates the session first and resolves the
//! client-supplied path through the sandbox independently; resolutions are
//! never shared between operations.

use crate::api::{ApiError, AppState, CookieKey};
use crate::audit::AuditLevel;
use crate::files::{self, CreateKind, FsEntry};
use crate::sandbox;
use crate::session::{cookie, AuthenticatedUser, Identity};
use crate::users::UserStatus;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::SignedCookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/session", get(session_check))
        .route("/api/files", get(list_files))
        .route("/api/files/create", post(create_entry))
        .route("/api/files/chmod", post(change_mode))
        .with_state(state)
}

/// Validate the session cookie, returning the jar with the session cookie
/// refreshed on success or destroyed on failure.
async fn check_auth(
    state: &AppState,
    jar: SignedCookieJar<CookieKey>,
) -> (SignedCookieJar<CookieKey>, Result<AuthenticatedUser, ApiError>) {
    let claims = cookie::read_claims(&jar);
    match state.validator.validate(claims).await {
        Ok((user, refreshed)) => (cookie::write_claims(jar, &refreshed), Ok(user)),
        Err(e) => (cookie::clear(jar), Err(e.into())),
    }
}

fn audit_name(user: &AuthenticatedUser) -> (&str, &str) {
    let profile = user.identity.profile();
    (&profile.username, &profile.role)
}

// ---------------------------------------------------------------------------
// Session endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionSettings {
    inactivity_timeout_minutes: u64,
    disable_auto_logout: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user_id: String,
    username: String,
    role: String,
    status: UserStatus,
    grants: Vec<String>,
    is_impersonating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_username: Option<String>,
    settings: SessionSettings,
}

impl SessionResponse {
    fn from_user(user: &AuthenticatedUser) -> Self {
        let profile = user.identity.profile();
        let (is_impersonating, original_username) = match &user.identity {
            Identity::Normal(_) => (false, None),
            Identity::Impersonating {
                original_username, ..
            } => (true, Some(original_username.clone())),
        };
        Self {
            user_id: profile.id.clone(),
            username: profile.username.clone(),
            role: profile.role.clone(),
            status: profile.status,
            grants: profile.grants.clone(),
            is_impersonating,
            original_username,
            settings: SessionSettings {
                inactivity_timeout_minutes: user.inactivity_timeout_minutes,
                disable_auto_logout: user.disable_auto_logout,
            },
        }
    }
}

/// Login: verify credentials, create the session record and signed cookie.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: SignedCookieJar<CookieKey>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let profile = match state
        .users
        .authenticate(&request.username, &request.password)
        .await
    {
        Some(profile) => profile,
        None => {
            info!(username = %request.username, "Login rejected");
            state.audit.log_event(
                &request.username,
                "",
                "login_failed",
                AuditLevel::Warning,
                None,
            );
            return (
                axum::http::StatusCode::UNAUTHORIZED,
                cookie::clear(jar),
                Json(serde_json::json!({ "error": "Invalid username or password" })),
            )
                .into_response();
        }
    };

    let record = match state.validator.store().create(
        &profile,
        state.session.inactivity_timeout_minutes,
        state.session.disable_auto_logout,
    ) {
        Ok(record) => record,
        Err(e) => return ApiError::Internal(e).into_response(),
    };

    let claims = cookie::SessionClaims {
        is_logged_in: true,
        user_id: record.user_id.clone(),
        username: record.username.clone(),
        role: record.role.clone(),
        token: record.token.clone(),
        last_activity: record.last_activity,
        is_impersonating: false,
        original_username: None,
    };

    info!(username = %profile.username, role = %profile.role, "Login");
    state
        .audit
        .log_event(&profile.username, &profile.role, "login", AuditLevel::Info, None);

    let user = AuthenticatedUser {
        identity: Identity::Normal(profile),
        inactivity_timeout_minutes: record.inactivity_timeout_minutes,
        disable_auto_logout: record.disable_auto_logout,
    };
    (
        cookie::write_claims(jar, &claims),
        Json(SessionResponse::from_user(&user)),
    )
        .into_response()
}

/// Logout: delete the record, destroy the cookie. Always succeeds.
async fn logout(State(state): State<Arc<AppState>>, jar: SignedCookieJar<CookieKey>) -> Response {
    if let Some(claims) = cookie::read_claims(&jar) {
        if let Err(e) = state
            .validator
            .store()
            .delete(&claims.username, &claims.role)
        {
            warn!(username = %claims.username, "Failed to delete session record: {}", e);
        }
        state
            .audit
            .log_event(&claims.username, &claims.role, "logout", AuditLevel::Info, None);
    }

    (cookie::clear(jar), Json(serde_json::json!({ "ok": true }))).into_response()
}

/// Session check: cookie-only input, 401 on any validator failure.
async fn session_check(State(state): State<Arc<AppState>>, jar: SignedCookieJar<CookieKey>) -> Response {
    let (jar, auth) = check_auth(&state, jar).await;
    match auth {
        Ok(user) => (jar, Json(SessionResponse::from_user(&user))).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

// ---------------------------------------------------------------------------
// File endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_list_path")]
    path: String,
}

fn default_list_path() -> String {
    "/".to_string()
}

#[derive(Debug, Serialize)]
struct ListResponse {
    path: String,
    files: Vec<FsEntry>,
}

/// List a directory inside the sandbox.
async fn list_files(
    State(state): State<Arc<AppState>>,
    jar: SignedCookieJar<CookieKey>,
    Query(query): Query<ListQuery>,
) -> Response {
    let (jar, auth) = check_auth(&state, jar).await;
    if let Err(e) = auth {
        return (jar, e).into_response();
    }

    let result = sandbox::resolve(&state.base_dir, &query.path)
        .map_err(ApiError::from)
        .and_then(|safe_path| files::list_directory(&safe_path).map_err(ApiError::from));

    match result {
        Ok(files) => (
            jar,
            Json(ListResponse {
                path: query.path,
                files,
            }),
        )
            .into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    path: String,
    name: String,
    #[serde(rename = "type")]
    kind: CreateKind,
}

/// Create a file or folder inside the sandbox.
async fn create_entry(
    State(state): State<Arc<AppState>>,
    jar: SignedCookieJar<CookieKey>,
    Json(request): Json<CreateRequest>,
) -> Response {
    let (jar, auth) = check_auth(&state, jar).await;
    let user = match auth {
        Ok(user) => user,
        Err(e) => return (jar, e).into_response(),
    };

    let result = sandbox::resolve(&state.base_dir, &request.path)
        .map_err(ApiError::from)
        .and_then(|safe_dir| {
            files::create_entry(&safe_dir, &request.name, request.kind).map_err(ApiError::from)
        });

    match result {
        Ok(()) => {
            let (username, role) = audit_name(&user);
            state.audit.log_event(
                username,
                role,
                "file_create",
                AuditLevel::Info,
                Some(serde_json::json!({
                    "path": request.path,
                    "name": request.name,
                    "type": request.kind,
                })),
            );
            (jar, Json(serde_json::json!({ "ok": true }))).into_response()
        }
        Err(e) => (jar, e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ChmodRequest {
    path: String,
    mode: String,
}

/// Change permission bits of an entry inside the sandbox.
async fn change_mode(
    State(state): State<Arc<AppState>>,
    jar: SignedCookieJar<CookieKey>,
    Json(request): Json<ChmodRequest>,
) -> Response {
    let (jar, auth) = check_auth(&state, jar).await;
    let user = match auth {
        Ok(user) => user,
        Err(e) => return (jar, e).into_response(),
    };

    let result = sandbox::resolve(&state.base_dir, &request.path)
        .map_err(ApiError::from)
        .and_then(|safe_path| {
            files::change_mode(&safe_path, &request.mode).map_err(ApiError::from)
        });

    match result {
        Ok(()) => {
            let (username, role) = audit_name(&user);
            state.audit.log_event(
                username,
                role,
                "file_chmod",
                AuditLevel::Info,
                Some(serde_json::json!({
                    "path": request.path,
                    "mode": request.mode,
                })),
            );
            (jar, Json(serde_json::json!({ "ok": true }))).into_response()
        }
        Err(e) => (jar, e).into_response(),
    }
}
