//! Account and credential endpoints.
//!
//! Endpoints:
//! - POST /v1/auth/register - Create a student or organizer account
//! - POST /v1/auth/login - Exchange email + password for a session token
//! - GET  /v1/auth/me - Current profile
//! - PUT  /v1/auth/profile - Patch profile fields
//! - POST /v1/auth/forgot-password - Email a single-use reset link
//! - PUT  /v1/auth/reset-password/{token} - Set a new password
//!
//! Google sign-in lives in [`super::oauth`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::oauth;
use super::views::{MessageResponse, SessionResponse, UserResponse};
use crate::api::authz;
use crate::api::error::{ApiError, ApiResultExt, FieldError};
use crate::api::request_context::RequestContext;
use crate::api::tokens::{issue_reset, redeem_reset, RESET_TOKEN_LIFETIME_MINUTES};
use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::db::{NewUser, ProfileUpdate};
use crate::model::{Role, User};
use crate::notify::Email;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", put(reset_password))
        .route("/google", get(oauth::google_start))
        .route("/google/callback", get(oauth::google_callback))
}

// ============================================================================
// Registration and login
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    organization: Option<String>,
}

impl RegisterRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "is required"));
        }
        if !looks_like_email(&self.email) {
            errors.push(FieldError::new("email", "must be a valid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(FieldError::new(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        if self.role == Some(Role::Organizer) && non_blank(self.organization.clone()).is_none() {
            errors.push(FieldError::new("organization", "is required for organizers"));
        }
        errors
    }
}

fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = ctx.request_id;

    let role = req.role.unwrap_or(Role::Student);
    if role == Role::Admin {
        return Err(ApiError::forbidden(
            "admin_self_registration",
            "Admin accounts cannot be created through registration",
        )
        .with_request_id(request_id));
    }

    let errors = req.validate();
    if !errors.is_empty() {
        return Err(
            ApiError::bad_request("invalid_registration", "Registration details are invalid")
                .with_details(errors)
                .with_request_id(request_id),
        );
    }

    let password_hash = hash_password(&req.password).await.or_api(&request_id)?;

    let organization = match role {
        Role::Organizer => non_blank(req.organization),
        _ => None,
    };

    let user = state
        .db()
        .users()
        .create(NewUser {
            name: req.name,
            email: req.email,
            password_hash: Some(password_hash),
            role,
            organization,
        })
        .await
        .or_api(&request_id)?;

    info!(user_id = %user.id, role = %user.role, request_id = %request_id, "Account registered");

    let session = session_for(&state, user).or_api(&request_id)?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = ctx.request_id;
    let invalid = || {
        ApiError::unauthorized("invalid_credentials", "Invalid email or password")
            .with_request_id(request_id.clone())
    };

    let user = state
        .db()
        .users()
        .find_by_email(&req.email)
        .await
        .or_api(&request_id)?
        .ok_or_else(invalid)?;

    // Accounts created through Google sign-in have no password until reset.
    let Some(stored_hash) = user.password_hash.as_deref() else {
        return Err(invalid());
    };

    if !verify_password(&req.password, stored_hash)
        .await
        .or_api(&request_id)?
    {
        return Err(invalid());
    }

    let session = session_for(&state, user).or_api(&request_id)?;
    Ok(Json(session))
}

pub(super) fn session_for(
    state: &AppState,
    user: User,
) -> Result<SessionResponse, crate::auth::AuthError> {
    let token = state.tokens().issue(user.id, user.role)?;
    Ok(SessionResponse {
        token,
        user: user.into(),
    })
}

// ============================================================================
// Profile
// ============================================================================

async fn me(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_authenticated(&ctx)?;

    let user = state
        .db()
        .users()
        .find_by_id(&actor.user_id)
        .await
        .or_api(&ctx.request_id)?
        .ok_or_else(|| {
            ApiError::not_found("user_not_found", "Account no longer exists")
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(UserResponse::from(user)))
}

/// Partial profile update. Omitted or blank fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfilePatch {
    name: Option<String>,
    organization: Option<String>,
    batch: Option<String>,
    roll_number: Option<String>,
    branch: Option<String>,
}

impl From<ProfilePatch> for ProfileUpdate {
    fn from(patch: ProfilePatch) -> Self {
        Self {
            name: non_blank(patch.name),
            organization: non_blank(patch.organization),
            batch: non_blank(patch.batch),
            roll_number: non_blank(patch.roll_number),
            branch: non_blank(patch.branch),
        }
    }
}

async fn update_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(patch): Json<ProfilePatch>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_authenticated(&ctx)?;

    if patch.organization.is_some() && actor.role != Role::Organizer {
        return Err(ApiError::bad_request(
            "invalid_profile",
            "Only organizer accounts have an organization",
        )
        .with_request_id(ctx.request_id));
    }

    let user = state
        .db()
        .users()
        .update_profile(&actor.user_id, patch.into())
        .await
        .or_api(&ctx.request_id)?
        .ok_or_else(|| {
            ApiError::not_found("user_not_found", "Account no longer exists")
                .with_request_id(ctx.request_id.clone())
        })?;

    Ok(Json(UserResponse::from(user)))
}

// ============================================================================
// Password reset
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ForgotPasswordRequest {
    email: String,
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a reset link has been sent";

/// Always answers 200 so the response does not reveal which emails exist.
async fn forgot_password(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = ctx.request_id;

    let user = state
        .db()
        .users()
        .find_by_email(&req.email)
        .await
        .or_api(&request_id)?;

    if let Some(user) = user {
        let (token, _expires_at) = issue_reset(&state.db().resets(), &user.id)
            .await
            .or_api(&request_id)?;
        let link = format!("{}/reset-password/{token}", state.client_url());
        state.effects().send_email(Email::password_reset(
            &user.email,
            &link,
            RESET_TOKEN_LIFETIME_MINUTES,
        ));
        info!(user_id = %user.id, request_id = %request_id, "Password reset issued");
    }

    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResetPasswordRequest {
    password: String,
}

async fn reset_password(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = ctx.request_id;

    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "invalid_password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        )
        .with_request_id(request_id));
    }

    let Some(reset) = redeem_reset(&state.db().resets(), &token)
        .await
        .or_api(&request_id)?
    else {
        return Err(ApiError::bad_request(
            "invalid_reset_token",
            "Reset link is invalid or has expired",
        )
        .with_request_id(request_id));
    };

    let password_hash = hash_password(&req.password).await.or_api(&request_id)?;
    state
        .db()
        .users()
        .set_password_hash(&reset.user_id, &password_hash)
        .await
        .or_api(&request_id)?;

    info!(user_id = %reset.user_id, request_id = %request_id, "Password reset completed");
    Ok(Json(MessageResponse::new("Password updated")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn request(role: Option<Role>, organization: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            name: "Asha".to_string(),
            email: "asha@campus.edu".to_string(),
            password: "hunter22".to_string(),
            role,
            organization: organization.map(str::to_string),
        }
    }

    #[rstest]
    #[case("asha@campus.edu", true)]
    #[case("  Asha@Campus.EDU ", true)]
    #[case("asha", false)]
    #[case("@campus.edu", false)]
    #[case("asha@localhost", false)]
    fn test_email_shape(#[case] email: &str, #[case] ok: bool) {
        assert_eq!(looks_like_email(email), ok);
    }

    #[test]
    fn test_organizer_needs_organization() {
        let errors = request(Some(Role::Organizer), Some("  ")).validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "organization");
        assert!(request(Some(Role::Organizer), Some("Robotics Club"))
            .validate()
            .is_empty());
    }

    #[test]
    fn test_short_password_rejected() {
        let mut req = request(None, None);
        req.password = "abc".to_string();
        let errors = req.validate();
        assert_eq!(errors[0].field, "password");
    }

    #[test]
    fn test_blank_patch_fields_are_ignored() {
        let update: ProfileUpdate = ProfilePatch {
            batch: Some(" ".to_string()),
            branch: Some(" CSE ".to_string()),
            ..ProfilePatch::default()
        }
        .into();
        assert_eq!(update.batch, None);
        assert_eq!(update.branch.as_deref(), Some("CSE"));
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let result: Result<ProfilePatch, _> =
            serde_json::from_str(r#"{"batch":"2026","is_approved":true}"#);
        assert!(result.is_err());
    }
}
