//! Google sign-in.
//!
//! The `state` parameter is a short-lived signed token, so nothing has to be
//! stored between the redirect and the callback. The callback hands the
//! session to the web client through a redirect.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use reqwest::Url;
use serde::Deserialize;
use tracing::{info, warn};

use super::auth::session_for;
use crate::api::error::{ApiError, ApiResultExt};
use crate::api::request_context::RequestContext;
use crate::auth::google::GoogleProfile;
use crate::db::{Database, DbError, NewUser, EMAIL_CONSTRAINT};
use crate::model::{Role, User};
use crate::state::AppState;

fn oauth_disabled(request_id: &str) -> ApiError {
    ApiError::not_found("oauth_disabled", "Google sign-in is not configured")
        .with_request_id(request_id)
}

/// GET /v1/auth/google
pub(super) async fn google_start(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Redirect, ApiError> {
    let Some(google) = state.google() else {
        return Err(oauth_disabled(&ctx.request_id));
    };

    let oauth_state = state
        .tokens()
        .issue_state(&ctx.request_id)
        .or_api(&ctx.request_id)?;
    let url = google.authorize_url(&oauth_state).or_api(&ctx.request_id)?;

    Ok(Redirect::to(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub(super) struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /v1/auth/google/callback
///
/// Failures redirect back to the client's login page instead of rendering a
/// problem document, since a browser is on the other end.
pub(super) async fn google_callback(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let Some(google) = state.google() else {
        return Err(oauth_disabled(&ctx.request_id));
    };

    let failure = || {
        let target = format!("{}/login?error=oauth_failed", state.client_url());
        Redirect::to(&target).into_response()
    };

    if let Some(error) = query.error {
        warn!(request_id = %ctx.request_id, error = %error, "Google consent denied");
        return Ok(failure());
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Ok(failure());
    };

    if let Err(e) = state.tokens().verify_state(&oauth_state) {
        warn!(request_id = %ctx.request_id, error = %e, "Invalid OAuth state");
        return Ok(failure());
    }

    let profile = match google.exchange(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(request_id = %ctx.request_id, error = %e, "Google code exchange failed");
            return Ok(failure());
        }
    };

    let user = find_or_create(state.db(), profile)
        .await
        .or_api(&ctx.request_id)?;
    let session = session_for(&state, user).or_api(&ctx.request_id)?;

    let user_json = serde_json::to_string(&session.user)
        .map_err(|e| ApiError::unexpected(e).with_request_id(&ctx.request_id))?;
    let target = Url::parse_with_params(
        &format!("{}/oauth-success", state.client_url()),
        &[("token", session.token.as_str()), ("user", user_json.as_str())],
    )
    .map_err(|e| ApiError::unexpected(e).with_request_id(&ctx.request_id))?;

    Ok(Redirect::to(target.as_str()).into_response())
}

/// Existing accounts sign in by email; new ones become students without a
/// password.
async fn find_or_create(db: &Database, profile: GoogleProfile) -> Result<User, DbError> {
    let users = db.users();
    if let Some(user) = users.find_by_email(&profile.email).await? {
        return Ok(user);
    }

    let name = profile
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| display_name_from_email(&profile.email));

    let created = users
        .create(NewUser {
            name,
            email: profile.email.clone(),
            password_hash: None,
            role: Role::Student,
            organization: None,
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = %user.id, "Account created through Google sign-in");
            Ok(user)
        }
        // Lost a race with a concurrent first sign-in.
        Err(e) if e.unique_constraint() == Some(EMAIL_CONSTRAINT) => users
            .find_by_email(&profile.email)
            .await?
            .ok_or(e),
        Err(e) => Err(e),
    }
}

fn display_name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}
