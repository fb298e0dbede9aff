//! Request-scoped context extracted from HTTP requests.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use campus_id::RequestId;

use crate::api::error::ApiError;
use crate::state::AppState;
use crate::workflow::Actor;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id plus the caller, if a bearer token was presented.
///
/// A malformed or expired token is rejected outright rather than treated
/// as anonymous.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub actor: Option<Actor>,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn bearer_token(headers: &HeaderMap, request_id: &str) -> Result<Option<String>, ApiError> {
    let Some(auth_value) = header_string(headers, AUTHORIZATION_HEADER) else {
        return Ok(None);
    };

    let auth_value = auth_value.trim();
    let Some(token) = auth_value.strip_prefix("Bearer ") else {
        return Err(ApiError::unauthorized(
            "invalid_authorization",
            "Authorization must be a Bearer token",
        )
        .with_request_id(request_id));
    };

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized(
            "invalid_authorization",
            "Authorization Bearer token cannot be empty",
        )
        .with_request_id(request_id));
    }

    Ok(Some(token.to_string()))
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request_id = header_string(&parts.headers, REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty() && id.len() <= 128)
            .unwrap_or_else(|| RequestId::new().to_string());

        let actor = match bearer_token(&parts.headers, &request_id)? {
            Some(token) => {
                let claims = state.tokens().verify(&token).map_err(|e| {
                    tracing::debug!(error = %e, request_id = %request_id, "Rejected bearer token");
                    ApiError::unauthorized("invalid_token", "Token is invalid or expired")
                        .with_request_id(request_id.clone())
                })?;
                Some(Actor {
                    user_id: claims.sub,
                    role: claims.role,
                })
            }
            None => None,
        };

        Ok(Self { request_id, actor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION_HEADER, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        assert_eq!(bearer_token(&HeaderMap::new(), "req").unwrap(), None);
    }

    #[test]
    fn test_bearer_token_is_extracted() {
        assert_eq!(
            bearer_token(&headers("Bearer abc.def.ghi"), "req").unwrap(),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn test_non_bearer_scheme_is_rejected() {
        let err = bearer_token(&headers("Basic dXNlcjpwdw=="), "req_1").unwrap_err();
        assert_eq!(err.code(), "invalid_authorization");
        assert_eq!(err.problem.request_id, "req_1");
    }

    #[test]
    fn test_empty_bearer_is_rejected() {
        assert!(bearer_token(&headers("Bearer   "), "req").is_err());
    }
}
