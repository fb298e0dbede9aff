use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::db::{DbError, EMAIL_CONSTRAINT, EVENT_STUDENT_CONSTRAINT, ROLL_NUMBER_CONSTRAINT};
use crate::media::MediaError;
use crate::workflow::WorkflowError;

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub code: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ProblemDetails {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let title = status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string();
        Self {
            r#type: format!("https://campusconnect.dev/problems/{code}"),
            title,
            status: status.as_u16(),
            detail: detail.into(),
            instance: None,
            code,
            request_id: "unknown".to_string(),
            details: None,
        }
    }

    fn set_request_id(&mut self, request_id: impl Into<String>) {
        let request_id = request_id.into();
        self.request_id = request_id.clone();
        if self.instance.is_none() {
            self.instance = Some(request_id);
        }
    }

    fn set_details(&mut self, details: Vec<FieldError>) {
        self.details = Some(details);
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
    /// Underlying cause of a server-side failure. Logged, never rendered.
    cause: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self {
            status,
            problem,
            cause: None,
        }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    pub fn payload_too_large(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, code, message)
    }

    pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, code, message)
    }

    pub fn service_unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, code, message)
    }

    /// A generic 500 that keeps the real cause for the log.
    pub fn unexpected(cause: impl std::fmt::Display) -> Self {
        let mut err = Self::internal("internal_error", "An unexpected error occurred");
        err.cause = Some(cause.to_string());
        err
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.problem.set_request_id(request_id);
        self
    }

    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.problem.set_details(details);
        self
    }

    pub fn code(&self) -> &str {
        &self.problem.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                request_id = %self.problem.request_id,
                code = %self.problem.code,
                error = self.cause.as_deref().unwrap_or(&self.problem.detail),
                "Request failed"
            );
        }

        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

/// Attach the request id while converting a domain error.
pub trait ApiResultExt<T> {
    fn or_api(self, request_id: &str) -> Result<T, ApiError>;
}

impl<T, E> ApiResultExt<T> for Result<T, E>
where
    E: Into<ApiError>,
{
    fn or_api(self, request_id: &str) -> Result<T, ApiError> {
        self.map_err(|e| e.into().with_request_id(request_id))
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e.unique_constraint() {
            Some(EMAIL_CONSTRAINT) => {
                ApiError::conflict("email_taken", "An account with this email already exists")
            }
            Some(ROLL_NUMBER_CONSTRAINT) => ApiError::conflict(
                "roll_number_taken",
                "This roll number is already registered to another account",
            ),
            Some(EVENT_STUDENT_CONSTRAINT) => {
                ApiError::conflict("already_registered", "Already registered for this event")
            }
            Some(other) => ApiError::conflict("conflict", format!("Duplicate value ({other})")),
            None => ApiError::unexpected(e),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::TooLarge { .. } => ApiError::payload_too_large("poster_too_large", e.to_string()),
            MediaError::NotAnImage(_) => ApiError::bad_request("invalid_poster", e.to_string()),
            MediaError::Disabled => {
                ApiError::service_unavailable("poster_uploads_disabled", e.to_string())
            }
            MediaError::Http(_) | MediaError::Rejected(_) => {
                tracing::warn!(error = %e, "Image host call failed");
                ApiError::bad_gateway("image_host_error", "The image host could not store the poster")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken(_) => {
                ApiError::unauthorized("invalid_token", "Token is invalid or expired")
            }
            AuthError::Provider(_) | AuthError::ProviderRejected(_) => {
                tracing::warn!(error = %e, "OAuth exchange failed");
                ApiError::unauthorized("oauth_failed", "Sign-in with the provider failed")
            }
            other => ApiError::unexpected(other),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        let message = e.to_string();
        match e {
            WorkflowError::StudentsOnly => ApiError::forbidden("students_only", message),
            WorkflowError::OrganizersOnly => ApiError::forbidden("organizers_only", message),
            WorkflowError::OrganizerPending => ApiError::forbidden("organizer_pending", message),
            WorkflowError::NotOwner => ApiError::forbidden("not_owner", message),
            WorkflowError::EventNotFound => ApiError::not_found("event_not_found", message),
            WorkflowError::UserNotFound => ApiError::not_found("user_not_found", message),
            WorkflowError::OrganizerNotPending => {
                ApiError::conflict("organizer_not_pending", message)
            }
            WorkflowError::ProfileIncomplete { missing } => {
                let details = missing
                    .iter()
                    .map(|field| FieldError::new(*field, "required before registering"))
                    .collect();
                ApiError::bad_request("profile_incomplete", message).with_details(details)
            }
            WorkflowError::AlreadyRegistered => ApiError::conflict("already_registered", message),
            WorkflowError::Media(e) => e.into(),
            WorkflowError::Db(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(WorkflowError::StudentsOnly, StatusCode::FORBIDDEN, "students_only")]
    #[case(WorkflowError::EventNotFound, StatusCode::NOT_FOUND, "event_not_found")]
    #[case(WorkflowError::AlreadyRegistered, StatusCode::CONFLICT, "already_registered")]
    #[case(WorkflowError::OrganizerPending, StatusCode::FORBIDDEN, "organizer_pending")]
    #[case(
        WorkflowError::ProfileIncomplete { missing: vec!["batch"] },
        StatusCode::BAD_REQUEST,
        "profile_incomplete"
    )]
    fn workflow_errors_map_to_problems(
        #[case] err: WorkflowError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        let api: ApiError = err.into();
        assert_eq!(api.status, status);
        assert_eq!(api.code(), code);
    }

    #[rstest]
    #[case(EMAIL_CONSTRAINT, "email_taken")]
    #[case(ROLL_NUMBER_CONSTRAINT, "roll_number_taken")]
    #[case(EVENT_STUDENT_CONSTRAINT, "already_registered")]
    fn unique_violations_are_conflicts(#[case] constraint: &str, #[case] code: &str) {
        let api: ApiError = DbError::UniqueViolation {
            constraint: constraint.to_string(),
        }
        .into();
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.code(), code);
    }

    #[test]
    fn oversized_poster_is_413() {
        let api: ApiError = MediaError::TooLarge { size: 3, max: 2 }.into();
        assert_eq!(api.status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn internal_errors_hide_the_cause() {
        let api = ApiError::unexpected("connection reset by peer").with_request_id("req_1");
        assert_eq!(api.problem.detail, "An unexpected error occurred");
        assert_eq!(api.problem.request_id, "req_1");
    }

    #[test]
    fn problem_response_has_problem_json_content_type() {
        let response = ApiError::forbidden("students_only", "no").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }
}
