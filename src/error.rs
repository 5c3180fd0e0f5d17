use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-level failure taxonomy. Every handler and the auth gate reject with
/// one of these; the HTTP mapping lives in `into_response`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{field}: {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },
    #[error("missing or malformed Authorization header")]
    MissingToken,
    #[error("invalid session token")]
    InvalidToken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired reset token")]
    InvalidResetToken,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("notification dispatch failed")]
    NotificationFailed(#[source] anyhow::Error),
    #[error("account deletion partially failed")]
    DeletionPartiallyFailed {
        contacts_deleted: u64,
        activities_deleted: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Dependency(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation { field, reason } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": reason, "field": field }),
            ),
            ApiError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Missing or malformed Authorization header" }),
            ),
            // Single body for bad, expired and wrong-purpose tokens as well as
            // unresolvable subjects; callers cannot tell these apart.
            ApiError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid or expired token" }),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid credentials" }),
            ),
            ApiError::InvalidResetToken => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid or expired reset token" }),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ApiError::NotificationFailed(e) => {
                error!(error = %e, "notification dispatch failed");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Failed to send notification" }),
                )
            }
            ApiError::DeletionPartiallyFailed {
                contacts_deleted,
                activities_deleted,
                source,
            } => {
                error!(
                    error = %source,
                    contacts_deleted,
                    activities_deleted,
                    "account deletion partially failed"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Account deletion partially failed",
                        "contacts_deleted": contacts_deleted,
                        "activities_deleted": activities_deleted,
                        "account_deleted": false,
                    }),
                )
            }
            ApiError::Dependency(e) => {
                error!(error = %e, "internal dependency failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn maps_client_errors_to_4xx() {
        assert_eq!(
            status_of(ApiError::Validation {
                field: "email",
                reason: "Invalid email"
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ApiError::MissingToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(ApiError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::InvalidResetToken),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::NotFound("Contact not found")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Conflict("Email already exists")),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn maps_dependency_errors_to_5xx() {
        assert_eq!(
            status_of(ApiError::NotificationFailed(anyhow::anyhow!("smtp down"))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(ApiError::Dependency(anyhow::anyhow!("pool exhausted"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::DeletionPartiallyFailed {
                contacts_deleted: 3,
                activities_deleted: 0,
                source: anyhow::anyhow!("connection reset"),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn invalid_token_body_is_generic() {
        let response = ApiError::InvalidToken.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn partial_deletion_body_carries_stats() {
        let response = ApiError::DeletionPartiallyFailed {
            contacts_deleted: 2,
            activities_deleted: 1,
            source: anyhow::anyhow!("boom"),
        }
        .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["contacts_deleted"], 2);
        assert_eq!(body["activities_deleted"], 1);
        assert_eq!(body["account_deleted"], false);
    }
}
