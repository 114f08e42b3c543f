use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::SessionError;
use crate::platform::PlatformError;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Request-level failures, rendered as `{"error": ..., "details": ...}`.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("authorization denied: {error}")]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("missing code")]
    MissingCode,

    #[error("invalid state / possible CSRF")]
    InvalidState,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("host not allowed: {0}")]
    HostNotAllowed(String),

    /// Query string or form body the extractors could not parse.
    #[error("invalid request: {message}")]
    InvalidRequest { status: StatusCode, message: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::AuthorizationDenied { .. }
            | GatewayError::MissingCode
            | GatewayError::HostNotAllowed(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidState => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest { status, .. } => *status,
            GatewayError::Unauthenticated | GatewayError::Session(SessionError::NotFound) => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::Platform(PlatformError::Status { status, .. }) => {
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::Platform(PlatformError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Platform(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Session(SessionError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            GatewayError::AuthorizationDenied { error, description } => {
                json!({ "error": error, "details": description })
            }
            GatewayError::InvalidRequest { message, .. } => {
                json!({ "error": "invalid request", "details": message })
            }
            GatewayError::Platform(PlatformError::Status { endpoint, status, body }) => json!({
                "error": format!("{endpoint} request failed"),
                "details": {
                    "status": status,
                    "body": serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.clone())),
                },
            }),
            GatewayError::Platform(PlatformError::Api { endpoint, code, message }) => json!({
                "error": format!("{endpoint} request failed"),
                "details": { "code": code, "message": message },
            }),
            GatewayError::Platform(err) => json!({
                "error": format!("{} request failed", err.endpoint()),
                "details": err.to_string(),
            }),
            // Backend details stay in the logs.
            GatewayError::Session(SessionError::Backend(_)) => {
                json!({ "error": "internal error", "details": Value::Null })
            }
            other => json!({ "error": other.to_string(), "details": Value::Null }),
        }
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<FormRejection> for GatewayError {
    fn from(rejection: FormRejection) -> Self {
        GatewayError::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::MissingCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::InvalidState.status(), StatusCode::FORBIDDEN);
        assert_eq!(GatewayError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GatewayError::Platform(PlatformError::Timeout { endpoint: "token" }).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::Platform(PlatformError::Api {
                endpoint: "token",
                code: "invalid_grant".into(),
                message: String::new(),
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_upstream_status_is_preserved() {
        let err = GatewayError::Platform(PlatformError::Status {
            endpoint: "token",
            status: 401,
            body: r#"{"error":"invalid_client"}"#.into(),
        });
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let body = err.body();
        assert_eq!(body["details"]["status"], 401);
        assert_eq!(body["details"]["body"]["error"], "invalid_client");
    }

    #[test]
    fn test_non_error_upstream_status_becomes_bad_gateway() {
        let err = GatewayError::Platform(PlatformError::Status {
            endpoint: "token",
            status: 302,
            body: "moved".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.body()["details"]["body"], "moved");
    }

    #[test]
    fn test_authorization_denied_body() {
        let err = GatewayError::AuthorizationDenied {
            error: "access_denied".into(),
            description: Some("user cancelled".into()),
        };
        let body = err.body();
        assert_eq!(body["error"], "access_denied");
        assert_eq!(body["details"], "user cancelled");
    }

    #[test]
    fn test_backend_details_are_hidden() {
        let err = GatewayError::Session(SessionError::Backend("redis: connection refused".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body()["error"], "internal error");
        assert_eq!(err.body()["details"], Value::Null);
    }

    #[test]
    fn test_expired_session_is_unauthorized() {
        assert_eq!(
            GatewayError::Session(SessionError::NotFound).status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
