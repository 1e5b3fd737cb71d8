//! Server error types with HTTP status code mapping

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use graphload::error::{CatalogError, ConfigError, StoreError};
use graphload::pipeline::PipelineError;
use graphload::service::ServiceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Malformed multipart body or missing form field
    #[error("{0}")]
    BadRequest(String),

    /// Request body exceeded the configured limit
    #[error("{0}")]
    TooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ServerError::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ServerError::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 - client errors, unparsable documents included
            ServerError::Service(ServiceError::Validation(_)) => StatusCode::BAD_REQUEST,
            ServerError::Service(ServiceError::Processing(PipelineError::Parse(_))) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,

            ServerError::Service(ServiceError::JobNotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Service(ServiceError::JobNotProcessing(_)) => StatusCode::CONFLICT,
            ServerError::Service(ServiceError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Service(ServiceError::QueueFull) => StatusCode::SERVICE_UNAVAILABLE,

            ServerError::Service(ServiceError::Processing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Service(ServiceError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(e: MultipartError) -> Self {
        // Body-limit rejections surface here while the form is streamed.
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ServerError::TooLarge(e.body_text());
        }
        ServerError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
    }
}

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that stop the server from starting.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Failed to create triple store client: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphload::error::ParseError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ServerError::from(ServiceError::Validation("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::from(ServiceError::Processing(PipelineError::Parse(
                    ParseError::Syntax {
                        format: "Turtle",
                        message: "oops".into(),
                    },
                ))),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::from(ServiceError::JobNotFound("x".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ServerError::from(ServiceError::JobNotProcessing("x".into())),
                StatusCode::CONFLICT,
            ),
            (
                ServerError::from(ServiceError::TooLarge { size: 2, limit: 1 }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                ServerError::from(ServiceError::QueueFull),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ServerError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{}", error);
        }
    }

    #[test]
    fn test_not_found_message() {
        let error = ServerError::from(ServiceError::JobNotFound("abc".into()));
        assert_eq!(error.to_string(), "Job not found: abc");
    }
}
