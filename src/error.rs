use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("not authorized")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("tracking token space exhausted")]
    TokenExhaustion,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TokenExhaustion | AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to a client. Server-side detail for 5xx variants
    /// goes to the log, not over the wire.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "internal error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.public_message()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn server_errors_hide_internal_detail() {
        let err = AppError::StoreUnavailable("connection refused".to_string());
        assert_eq!(err.public_message(), "internal error");

        let err = AppError::TokenExhaustion;
        assert_eq!(err.public_message(), "internal error");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = AppError::NotFound("package PKG0000000001".to_string());
        assert!(err.public_message().contains("PKG0000000001"));
    }
}
