//! HTTP error mapping for jury-score
//!
//! Every failure leaves the service as `{"error": {"code", "message"}}` with a status
//! derived from the error kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jury_common::Error;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request the extractors could not reject on their own (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Scoring core / persistence error
    #[error(transparent)]
    Common(#[from] Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Common(err) => match err {
                Error::InvalidScore { .. }
                | Error::CriterionCategoryMismatch { .. }
                | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
                Error::Unauthorized(_) => StatusCode::FORBIDDEN,
                Error::NotFound(_) | Error::NoJuryData { .. } => StatusCode::NOT_FOUND,
                Error::DuplicateEntity(_) => StatusCode::CONFLICT,
                Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Common(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // Server-side failures are logged in full; the client gets the same message
        if status.is_server_error() {
            error!(code, "Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::InvalidScore { note: 11.0, max: 10 }, StatusCode::BAD_REQUEST),
            (
                Error::CriterionCategoryMismatch {
                    criterion_id: 1,
                    expected: 2,
                    actual: 3,
                },
                StatusCode::BAD_REQUEST,
            ),
            (Error::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (Error::Unauthorized("x".into()), StatusCode::FORBIDDEN),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                Error::NoJuryData {
                    candidate_id: 1,
                    category_id: 1,
                },
                StatusCode::NOT_FOUND,
            ),
            (Error::DuplicateEntity("x".into()), StatusCode::CONFLICT),
            (Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::from(Error::NotFound("Candidate 9 not found".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Not found: Candidate 9 not found");
    }
}
