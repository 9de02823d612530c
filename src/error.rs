//! Error taxonomy and client-facing response normalization.
//!
//! Every component raises an [`ApiError`]; the [`ResponseError`] impl is the
//! only place a failure becomes an HTTP response, so the body shape is uniform:
//! `{"error": <message>}`. Storage detail stays in the logs.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    /// Unexpected storage or runtime failure. The payload is logged and never
    /// serialized into the response body.
    #[error("Internal server error")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("serialization error: {e}"))
    }
}

impl From<sled::Error> for ApiError {
    fn from(e: sled::Error) -> Self {
        Self::Storage(format!("sled error: {e}"))
    }
}

impl From<sled::transaction::TransactionError<ApiError>> for ApiError {
    fn from(e: sled::transaction::TransactionError<ApiError>) -> Self {
        match e {
            sled::transaction::TransactionError::Abort(err) => err,
            sled::transaction::TransactionError::Storage(err) => err.into(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Storage(detail) = self {
            tracing::error!("storage failure: {}", detail);
        }
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Storage("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_rt::test]
    async fn body_is_flat_error_object() {
        let resp = ApiError::NotFound("File not found".into()).error_response();
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "File not found" }));
    }

    #[actix_rt::test]
    async fn storage_detail_is_not_leaked() {
        let resp = ApiError::Storage("sled error: io failure at /var/db".into()).error_response();
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn transaction_abort_unwraps_to_inner_error() {
        let err: ApiError = sled::transaction::TransactionError::Abort(ApiError::Conflict(
            "File name already exists".into(),
        ))
        .into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
