//! Authentication gate for protected operations.
//!
//! A credential may arrive in the `x-api-key` header or the `key` query
//! parameter; the header is checked first and wins when both are present.
//! The gate is binary: a known key authenticates, anything else is a 401.
//! Handlers invoke it before touching any store, so a failed authentication
//! short-circuits all side effects.

use crate::error::{ApiError, Result};
use crate::keys::{ApiKey, KeyStore};
use actix_web::http::header::HeaderMap;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_QUERY_PARAM: &str = "key";

/// Pull the presented credential out of the request, header first.
pub fn extract_credential(headers: &HeaderMap, query_key: Option<&str>) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            query_key
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
}

/// Resolve the presented credential to a stored key, or reject.
pub async fn authenticate(
    keys: &KeyStore,
    headers: &HeaderMap,
    query_key: Option<&str>,
) -> Result<ApiKey> {
    let credential = match extract_credential(headers, query_key) {
        Some(c) => c,
        None => return Err(ApiError::Unauthorized("API key is required".into())),
    };
    match keys.find_by_key(&credential).await? {
        Some(key) => Ok(key),
        None => Err(ApiError::Unauthorized("Invalid API key".into())),
    }
}
