//! HTTP surface: handlers for every operation plus the shared route table.
//!
//! The raw-read endpoint is the single unauthenticated read: anyone holding
//! an identifier may fetch a document's text. Listing, uploading, editing and
//! deleting, for documents and keys alike, all pass the authentication gate
//! first, and key creation is gated on a valid one-time password instead.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::error::{ApiError, Result};
use crate::ident;
use crate::otp;
use crate::util::AppState;

// ==============================
// Query and response shapes
// ==============================

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub name: Option<String>,
    pub overwrite: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
struct OtpValidation {
    #[serde(rename = "isValid")]
    is_valid: u8,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct CreatedKey {
    id: String,
    key: String,
    #[serde(rename = "__v")]
    version: u8,
}

#[derive(Debug, Serialize)]
struct UploadedDocument {
    id: String,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: String,
}

#[derive(Debug, Serialize)]
struct Health {
    timestamp: u64,
    date: String,
    status: String,
    uptime: u64,
}

// ==============================
// Helpers
// ==============================

/// Truthiness for query flags: 1|true|yes|on (case-insensitive).
fn truthy(v: Option<&str>) -> bool {
    matches!(
        v.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

const TEXT_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/yaml",
    "application/x-yaml",
];

/// Uploads are UTF-8 text; only text-like media types get through. A missing
/// content-type is treated as plain text.
fn check_content_type(req: &HttpRequest) -> Result<()> {
    let raw = match req
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        Some(v) => v,
        None => return Ok(()),
    };
    let essence = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if essence.is_empty() || essence.starts_with("text/") {
        return Ok(());
    }
    if TEXT_CONTENT_TYPES.contains(&essence.as_str()) {
        return Ok(());
    }
    Err(ApiError::InvalidInput("Unsupported content type".into()))
}

fn utf8_body(body: web::Bytes) -> Result<String> {
    String::from_utf8(body.to_vec())
        .map_err(|_| ApiError::InvalidInput("File content must be UTF-8 text".into()))
}

fn non_empty_identifier(path: web::Path<String>) -> Result<String> {
    let identifier = path.into_inner();
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(ApiError::InvalidInput("Identifier is required".into()));
    }
    Ok(identifier.to_string())
}

// ==============================
// Handlers
// ==============================

/// GET /health
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(Health {
        timestamp: otp::now_millis(),
        date: chrono::Utc::now().to_rfc2822(),
        status: "ok".into(),
        uptime: state.started.elapsed().as_secs(),
    })
}

/// GET /otp/validate: check a token against the shared secret without
/// issuing anything.
pub async fn validate_otp(
    state: web::Data<AppState>,
    query: web::Query<TokenQuery>,
) -> Result<HttpResponse> {
    let token = match query.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t,
        None => return Err(ApiError::InvalidInput("Token is required".into())),
    };
    let is_valid = otp::validate(&state.otp_secret, Some(token), otp::FORWARD_SKEW_MILLIS);
    Ok(HttpResponse::Ok().json(OtpValidation {
        is_valid: u8::from(is_valid),
        timestamp: otp::now_millis(),
    }))
}

/// POST /keys: OTP-gated key issuance; deliberately not behind the API-key
/// gate.
pub async fn create_key(
    state: web::Data<AppState>,
    query: web::Query<TokenQuery>,
) -> Result<HttpResponse> {
    if !otp::validate(
        &state.otp_secret,
        query.token.as_deref(),
        otp::FORWARD_SKEW_MILLIS,
    ) {
        return Err(ApiError::Unauthorized("Invalid OTP token".into()));
    }
    let issued = state.keys.issue().await?;
    tracing::info!(id = %issued.id, "issued API key");
    Ok(HttpResponse::Ok().json(vec![CreatedKey {
        id: issued.id,
        key: issued.key,
        version: 0,
    }]))
}

/// GET /keys
pub async fn list_keys(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<AuthQuery>,
) -> Result<HttpResponse> {
    auth::authenticate(&state.keys, req.headers(), query.key.as_deref()).await?;
    Ok(HttpResponse::Ok().json(state.keys.list().await?))
}

/// DELETE /keys/{id}
pub async fn delete_key(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<AuthQuery>,
) -> Result<HttpResponse> {
    auth::authenticate(&state.keys, req.headers(), query.key.as_deref()).await?;
    let id = path.into_inner();
    // A malformed handle and an unknown one answer alike.
    if !ident::is_key_id(&id) || !state.keys.delete_by_id(&id).await? {
        return Err(ApiError::InvalidInput("Invalid key ID".into()));
    }
    tracing::info!(%id, "deleted API key");
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "Key deleted successfully".into(),
    }))
}

/// POST /documents: upload; the body is the raw file content.
pub async fn upload(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    auth::authenticate(&state.keys, req.headers(), query.key.as_deref()).await?;
    check_content_type(&req)?;
    let content = utf8_body(body)?;
    if content.is_empty() {
        return Err(ApiError::InvalidInput("File content is required".into()));
    }
    let overwrite = truthy(query.overwrite.as_deref());
    let doc = state
        .documents
        .create(query.name.as_deref(), content, overwrite)
        .await?;
    tracing::info!(id = %doc.id, name = %doc.name, "stored document");
    Ok(HttpResponse::Ok().json(UploadedDocument { id: doc.id }))
}

/// GET /raw/{identifier}: public raw read.
pub async fn raw_read(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let identifier = non_empty_identifier(path)?;
    let doc = state.documents.resolve(&identifier).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(doc.content))
}

/// GET /documents
pub async fn list_documents(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<AuthQuery>,
) -> Result<HttpResponse> {
    auth::authenticate(&state.keys, req.headers(), query.key.as_deref()).await?;
    Ok(HttpResponse::Ok().json(state.documents.list().await?))
}

/// PUT /documents/{identifier}: edit content in place.
pub async fn edit_document(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<AuthQuery>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    auth::authenticate(&state.keys, req.headers(), query.key.as_deref()).await?;
    check_content_type(&req)?;
    let identifier = non_empty_identifier(path)?;
    let content = utf8_body(body)?;
    if content.is_empty() {
        return Err(ApiError::InvalidInput("File content is required".into()));
    }
    state.documents.edit(&identifier, content).await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "File updated successfully".into(),
    }))
}

/// DELETE /documents/{identifier}
pub async fn delete_document(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<AuthQuery>,
) -> Result<HttpResponse> {
    auth::authenticate(&state.keys, req.headers(), query.key.as_deref()).await?;
    let identifier = non_empty_identifier(path)?;
    state.documents.remove(&identifier).await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "File deleted successfully".into(),
    }))
}

// Explicit 400s for routes hit without their path parameter, mirroring the
// missing-input checks of the operations table.
async fn missing_identifier() -> Result<HttpResponse> {
    Err(ApiError::InvalidInput("Identifier is required".into()))
}

async fn missing_key_id() -> Result<HttpResponse> {
    Err(ApiError::InvalidInput("Key ID is required".into()))
}

/// Mount every route on the given config; `main` and the integration tests
/// share this composition.
pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/otp/validate", web::get().to(validate_otp))
        .service(
            web::resource("/keys")
                .route(web::post().to(create_key))
                .route(web::get().to(list_keys))
                .route(web::delete().to(missing_key_id)),
        )
        .route("/keys/{id}", web::delete().to(delete_key))
        .service(
            web::resource("/documents")
                .route(web::post().to(upload))
                .route(web::get().to(list_documents))
                .route(web::put().to(missing_identifier))
                .route(web::delete().to(missing_identifier)),
        )
        .service(
            web::resource("/documents/{identifier}")
                .route(web::put().to(edit_document))
                .route(web::delete().to(delete_document)),
        )
        .route("/raw", web::get().to(missing_identifier))
        .route("/raw/{identifier}", web::get().to(raw_read));
}

// ==============================
// Tests
// ==============================

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    #[::core::prelude::v1::test]
    fn truthy_accepts_the_usual_spellings() {
        assert!(truthy(Some("1")));
        assert!(truthy(Some("true")));
        assert!(truthy(Some(" YES ")));
        assert!(truthy(Some("on")));
        assert!(!truthy(Some("0")));
        assert!(!truthy(Some("false")));
        assert!(!truthy(Some("")));
        assert!(!truthy(None));
    }

    #[::core::prelude::v1::test]
    fn content_type_gate() {
        let ok = |ct: &str| {
            let req = test::TestRequest::default()
                .insert_header(("content-type", ct))
                .to_http_request();
            check_content_type(&req).is_ok()
        };
        assert!(ok("text/plain"));
        assert!(ok("text/plain; charset=utf-8"));
        assert!(ok("application/json"));
        assert!(ok("application/yaml"));
        assert!(ok("Application/XML"));
        assert!(!ok("application/octet-stream"));
        assert!(!ok("image/png"));
        assert!(!ok("multipart/form-data; boundary=x"));

        let bare = test::TestRequest::default().to_http_request();
        assert!(check_content_type(&bare).is_ok());
    }

    #[actix_web::test]
    async fn health_reports_status_and_uptime() {
        let state = web::Data::new(AppState::in_memory("test-secret"));
        let app =
            test::init_service(App::new().app_data(state).configure(config_routes)).await;

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_u64().unwrap() > 0);
        assert!(body["uptime"].as_u64().is_some());
        assert!(body["date"].as_str().is_some());
    }

    #[actix_web::test]
    async fn otp_validation_requires_a_token() {
        let state = web::Data::new(AppState::in_memory("test-secret"));
        let app =
            test::init_service(App::new().app_data(state).configure(config_routes)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/otp/validate").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Token is required");
    }

    #[actix_web::test]
    async fn otp_validation_reports_validity_as_a_flag() {
        let state = web::Data::new(AppState::in_memory("test-secret"));
        let app =
            test::init_service(App::new().app_data(state).configure(config_routes)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/otp/validate?token=000000")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        // Wrong token: still a 200, with the flag cleared.
        assert_eq!(body["isValid"], 0);
        assert!(body["timestamp"].as_u64().unwrap() > 0);
    }

    #[actix_web::test]
    async fn key_creation_rejects_a_bad_token() {
        let state = web::Data::new(AppState::in_memory("test-secret"));
        let app =
            test::init_service(App::new().app_data(state).configure(config_routes)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/keys?token=000000").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/keys").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn protected_routes_reject_missing_and_unknown_keys() {
        let state = web::Data::new(AppState::in_memory("test-secret"));
        let app =
            test::init_service(App::new().app_data(state).configure(config_routes)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/documents").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "API key is required");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/documents?key=deadbeef")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid API key");
    }

    #[actix_web::test]
    async fn parameterless_routes_answer_400() {
        let state = web::Data::new(AppState::in_memory("test-secret"));
        let app =
            test::init_service(App::new().app_data(state).configure(config_routes)).await;

        for req in [
            test::TestRequest::get().uri("/raw").to_request(),
            test::TestRequest::put().uri("/documents").to_request(),
            test::TestRequest::delete().uri("/documents").to_request(),
            test::TestRequest::delete().uri("/keys").to_request(),
        ] {
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
    }
}
