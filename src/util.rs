//! Process-level helpers: tracing/env initialization, bind address, backend
//! selection and the shared application state.

use crate::documents::DocumentStore;
use crate::keys::KeyStore;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize dotenv and structured tracing based on RUST_LOG.
///
/// The env file is best-effort; real deployments set variables directly.
pub fn init_tracing() {
    let env_source = match dotenvy::dotenv() {
        Ok(path) => path.display().to_string(),
        Err(_) => "none".into(),
    };

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let subscriber = fmt().with_env_filter(EnvFilter::new(filter)).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("Environment loaded from: {}", env_source);
}

/// Get the bind address for the HTTP server from env or default to 0.0.0.0:8090.
pub fn env_bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8090".into())
}

/// Storage backend selection, parsed from a spec string:
/// - "sled:<path>" → embedded sled database at path
/// - "memory"      → in-memory backend
#[derive(Debug, Clone)]
pub enum StorageBackend {
    Sled { path: PathBuf },
    Memory,
}

impl StorageBackend {
    pub fn from_spec(spec: &str) -> Option<Self> {
        if let Some(rest) = spec.strip_prefix("sled:") {
            return Some(Self::Sled {
                path: PathBuf::from(rest),
            });
        }
        if spec.eq_ignore_ascii_case("memory") {
            return Some(Self::Memory);
        }
        None
    }

    /// Default backend when no spec is given: sled at DOCSTORE_SLED_PATH or
    /// ./data/docstore.db.
    pub fn default_from_env() -> Self {
        let path = std::env::var("DOCSTORE_SLED_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "./data/docstore.db".to_string());
        Self::Sled {
            path: PathBuf::from(path),
        }
    }
}

/// Shared application state used by the HTTP server and handlers.
#[derive(Clone)]
pub struct AppState {
    pub keys: KeyStore,
    pub documents: DocumentStore,
    /// Shared TOTP secret; key issuance and standalone validation are gated
    /// on it.
    pub otp_secret: String,
    /// Process start, for the health endpoint's uptime field.
    pub started: Instant,
}

impl AppState {
    pub fn in_memory(otp_secret: impl Into<String>) -> Self {
        Self {
            keys: KeyStore::in_memory(),
            documents: DocumentStore::in_memory(),
            otp_secret: otp_secret.into(),
            started: Instant::now(),
        }
    }

    /// Build state for the selected backend. Both stores share one sled
    /// database, each behind its own trees.
    pub fn from_backend(
        backend: &StorageBackend,
        otp_secret: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let (keys, documents) = match backend {
            StorageBackend::Memory => (KeyStore::in_memory(), DocumentStore::in_memory()),
            StorageBackend::Sled { path } => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).ok();
                }
                let db = sled::open(path)?;
                (KeyStore::sled(&db)?, DocumentStore::sled(&db)?)
            }
        };
        Ok(Self {
            keys,
            documents,
            otp_secret: otp_secret.into(),
            started: Instant::now(),
        })
    }
}

/// Build a CORS configuration from environment variables for Actix-web.
///
/// CORS_ALLOWED_ORIGINS: "*" (default) or comma-separated origins.
pub fn cors_config_from_env() -> actix_cors::Cors {
    let mut cors = actix_cors::Cors::default()
        .allow_any_method()
        .allow_any_header();
    match std::env::var("CORS_ALLOWED_ORIGINS") {
        Ok(origins) if origins.trim() != "*" => {
            for part in origins.split(',') {
                let p = part.trim();
                if !p.is_empty() {
                    cors = cors.allowed_origin(p);
                }
            }
        }
        _ => cors = cors.allow_any_origin(),
    }
    cors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_spec_parsing() {
        assert!(matches!(
            StorageBackend::from_spec("memory"),
            Some(StorageBackend::Memory)
        ));
        assert!(matches!(
            StorageBackend::from_spec("Memory"),
            Some(StorageBackend::Memory)
        ));
        match StorageBackend::from_spec("sled:./data/x.db") {
            Some(StorageBackend::Sled { path }) => {
                assert_eq!(path, PathBuf::from("./data/x.db"));
            }
            other => panic!("expected sled backend, got {other:?}"),
        }
        assert!(StorageBackend::from_spec("redis://x").is_none());
        assert!(StorageBackend::from_spec("").is_none());
    }

    #[test]
    fn sled_state_shares_one_database() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StorageBackend::Sled {
            path: dir.path().join("store.db"),
        };
        let state = AppState::from_backend(&backend, "secret").unwrap();
        drop(state);
        // Reopening the same path must work once the first handle is gone.
        let state = AppState::from_backend(&backend, "secret").unwrap();
        drop(state);
    }
}
