//! API key issuance, lookup and lifecycle.
//!
//! Keys are immutable `{id, key}` pairs: `id` is a short formatted handle used
//! for deletion, `key` is the bearer credential presented on protected calls.
//! There is no expiry and no update path; a key authenticates until it is
//! deleted.
//!
//! Storage backends: sled (embedded, default) or in-memory. Uniqueness of both
//! fields is enforced by the backend itself, so a duplicate insert surfaces as
//! a `Conflict` even when two requests race past any pre-check.

use crate::error::{ApiError, Result};
use crate::ident;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A stored API key. Serializes to the wire shape of the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    /// Bearer secret, stored verbatim: lookups resolve the presented
    /// credential by exact match and the listing returns it to holders.
    pub key: String,
}

// ==============================
// Storage trait
// ==============================

#[async_trait::async_trait]
pub trait KeyRepo: Send + Sync {
    /// Insert a new record; fails with `Conflict` if `id` or `key` exists.
    async fn insert(&self, rec: &ApiKey) -> Result<()>;
    async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>>;
    /// Returns whether a record was removed; absence is not an error at this
    /// layer (the caller decides response semantics).
    async fn delete_by_id(&self, id: &str) -> Result<bool>;
    /// Unordered full snapshot.
    async fn list(&self) -> Result<Vec<ApiKey>>;
}

// ==============================
// In-memory backend
// ==============================

mod memory_repo {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    // id -> record plus key -> id index, under one lock so check-and-insert
    // is a single critical section.
    #[derive(Default)]
    pub struct MemoryKeyRepo {
        inner: RwLock<Tables>,
    }

    #[derive(Default)]
    struct Tables {
        by_id: HashMap<String, ApiKey>,
        id_by_key: HashMap<String, String>,
    }

    #[async_trait::async_trait]
    impl KeyRepo for MemoryKeyRepo {
        async fn insert(&self, rec: &ApiKey) -> Result<()> {
            let mut tables = self.inner.write().expect("lock");
            if tables.by_id.contains_key(&rec.id) || tables.id_by_key.contains_key(&rec.key) {
                return Err(ApiError::Conflict("API key already exists".into()));
            }
            tables.id_by_key.insert(rec.key.clone(), rec.id.clone());
            tables.by_id.insert(rec.id.clone(), rec.clone());
            Ok(())
        }

        async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>> {
            let tables = self.inner.read().expect("lock");
            Ok(tables
                .id_by_key
                .get(key)
                .and_then(|id| tables.by_id.get(id))
                .cloned())
        }

        async fn delete_by_id(&self, id: &str) -> Result<bool> {
            let mut tables = self.inner.write().expect("lock");
            match tables.by_id.remove(id) {
                Some(rec) => {
                    tables.id_by_key.remove(&rec.key);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn list(&self) -> Result<Vec<ApiKey>> {
            let tables = self.inner.read().expect("lock");
            Ok(tables.by_id.values().cloned().collect())
        }
    }
}

// ==============================
// sled backend
// ==============================

mod sled_repo {
    use super::*;
    use sled::transaction::ConflictableTransactionError;
    use sled::Transactional;

    pub struct SledKeyRepo {
        _db: sled::Db,
        keys: sled::Tree,    // id -> JSON record
        secrets: sled::Tree, // key -> id
    }

    impl SledKeyRepo {
        pub fn open(db: &sled::Db) -> Result<Self> {
            Ok(Self {
                _db: db.clone(),
                keys: db.open_tree("keys")?,
                secrets: db.open_tree("key_secrets")?,
            })
        }

        fn decode(raw: &[u8]) -> Result<ApiKey> {
            Ok(serde_json::from_slice(raw)?)
        }
    }

    #[async_trait::async_trait]
    impl KeyRepo for SledKeyRepo {
        async fn insert(&self, rec: &ApiKey) -> Result<()> {
            let encoded = serde_json::to_vec(rec)?;
            // The existence checks and the inserts commit atomically; a
            // concurrent duplicate aborts with Conflict instead of clobbering.
            (&self.keys, &self.secrets).transaction(|(keys, secrets)| {
                if keys.get(rec.id.as_bytes())?.is_some()
                    || secrets.get(rec.key.as_bytes())?.is_some()
                {
                    return Err(ConflictableTransactionError::Abort(ApiError::Conflict(
                        "API key already exists".into(),
                    )));
                }
                keys.insert(rec.id.as_bytes(), encoded.clone())?;
                secrets.insert(rec.key.as_bytes(), rec.id.as_bytes())?;
                Ok(())
            })?;
            self.keys.flush()?;
            Ok(())
        }

        async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>> {
            let id = match self.secrets.get(key)? {
                Some(ivec) => ivec,
                None => return Ok(None),
            };
            match self.keys.get(id)? {
                Some(raw) => Ok(Some(Self::decode(&raw)?)),
                None => Ok(None),
            }
        }

        async fn delete_by_id(&self, id: &str) -> Result<bool> {
            let rec = match self.keys.get(id)? {
                Some(raw) => Self::decode(&raw)?,
                None => return Ok(false),
            };
            self.keys.remove(rec.id.as_bytes())?;
            self.secrets.remove(rec.key.as_bytes())?;
            self.keys.flush()?;
            Ok(true)
        }

        async fn list(&self) -> Result<Vec<ApiKey>> {
            let mut out = Vec::new();
            for item in self.keys.iter() {
                let (_k, v) = item?;
                out.push(Self::decode(&v)?);
            }
            Ok(out)
        }
    }
}

// ==============================
// Store
// ==============================

/// Policy layer over a [`KeyRepo`].
#[derive(Clone)]
pub struct KeyStore {
    repo: Arc<dyn KeyRepo>,
}

impl KeyStore {
    pub fn new(repo: Arc<dyn KeyRepo>) -> Self {
        Self { repo }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(memory_repo::MemoryKeyRepo::default()))
    }

    pub fn sled(db: &sled::Db) -> Result<Self> {
        Ok(Self::new(Arc::new(sled_repo::SledKeyRepo::open(db)?)))
    }

    /// Mint and persist a new key. A random collision on either field
    /// surfaces as `Conflict` from the repository.
    pub async fn issue(&self) -> Result<ApiKey> {
        let rec = ApiKey {
            id: ident::key_id(),
            key: ident::key_secret(),
        };
        self.repo.insert(&rec).await?;
        Ok(rec)
    }

    pub async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>> {
        self.repo.find_by_key(key).await
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        self.repo.delete_by_id(id).await
    }

    pub async fn list(&self) -> Result<Vec<ApiKey>> {
        self.repo.list().await
    }
}

// ==============================
// Tests
// ==============================
