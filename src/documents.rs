//! Document storage: dual-identifier resolution, overwrite policy, listings.
//!
//! A document is addressable by its system-assigned `id` and by its `name`;
//! the two are separate keyspaces with separate uniqueness constraints, but
//! lookups treat them as one union keyspace (`id` consulted first). Listings
//! never carry `content`.

use crate::error::{ApiError, Result};
use crate::ident;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Short random identifier, assigned at creation, immutable.
    pub id: String,
    /// Caller-supplied or generated label; only replaced wholesale via
    /// overwrite-on-create, never renamed.
    pub name: String,
    /// UTF-8 text, mutable via edit.
    pub content: String,
}

/// Listing projection; `content` is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub id: String,
    pub name: String,
}

impl From<&Document> for DocumentEntry {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
        }
    }
}

// ==============================
// Storage trait
// ==============================

#[async_trait::async_trait]
pub trait DocumentRepo: Send + Sync {
    /// Insert a new record; fails with `Conflict` if `id` or `name` exists.
    async fn insert(&self, doc: &Document) -> Result<()>;
    /// Union-keyspace resolution; the `id` index is consulted first.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Document>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Document>>;
    /// Replace `content` on the record with this internal id; `id` and `name`
    /// are untouched.
    async fn update_content(&self, id: &str, content: &str) -> Result<Option<Document>>;
    async fn delete_by_id(&self, id: &str) -> Result<bool>;
    async fn list(&self) -> Result<Vec<DocumentEntry>>;
}

// ==============================
// In-memory backend
// ==============================

mod memory_repo {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    // id -> record plus name -> id index, under one lock so check-and-insert
    // is a single critical section.
    #[derive(Default)]
    pub struct MemoryDocumentRepo {
        inner: RwLock<Tables>,
    }

    #[derive(Default)]
    struct Tables {
        by_id: HashMap<String, Document>,
        id_by_name: HashMap<String, String>,
    }

    #[async_trait::async_trait]
    impl DocumentRepo for MemoryDocumentRepo {
        async fn insert(&self, doc: &Document) -> Result<()> {
            let mut tables = self.inner.write().expect("lock");
            if tables.by_id.contains_key(&doc.id) {
                return Err(ApiError::Conflict("File ID already exists".into()));
            }
            if tables.id_by_name.contains_key(&doc.name) {
                return Err(ApiError::Conflict("File name already exists".into()));
            }
            tables.id_by_name.insert(doc.name.clone(), doc.id.clone());
            tables.by_id.insert(doc.id.clone(), doc.clone());
            Ok(())
        }

        async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Document>> {
            let tables = self.inner.read().expect("lock");
            if let Some(doc) = tables.by_id.get(identifier) {
                return Ok(Some(doc.clone()));
            }
            Ok(tables
                .id_by_name
                .get(identifier)
                .and_then(|id| tables.by_id.get(id))
                .cloned())
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Document>> {
            let tables = self.inner.read().expect("lock");
            Ok(tables
                .id_by_name
                .get(name)
                .and_then(|id| tables.by_id.get(id))
                .cloned())
        }

        async fn update_content(&self, id: &str, content: &str) -> Result<Option<Document>> {
            let mut tables = self.inner.write().expect("lock");
            match tables.by_id.get_mut(id) {
                Some(doc) => {
                    doc.content = content.to_string();
                    Ok(Some(doc.clone()))
                }
                None => Ok(None),
            }
        }

        async fn delete_by_id(&self, id: &str) -> Result<bool> {
            let mut tables = self.inner.write().expect("lock");
            match tables.by_id.remove(id) {
                Some(doc) => {
                    tables.id_by_name.remove(&doc.name);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn list(&self) -> Result<Vec<DocumentEntry>> {
            let tables = self.inner.read().expect("lock");
            Ok(tables.by_id.values().map(DocumentEntry::from).collect())
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

    pub struct SledDocumentRepo {
        _db: sled::Db,
        docs: sled::Tree,  // id -> JSON record
        names: sled::Tree, // name -> id
    }

    impl SledDocumentRepo {
        pub fn open(db: &sled::Db) -> Result<Self> {
            Ok(Self {
                _db: db.clone(),
                docs: db.open_tree("documents")?,
                names: db.open_tree("document_names")?,
            })
        }

        fn decode(raw: &[u8]) -> Result<Document> {
            Ok(serde_json::from_slice(raw)?)
        }
    }

    #[async_trait::async_trait]
    impl DocumentRepo for SledDocumentRepo {
        async fn insert(&self, doc: &Document) -> Result<()> {
            let encoded = serde_json::to_vec(doc)?;
            // The existence checks and the inserts commit atomically, so a
            // racing create for the same name loses with Conflict (never a
            // silent second record).
            (&self.docs, &self.names).transaction(|(docs, names)| {
                if docs.get(doc.id.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(ApiError::Conflict(
                        "File ID already exists".into(),
                    )));
                }
                if names.get(doc.name.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(ApiError::Conflict(
                        "File name already exists".into(),
                    )));
                }
                docs.insert(doc.id.as_bytes(), encoded.clone())?;
                names.insert(doc.name.as_bytes(), doc.id.as_bytes())?;
                Ok(())
            })?;
            self.docs.flush()?;
            Ok(())
        }

        async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Document>> {
            if let Some(raw) = self.docs.get(identifier)? {
                return Ok(Some(Self::decode(&raw)?));
            }
            self.find_by_name(identifier).await
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Document>> {
            let id = match self.names.get(name)? {
                Some(ivec) => ivec,
                None => return Ok(None),
            };
            match self.docs.get(id)? {
                Some(raw) => Ok(Some(Self::decode(&raw)?)),
                None => Ok(None),
            }
        }

        async fn update_content(&self, id: &str, content: &str) -> Result<Option<Document>> {
            let mut doc = match self.docs.get(id)? {
                Some(raw) => Self::decode(&raw)?,
                None => return Ok(None),
            };
            doc.content = content.to_string();
            self.docs.insert(id, serde_json::to_vec(&doc)?)?;
            self.docs.flush()?;
            Ok(Some(doc))
        }

        async fn delete_by_id(&self, id: &str) -> Result<bool> {
            let doc = match self.docs.get(id)? {
                Some(raw) => Self::decode(&raw)?,
                None => return Ok(false),
            };
            self.docs.remove(doc.id.as_bytes())?;
            self.names.remove(doc.name.as_bytes())?;
            self.docs.flush()?;
            Ok(true)
        }

        async fn list(&self) -> Result<Vec<DocumentEntry>> {
            let mut out = Vec::new();
            for item in self.docs.iter() {
                let (_k, v) = item?;
                let doc = Self::decode(&v)?;
                out.push(DocumentEntry::from(&doc));
            }
            Ok(out)
        }
    }
}

// ==============================
// Store
// ==============================

/// Policy layer over a [`DocumentRepo`]: owns the overwrite and not-found
/// semantics.
#[derive(Clone)]
pub struct DocumentStore {
    repo: Arc<dyn DocumentRepo>,
}

impl DocumentStore {
    pub fn new(repo: Arc<dyn DocumentRepo>) -> Self {
        Self { repo }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(memory_repo::MemoryDocumentRepo::default()))
    }

    pub fn sled(db: &sled::Db) -> Result<Self> {
        Ok(Self::new(Arc::new(sled_repo::SledDocumentRepo::open(db)?)))
    }

    /// Create a document and return it.
    ///
    /// An existing document under `name` is a `Conflict` unless `overwrite`
    /// is set, in which case the old record is deleted and a fresh record
    /// (fresh id) takes the name. The pre-check and the insert are separate
    /// repository calls; when two creates race, the repository uniqueness
    /// constraint settles it and the loser gets `Conflict`.
    pub async fn create(
        &self,
        name: Option<&str>,
        content: String,
        overwrite: bool,
    ) -> Result<Document> {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => ident::default_document_name(),
        };
        if let Some(existing) = self.repo.find_by_name(&name).await? {
            if !overwrite {
                return Err(ApiError::Conflict("File name already exists".into()));
            }
            self.repo.delete_by_id(&existing.id).await?;
        }
        let doc = Document {
            id: ident::document_id(),
            name,
            content,
        };
        self.repo.insert(&doc).await?;
        Ok(doc)
    }

    /// Look up by id or name; id wins when both keyspaces match.
    pub async fn resolve(&self, identifier: &str) -> Result<Document> {
        match self.repo.find_by_identifier(identifier).await? {
            Some(doc) => Ok(doc),
            None => Err(ApiError::NotFound("File not found".into())),
        }
    }

    /// Replace content only.
    pub async fn edit(&self, identifier: &str, content: String) -> Result<Document> {
        let doc = self.resolve(identifier).await?;
        match self.repo.update_content(&doc.id, &content).await? {
            Some(updated) => Ok(updated),
            None => Err(ApiError::NotFound("File not found".into())),
        }
    }

    pub async fn remove(&self, identifier: &str) -> Result<()> {
        let doc = self.resolve(identifier).await?;
        if self.repo.delete_by_id(&doc.id).await? {
            Ok(())
        } else {
            Err(ApiError::NotFound("File not found".into()))
        }
    }

    pub async fn list(&self) -> Result<Vec<DocumentEntry>> {
        self.repo.list().await
    }
}

// ==============================
// Tests
// ==============================
