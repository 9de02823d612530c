#![forbid(unsafe_code)]
#![doc = r#"
Docstore

Minimal authenticated document store: named UTF-8 text blobs addressable by a
system-assigned ID or a caller-chosen name, guarded by TOTP-gated API keys.

Crate highlights
- Storage: pluggable repositories (embedded sled by default, in-memory for
  tests and ephemeral runs); uniqueness constraints live in the storage layer
  and are the final word on identifier conflicts.
- Identity: API keys are issued only against a valid time-based one-time
  password. Raw document reads are deliberately public; listing, uploading,
  editing and deleting require a key.
- HTTP server (in `server`): actix-web handlers sharing one route table with
  the integration tests.

Modules
- `otp`: TOTP validation (6 digits, 30-second step, fixed forward skew).
- `ident`: document ID / default name / key ID / key secret generation.
- `keys`: API key records, repositories and store.
- `documents`: document records, repositories and store.
- `auth`: credential extraction and the authentication gate.
- `server`: route table and handlers.
- `error`: the error taxonomy every component raises.
- `util`: tracing/env bootstrap, backend selection, shared state.
"#]

pub mod auth;
pub mod documents;
pub mod error;
pub mod ident;
pub mod keys;
pub mod otp;
pub mod server;
pub mod util;

// Re-export the primary types for ergonomic library use.
pub use crate::documents::{Document, DocumentEntry, DocumentStore};
pub use crate::error::ApiError;
pub use crate::keys::{ApiKey, KeyStore};
pub use crate::util::{AppState, StorageBackend};
