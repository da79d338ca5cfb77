use crate::error::ClientResult;
use async_trait::async_trait;
use serde_json::Value;

use super::types::{ETag, Versioned};

/// Hierarchical key-value document store holding `users` and `logements`.
///
/// Paths are `/`-separated. There are no partial-merge or query primitives:
/// callers read whole subtrees and overwrite whole subtrees.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the subtree at `path`; `None` when nothing exists there.
    async fn get(&self, path: &str) -> ClientResult<Option<Value>>;

    /// Overwrite the subtree at `path`. Writing `null` deletes it.
    async fn set(&self, path: &str, value: Value) -> ClientResult<()>;

    /// Read the subtree together with a version tag for [`DocumentStore::set_if`].
    async fn get_versioned(&self, path: &str) -> ClientResult<Versioned>;

    /// Overwrite the subtree only if it is still at version `etag`.
    ///
    /// Returns `false`, without writing, when another writer got there first.
    async fn set_if(&self, path: &str, value: Value, etag: &ETag) -> ClientResult<bool>;

    /// Name of the backend, for logs
    fn backend_name(&self) -> &'static str;
}
