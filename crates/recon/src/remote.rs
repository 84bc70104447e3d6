//! Remote client capability

use crate::error::RemoteError;
use crate::resource::Resource;

use std::sync::Arc;

/// Outcome of a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deletion {
    /// The remote object was deleted by this call
    Deleted,
    /// The remote object was already gone
    AlreadyAbsent,
}

/// The remote operations a reconciler needs for resource kind `R`.
///
/// Implementations own transport, authentication and retries. "Not found" is never an
/// error: [`fetch`](Remote::fetch) reports it as `Ok(None)` and
/// [`delete`](Remote::delete) as `Ok(Deletion::AlreadyAbsent)`.
///
/// Implementations must not rely on per-call mutable state; the same client is used
/// concurrently for independent resources.
#[async_trait::async_trait]
pub trait Remote<R: Resource>: Send + Sync {
    /// Creates the resource and returns the key it was created under.
    async fn create(&self, config: &R::Config) -> Result<R::Key, RemoteError>;

    /// Overwrites the resource with `config`. This is a full replace, not a merge.
    async fn update(&self, key: &R::Key, config: &R::Config) -> Result<(), RemoteError>;

    /// Reads the current state, or `None` if the resource does not exist.
    async fn fetch(&self, key: &R::Key) -> Result<Option<R::State>, RemoteError>;

    /// Deletes the resource.
    async fn delete(&self, key: &R::Key) -> Result<Deletion, RemoteError>;
}

#[async_trait::async_trait]
impl<R, T> Remote<R> for Arc<T>
where
    R: Resource,
    T: Remote<R> + ?Sized,
{
    async fn create(&self, config: &R::Config) -> Result<R::Key, RemoteError> {
        (**self).create(config).await
    }

    async fn update(&self, key: &R::Key, config: &R::Config) -> Result<(), RemoteError> {
        (**self).update(key, config).await
    }

    async fn fetch(&self, key: &R::Key) -> Result<Option<R::State>, RemoteError> {
        (**self).fetch(key).await
    }

    async fn delete(&self, key: &R::Key) -> Result<Deletion, RemoteError> {
        (**self).delete(key).await
    }
}
