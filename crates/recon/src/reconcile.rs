//! State reconciliation
//!
//! [`Reconciler`] drives one resource kind through the remote calls of a
//! [`Remote`] client:
//!
//! - [`apply`](Reconciler::apply): create or update, then read back
//! - [`read`](Reconciler::read): refresh, mapping "not found" to [`Observed::Absent`]
//! - [`destroy`](Reconciler::destroy): delete, treating "already gone" as success
//! - [`plan`](Reconciler::plan): what `apply` would do, without writing
//! - [`import`](Reconciler::import): adopt an existing object from a raw identifier
//!
//! A reconciler borrows its client and holds a config snapshot; it keeps nothing
//! between calls, so a single one can serve concurrent calls for different resources.
//!
//! # Example
//!
//! ```
//! # use recon::kinds::identity_policy::{IdentityPolicy, IdentityPolicyConfig, IdentityPolicyKey, IdentityPolicyState};
//! # use recon::reconcile::{Observed, Reconciler};
//! # use recon::remote::{Deletion, Remote};
//! # use recon::RemoteError;
//! struct Nothing;
//!
//! #[async_trait::async_trait]
//! impl Remote<IdentityPolicy> for Nothing {
//!     async fn create(&self, _: &IdentityPolicyConfig) -> Result<IdentityPolicyKey, RemoteError> {
//!         Err(recon::remote_error!(AccessDenied))
//!     }
//!     async fn update(&self, _: &IdentityPolicyKey, _: &IdentityPolicyConfig) -> Result<(), RemoteError> {
//!         Err(recon::remote_error!(AccessDenied))
//!     }
//!     async fn fetch(&self, _: &IdentityPolicyKey) -> Result<Option<IdentityPolicyState>, RemoteError> {
//!         Ok(None)
//!     }
//!     async fn delete(&self, _: &IdentityPolicyKey) -> Result<Deletion, RemoteError> {
//!         Ok(Deletion::AlreadyAbsent)
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let reconciler = Reconciler::<IdentityPolicy, _>::new(&Nothing);
//! let observed = reconciler.read("example.com|default").await.unwrap();
//! assert_eq!(observed, Observed::Absent);
//! assert_eq!(reconciler.destroy("example.com|default").await.unwrap(), Deletion::AlreadyAbsent);
//! # });
//! ```

pub use recon_policy::equivalent;

use crate::config::{ConfigProvider, ReconcileConfig};
use crate::error::{ReconcileError, RemoteError};
use crate::id::{self, ResourceId};
use crate::remote::{Deletion, Remote};
use crate::resource::Resource;

use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// What a read found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed<S> {
    /// The resource does not exist remotely; drop it from tracked state.
    Absent,
    /// The resource exists, with its normalized state.
    Present(S),
}

impl<S> Observed<S> {
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub fn as_present(&self) -> Option<&S> {
        match self {
            Self::Present(s) => Some(s),
            Self::Absent => None,
        }
    }

    #[must_use]
    pub fn into_present(self) -> Option<S> {
        match self {
            Self::Present(s) => Some(s),
            Self::Absent => None,
        }
    }
}

impl<S> From<Option<S>> for Observed<S> {
    fn from(value: Option<S>) -> Self {
        match value {
            Some(s) => Self::Present(s),
            None => Self::Absent,
        }
    }
}

/// What [`Reconciler::apply`] would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan<K, S> {
    /// Nothing is tracked, or the tracked object vanished: create it.
    Create,
    /// The remote already matches.
    NoOp { id: ResourceId, state: S },
    /// The remote differs and can be overwritten in place.
    Update { id: ResourceId, key: K, state: S },
    /// An identifier part or an immutable attribute changed.
    Replace { id: ResourceId, key: K },
    /// The tracked object vanished and re-creation is disabled.
    Gone { id: ResourceId },
}

impl<K, S> Plan<K, S> {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp { .. })
    }

    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Create => Action::Created,
            Self::NoOp { .. } => Action::Unchanged,
            Self::Update { .. } => Action::Updated,
            Self::Replace { .. } => Action::Replaced,
            Self::Gone { .. } => Action::Gone,
        }
    }
}

/// What [`Reconciler::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Created,
    Updated,
    Replaced,
    Unchanged,
    Gone,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Replaced => "replaced",
            Self::Unchanged => "unchanged",
            Self::Gone => "gone",
        }
    }
}

/// Result of [`Reconciler::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<S> {
    /// Identifier to track from now on
    pub id: ResourceId,
    pub action: Action,
    /// State confirmed by the read-back
    pub observed: Observed<S>,
}

impl<S> Applied<S> {
    #[must_use]
    pub fn into_parts(self) -> (ResourceId, Observed<S>) {
        (self.id, self.observed)
    }
}

/// Reconciles resources of kind `R` through the remote client `C`.
pub struct Reconciler<'a, R, C: ?Sized> {
    remote: &'a C,
    config: Arc<ReconcileConfig>,
    _kind: PhantomData<fn() -> R>,
}

impl<'a, R, C> Reconciler<'a, R, C>
where
    R: Resource,
    C: Remote<R> + ?Sized,
{
    /// Creates a reconciler with the default configuration.
    #[must_use]
    pub fn new(remote: &'a C) -> Self {
        Self::with_config(remote, Arc::new(ReconcileConfig::default()))
    }

    #[must_use]
    pub fn with_config(remote: &'a C, config: Arc<ReconcileConfig>) -> Self {
        Self {
            remote,
            config,
            _kind: PhantomData,
        }
    }

    /// Creates a reconciler from the provider's current snapshot.
    #[must_use]
    pub fn from_provider(remote: &'a C, provider: &dyn ConfigProvider) -> Self {
        Self::with_config(remote, provider.snapshot())
    }

    #[must_use]
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reads the resource identified by `id`.
    ///
    /// # Errors
    /// Returns an error if `id` is malformed or the remote read fails for any reason
    /// other than the object not existing.
    pub async fn read(&self, id: &str) -> Result<Observed<R::State>, ReconcileError> {
        let key = Self::decode(id)?;
        self.fetch(id, &key).await
    }

    /// Reads many independent resources concurrently.
    ///
    /// At most [`ReconcileConfig::max_concurrency`] reads are in flight. Results are
    /// returned in input order.
    pub async fn read_many<I, S>(&self, ids: I) -> Vec<(String, Result<Observed<R::State>, ReconcileError>)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let limit = self.config.max_concurrency.max(1);
        stream::iter(ids.into_iter().map(Into::into))
            .map(|id: String| async move {
                let result = self.read(&id).await;
                (id, result)
            })
            .buffered(limit)
            .collect()
            .await
    }

    /// Adopts an existing remote object from a user-supplied identifier.
    ///
    /// Legacy identifier forms are accepted; the returned identifier is in the current
    /// form.
    ///
    /// # Errors
    /// Returns [`ReconcileError::ImportNotFound`] if the object does not exist.
    pub async fn import(&self, raw: &str) -> Result<(ResourceId, R::State), ReconcileError> {
        let key = Self::decode(raw)?;
        let id = id::format_id::<R>(&key);
        match self.fetch(raw, &key).await? {
            Observed::Present(state) => {
                info!(kind = R::NAME, raw, %id, "imported");
                Ok((id, state))
            }
            Observed::Absent => Err(ReconcileError::ImportNotFound {
                kind: R::NAME,
                id: raw.to_owned(),
            }),
        }
    }

    /// Works out what [`apply`](Self::apply) would do. Issues reads only.
    ///
    /// # Errors
    /// Returns an error if `desired` is invalid, `existing` is malformed, or the remote
    /// read fails.
    pub async fn plan(&self, desired: &R::Config, existing: Option<&str>) -> Result<Plan<R::Key, R::State>, ReconcileError> {
        R::validate(desired).map_err(|reason| Self::invalid(reason))?;

        let Some(raw) = existing else { return Ok(Plan::Create) };
        let key = Self::decode(raw)?;
        let id = ResourceId::new_unchecked(raw.to_owned());

        if let Some(want) = R::desired_key(desired)
            && want != key
        {
            debug!(kind = R::NAME, %id, ?want, "identifier parts changed");
            return Ok(Plan::Replace { id, key });
        }

        let plan = match self.fetch(raw, &key).await? {
            Observed::Absent if self.config.recreate_on_drift => Plan::Create,
            Observed::Absent => Plan::Gone { id },
            Observed::Present(state) if R::replaces(desired, &state) => Plan::Replace { id, key },
            Observed::Present(state) if self.config.skip_equivalent_updates && R::matches(desired, &state) => {
                Plan::NoOp { id, state }
            }
            Observed::Present(state) => Plan::Update { id, key, state },
        };
        Ok(plan)
    }

    /// Makes the remote match `desired`.
    ///
    /// Without `existing`, the resource is created and a new identifier minted. With it,
    /// the remote is updated unless it already matches. Either way the result carries the
    /// state read back after the write.
    ///
    /// # Errors
    /// Returns an error if `desired` is invalid, `existing` is malformed, or a remote call
    /// fails.
    pub async fn apply(&self, desired: &R::Config, existing: Option<&str>) -> Result<Applied<R::State>, ReconcileError> {
        match self.plan(desired, existing).await? {
            Plan::Create => {
                let (id, observed) = self.create(desired).await?;
                Ok(Applied {
                    id,
                    action: Action::Created,
                    observed,
                })
            }
            Plan::NoOp { id, state } => {
                debug!(kind = R::NAME, %id, "remote already matches");
                Ok(Applied {
                    id,
                    action: Action::Unchanged,
                    observed: Observed::Present(R::retain_desired(desired, state)),
                })
            }
            Plan::Update { id, key, .. } => {
                self.remote
                    .update(&key, desired)
                    .await
                    .map_err(|e| Self::remote_failure(id.as_str(), e))?;
                info!(kind = R::NAME, %id, "updated");
                let observed = retain_desired::<R>(desired, self.fetch(id.as_str(), &key).await?);
                Ok(Applied {
                    id,
                    action: Action::Updated,
                    observed,
                })
            }
            Plan::Replace { id, key } => {
                self.delete(id.as_str(), &key).await?;
                let (new_id, observed) = self.create(desired).await?;
                info!(kind = R::NAME, old = %id, new = %new_id, "replaced");
                Ok(Applied {
                    id: new_id,
                    action: Action::Replaced,
                    observed,
                })
            }
            Plan::Gone { id } => {
                warn!(kind = R::NAME, %id, "remote object vanished, not re-creating");
                Ok(Applied {
                    id,
                    action: Action::Gone,
                    observed: Observed::Absent,
                })
            }
        }
    }

    /// Deletes the resource identified by `id`.
    ///
    /// # Errors
    /// Returns an error if `id` is malformed or the delete fails for any reason other
    /// than the object already being gone.
    pub async fn destroy(&self, id: &str) -> Result<Deletion, ReconcileError> {
        let key = Self::decode(id)?;
        self.delete(id, &key).await
    }

    async fn create(&self, desired: &R::Config) -> Result<(ResourceId, Observed<R::State>), ReconcileError> {
        let pending = match R::desired_key(desired) {
            Some(key) => Self::mint(&key)?.into_string(),
            None => String::from("(new)"),
        };

        let key = self
            .remote
            .create(desired)
            .await
            .map_err(|e| Self::remote_failure(&pending, e))?;

        let id = Self::mint(&key)?;
        info!(kind = R::NAME, %id, "created");

        let observed = self.fetch(id.as_str(), &key).await?;
        if observed.is_absent() {
            warn!(kind = R::NAME, %id, "created object not visible on read-back");
        }
        Ok((id, retain_desired::<R>(desired, observed)))
    }

    async fn fetch(&self, id: &str, key: &R::Key) -> Result<Observed<R::State>, ReconcileError> {
        match self.remote.fetch(key).await {
            Ok(Some(state)) => Ok(Observed::Present(R::normalize(state))),
            Ok(None) => {
                debug!(kind = R::NAME, id, "remote object not found");
                Ok(Observed::Absent)
            }
            Err(e) if e.is_not_found() => {
                debug!(kind = R::NAME, id, error = %e, "remote object not found");
                Ok(Observed::Absent)
            }
            Err(e) => Err(Self::remote_failure(id, e)),
        }
    }

    async fn delete(&self, id: &str, key: &R::Key) -> Result<Deletion, ReconcileError> {
        let deletion = match self.remote.delete(key).await {
            Ok(deletion) => deletion,
            Err(e) if e.is_not_found() => Deletion::AlreadyAbsent,
            Err(e) => return Err(Self::remote_failure(id, e)),
        };
        match deletion {
            Deletion::Deleted => info!(kind = R::NAME, id, "deleted"),
            Deletion::AlreadyAbsent => debug!(kind = R::NAME, id, "already absent"),
        }
        Ok(deletion)
    }

    fn decode(id: &str) -> Result<R::Key, ReconcileError> {
        id::parse_id::<R>(id).map_err(|source| ReconcileError::Decode {
            kind: R::NAME,
            id: id.to_owned(),
            source,
        })
    }

    /// Encodes `key`, refusing parts that would not decode back.
    fn mint(key: &R::Key) -> Result<ResourceId, ReconcileError> {
        let parts = R::key_parts(key);
        if parts.first().is_none_or(String::is_empty) {
            return Err(Self::invalid("empty primary key".to_owned()));
        }
        if let Some(pos) = R::CODEC.find_unencodable(&parts) {
            let reason = format!(
                "key part {pos} ({:?}) contains the identifier separator {:?}",
                parts[pos],
                R::CODEC.separator
            );
            return Err(Self::invalid(reason));
        }
        Ok(R::CODEC.encode(&parts))
    }

    fn invalid(reason: String) -> ReconcileError {
        ReconcileError::InvalidConfig { kind: R::NAME, reason }
    }

    fn remote_failure(id: &str, source: RemoteError) -> ReconcileError {
        warn!(kind = R::NAME, id, error = %source, "remote call failed");
        ReconcileError::Remote {
            kind: R::NAME,
            id: id.to_owned(),
            source,
        }
    }
}

fn retain_desired<R: Resource>(desired: &R::Config, observed: Observed<R::State>) -> Observed<R::State> {
    match observed {
        Observed::Present(state) => Observed::Present(R::retain_desired(desired, state)),
        Observed::Absent => Observed::Absent,
    }
}
