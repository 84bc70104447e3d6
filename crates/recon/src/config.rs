//! Reconciliation settings
//!
//! # Features
//! - `serde` support for serialization/deserialization
//! - Default values for all parameters
//! - Static configuration via [`StaticConfigProvider`]
//! - Hot-reload configuration via [`HotReloadConfigProvider`]
//!
//! A [`Reconciler`](crate::reconcile::Reconciler) takes one snapshot when it is built and
//! keeps it for every call it makes, so a reload never changes behavior halfway through a
//! reconciliation.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use recon::config::{ConfigProvider, HotReloadConfigProvider, ReconcileConfig};
//!
//! let provider = HotReloadConfigProvider::default();
//! assert_eq!(provider.snapshot().max_concurrency, 8);
//!
//! let mut config = ReconcileConfig::default();
//! config.max_concurrency = 2;
//! provider.update(Arc::new(config));
//! assert_eq!(provider.snapshot().max_concurrency, 2);
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Source of [`ReconcileConfig`] snapshots.
pub trait ConfigProvider: Send + Sync + 'static {
    /// Returns a snapshot of the current configuration.
    fn snapshot(&self) -> Arc<ReconcileConfig>;
}

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ReconcileConfig {
    /// Skip the remote update when the remote state already matches the desired state.
    ///
    /// Turning this off makes every `apply` on an existing resource write, which is
    /// occasionally useful to repair drift the equivalence check cannot see.
    ///
    /// Default: true
    pub skip_equivalent_updates: bool,

    /// Re-create a resource whose identifier is known but whose remote object has
    /// disappeared.
    ///
    /// When false, `apply` reports such a resource as absent and leaves it to the caller
    /// to drop it from tracked state.
    ///
    /// Default: true
    pub recreate_on_drift: bool,

    /// Maximum number of in-flight reads in `read_many`.
    ///
    /// Default: 8
    pub max_concurrency: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            skip_equivalent_updates: true,
            recreate_on_drift: true,
            max_concurrency: 8,
        }
    }
}

/// Immutable configuration.
#[derive(Debug)]
pub struct StaticConfigProvider {
    inner: Arc<ReconcileConfig>,
}

impl StaticConfigProvider {
    #[must_use]
    pub fn new(config: Arc<ReconcileConfig>) -> Self {
        Self { inner: config }
    }
}

impl Default for StaticConfigProvider {
    fn default() -> Self {
        Self::new(Arc::new(ReconcileConfig::default()))
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn snapshot(&self) -> Arc<ReconcileConfig> {
        Arc::clone(&self.inner)
    }
}

/// Configuration that can be swapped at runtime.
///
/// Reads are lock-free; [`update`](Self::update) replaces the whole configuration
/// atomically.
#[derive(Debug)]
pub struct HotReloadConfigProvider {
    inner: ArcSwap<ReconcileConfig>,
}

impl HotReloadConfigProvider {
    #[must_use]
    pub fn new(config: Arc<ReconcileConfig>) -> Self {
        Self {
            inner: ArcSwap::from(config),
        }
    }

    pub fn update(&self, config: Arc<ReconcileConfig>) {
        self.inner.store(config);
    }
}

impl Default for HotReloadConfigProvider {
    fn default() -> Self {
        Self::new(Arc::new(ReconcileConfig::default()))
    }
}

impl ConfigProvider for HotReloadConfigProvider {
    fn snapshot(&self) -> Arc<ReconcileConfig> {
        self.inner.load_full()
    }
}
