//! Composite identifiers and idempotent remote-state reconciliation
//!
//! `recon` is the reusable core of a declarative infrastructure provider. Every resource
//! handler in such a provider repeats the same two chores:
//!
//! 1. turning a resource's natural multi-part key (bucket name, owning account, ACL
//!    variant, ...) into a single opaque identifier string that can be stored in state
//!    files and typed into import commands, and back again;
//! 2. driving the create-or-update-then-read cycle against the remote API, without
//!    reporting spurious changes when the remote reformats what it was given, and
//!    without confusing "the object is gone" with "the call failed".
//!
//! # Architecture
//!
//! - [`id`]: the composite identifier codec ([`IdCodec`](id::IdCodec), [`ResourceId`](id::ResourceId))
//! - [`resource`]: the [`Resource`](resource::Resource) trait that describes one resource kind
//! - [`remote`]: the [`Remote`](remote::Remote) capability a remote client implements per kind
//! - [`reconcile`]: the [`Reconciler`](reconcile::Reconciler) that ties them together
//! - [`config`]: reconciliation settings and their providers
//! - [`kinds`]: the resource kinds that ship with the crate
//!
//! # Example
//!
//! ```
//! use recon::id::{decode, encode};
//!
//! let id = encode(["my-bucket.4000", "123456789012", "private"], ",");
//! assert_eq!(id.as_str(), "my-bucket.4000,123456789012,private");
//!
//! let parts = decode("my-bucket.4000,123456789012", ",", &[1, 2, 3]).unwrap();
//! assert_eq!(parts, ["my-bucket.4000", "123456789012", ""]);
//! ```
//!
//! # Remote clients
//!
//! The reconciler never talks to a cloud API itself. Callers inject a
//! [`Remote`](remote::Remote) implementation per call; AWS implementations live in the
//! `recon-aws` crate, and tests use in-memory doubles.

#![allow(
    clippy::bool_assert_comparison, // I don't like `assert!(!expression)`. It's very misleading.
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::single_match_else,
)]

#[macro_use]
mod error;

pub mod config;
pub mod id;
pub mod kinds;
pub mod reconcile;
pub mod remote;
pub mod resource;

pub use self::error::*;
