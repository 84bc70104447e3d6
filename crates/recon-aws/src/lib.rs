//! AWS remote clients for the `recon` resource kinds
//!
//! | kind | client | API |
//! |------|--------|-----|
//! | [`BucketAcl`](recon::kinds::bucket_acl::BucketAcl) | [`S3BucketAcl`] | S3 `GetBucketAcl` / `PutBucketAcl` |
//! | [`IdentityPolicy`](recon::kinds::identity_policy::IdentityPolicy) | [`SesIdentityPolicy`] | SES identity policies |
//! | [`DistributionConfiguration`](recon::kinds::distribution_configuration::DistributionConfiguration) | [`ImageBuilderDistribution`] | EC2 Image Builder |
//!
//! Retries are left to the SDK's retry policy. SDK errors are mapped to
//! [`RemoteError`](recon::RemoteError) by [`error::from_sdk_error`].

#![allow(
    clippy::bool_assert_comparison, // I don't like `assert!(!expression)`. It's very misleading.
    clippy::missing_errors_doc,
    clippy::ptr_arg, // the ARN key type is fixed by the resource kind
)]

pub mod error;

mod imagebuilder;
mod s3;
mod ses;

pub use self::imagebuilder::ImageBuilderDistribution;
pub use self::s3::S3BucketAcl;
pub use self::ses::SesIdentityPolicy;
