//! Built-in resource kinds
//!
//! | kind | identifier | accepted arities |
//! |------|------------|------------------|
//! | [`BucketAcl`](bucket_acl::BucketAcl) | `bucket,expected_owner,acl` | 1, 2, 3 |
//! | [`IdentityPolicy`](identity_policy::IdentityPolicy) | `identity\|policy_name` | 2 |
//! | [`DistributionConfiguration`](distribution_configuration::DistributionConfiguration) | `arn` | 1 |

pub mod bucket_acl;
pub mod distribution_configuration;
pub mod identity_policy;
