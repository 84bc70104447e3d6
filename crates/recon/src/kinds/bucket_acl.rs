//! S3 bucket ACL
//!
//! Identifier: `bucket,expected_bucket_owner,acl`, where the owner and the canned ACL are
//! optional. New identifiers always carry all three parts (`example,,`); the shorter
//! forms written by earlier releases still decode:
//!
//! | identifier | bucket | owner | acl |
//! |------------|--------|-------|-----|
//! | `example` | `example` | | |
//! | `example,123456789012` | `example` | `123456789012` | |
//! | `example,private` | `example` | | `private` |
//! | `example,123456789012,private` | `example` | `123456789012` | `private` |
//!
//! A bucket ACL cannot be deleted, only overwritten. Destroying one only stops tracking
//! it.

use crate::error::DecodeError;
use crate::id::IdCodec;
use crate::resource::Resource;

use std::collections::BTreeSet;

use recon_policy::is_account_id;
use serde::{Deserialize, Serialize};

pub const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
pub const AUTHENTICATED_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";
pub const LOG_DELIVERY_URI: &str = "http://acs.amazonaws.com/groups/s3/LogDelivery";

/// Canned ACLs accepted for buckets.
pub const CANNED_ACLS: &[&str] = &[
    "private",
    "public-read",
    "public-read-write",
    "authenticated-read",
    "aws-exec-read",
    "log-delivery-write",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    FullControl,
    Write,
    WriteAcp,
    Read,
    ReadAcp,
}

impl Permission {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullControl => "FULL_CONTROL",
            Self::Write => "WRITE",
            Self::WriteAcp => "WRITE_ACP",
            Self::Read => "READ",
            Self::ReadAcp => "READ_ACP",
        }
    }

    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "FULL_CONTROL" => Self::FullControl,
            "WRITE" => Self::Write,
            "WRITE_ACP" => Self::WriteAcp,
            "READ" => Self::Read,
            "READ_ACP" => Self::ReadAcp,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GranteeType {
    CanonicalUser,
    AmazonCustomerByEmail,
    Group,
}

impl GranteeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CanonicalUser => "CanonicalUser",
            Self::AmazonCustomerByEmail => "AmazonCustomerByEmail",
            Self::Group => "Group",
        }
    }

    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "CanonicalUser" => Self::CanonicalUser,
            "AmazonCustomerByEmail" => Self::AmazonCustomerByEmail,
            "Group" => Self::Group,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Grantee {
    #[serde(rename = "type")]
    pub kind: GranteeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    /// Reported by the remote, ignored when comparing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Grantee {
    #[must_use]
    pub fn canonical_user(id: impl Into<String>) -> Self {
        Self {
            kind: GranteeType::CanonicalUser,
            id: Some(id.into()),
            uri: None,
            email_address: None,
            display_name: None,
        }
    }

    #[must_use]
    pub fn group(uri: impl Into<String>) -> Self {
        Self {
            kind: GranteeType::Group,
            id: None,
            uri: Some(uri.into()),
            email_address: None,
            display_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: Permission,
}

impl Grant {
    #[must_use]
    pub fn new(grantee: Grantee, permission: Permission) -> Self {
        Self { grantee, permission }
    }

    fn identity(&self) -> (GranteeType, Option<&str>, Option<&str>, Option<&str>, Permission) {
        let g = &self.grantee;
        (
            g.kind,
            g.id.as_deref(),
            g.uri.as_deref(),
            g.email_address.as_deref(),
            self.permission,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlPolicy {
    #[serde(default)]
    pub grants: Vec<Grant>,
    pub owner: Owner,
}

/// Marker for the `s3_bucket_acl` kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketAcl;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketAclKey {
    pub bucket: String,
    pub expected_bucket_owner: Option<String>,
    pub acl: Option<String>,
}

impl BucketAclKey {
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            expected_bucket_owner: None,
            acl: None,
        }
    }
}

/// Desired bucket ACL: either a canned ACL or an explicit policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAclConfig {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_bucket_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control_policy: Option<AccessControlPolicy>,
}

/// Bucket ACL as read from the remote.
///
/// The remote only reports grants; `acl` is carried over from the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAclState {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_bucket_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    pub access_control_policy: AccessControlPolicy,
}

/// Bucket names as accepted in identifiers.
#[must_use]
pub fn is_bucket_name(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
}

/// Strings shaped like a canned ACL. Unknown values are left for the remote to reject.
fn looks_like_canned_acl(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase() || b == b'-')
}

/// The grants a canned ACL stands for, given the bucket owner.
///
/// Returns `None` for canned ACLs whose grants cannot be derived from the owner alone.
#[must_use]
pub fn expand_canned_acl(acl: &str, owner_id: &str) -> Option<Vec<Grant>> {
    let owner = Grant::new(Grantee::canonical_user(owner_id), Permission::FullControl);
    let extra: &[(&str, Permission)] = match acl {
        "private" => &[],
        "public-read" => &[(ALL_USERS_URI, Permission::Read)],
        "public-read-write" => &[(ALL_USERS_URI, Permission::Read), (ALL_USERS_URI, Permission::Write)],
        "authenticated-read" => &[(AUTHENTICATED_USERS_URI, Permission::Read)],
        "log-delivery-write" => &[(LOG_DELIVERY_URI, Permission::Write), (LOG_DELIVERY_URI, Permission::ReadAcp)],
        _ => return None,
    };
    let mut grants = vec![owner];
    grants.extend(extra.iter().map(|&(uri, p)| Grant::new(Grantee::group(uri), p)));
    Some(grants)
}

fn same_grants(a: &[Grant], b: &[Grant]) -> bool {
    let a: BTreeSet<_> = a.iter().map(Grant::identity).collect();
    let b: BTreeSet<_> = b.iter().map(Grant::identity).collect();
    a == b
}

/// Email grantees are rejected: S3 reports them back as canonical users, so they would
/// never compare equal and every apply would rewrite them.
fn validate_grant(grant: &Grant) -> Result<(), String> {
    let g = &grant.grantee;
    let ok = match g.kind {
        GranteeType::CanonicalUser => g.id.as_deref().is_some_and(|s| !s.is_empty()),
        GranteeType::Group => g.uri.as_deref().is_some_and(|s| !s.is_empty()),
        GranteeType::AmazonCustomerByEmail => {
            return Err("grantees of type AmazonCustomerByEmail are not supported, use the canonical user id".to_owned());
        }
    };
    if ok {
        Ok(())
    } else {
        Err(format!("grantee of type {} is missing its identifying field", g.kind.as_str()))
    }
}

impl Resource for BucketAcl {
    const NAME: &'static str = "s3_bucket_acl";
    const CODEC: IdCodec = IdCodec::new(",", &[1, 2, 3]);

    type Key = BucketAclKey;
    type Config = BucketAclConfig;
    type State = BucketAclState;

    fn key_parts(key: &BucketAclKey) -> Vec<String> {
        vec![
            key.bucket.clone(),
            key.expected_bucket_owner.clone().unwrap_or_default(),
            key.acl.clone().unwrap_or_default(),
        ]
    }

    fn parse_key(parts: &[&str]) -> Result<BucketAclKey, DecodeError> {
        let bucket = parts[0];
        if !is_bucket_name(bucket) {
            return Err(DecodeError::InvalidPart {
                position: 0,
                reason: "bucket name may only contain lowercase letters, digits, dots and hyphens",
            });
        }

        let mut key = BucketAclKey::new(bucket);
        match parts {
            [_] => {}
            [_, second] => {
                if is_account_id(second) {
                    key.expected_bucket_owner = Some((*second).to_owned());
                } else if looks_like_canned_acl(second) {
                    key.acl = Some((*second).to_owned());
                } else {
                    return Err(DecodeError::InvalidPart {
                        position: 1,
                        reason: "expected an account id or a canned ACL",
                    });
                }
            }
            [_, owner, acl] => {
                if !owner.is_empty() {
                    if !is_account_id(owner) {
                        return Err(DecodeError::InvalidPart {
                            position: 1,
                            reason: "expected a 12-digit account id",
                        });
                    }
                    key.expected_bucket_owner = Some((*owner).to_owned());
                }
                if !acl.is_empty() {
                    if !looks_like_canned_acl(acl) {
                        return Err(DecodeError::InvalidPart {
                            position: 2,
                            reason: "expected a canned ACL",
                        });
                    }
                    key.acl = Some((*acl).to_owned());
                }
            }
            _ => {
                return Err(DecodeError::WrongArity {
                    found: parts.len(),
                    accepted: Self::CODEC.arities.to_vec(),
                });
            }
        }
        Ok(key)
    }

    fn desired_key(config: &BucketAclConfig) -> Option<BucketAclKey> {
        Some(BucketAclKey {
            bucket: config.bucket.clone(),
            expected_bucket_owner: config.expected_bucket_owner.clone(),
            acl: config.acl.clone(),
        })
    }

    fn validate(config: &BucketAclConfig) -> Result<(), String> {
        if !is_bucket_name(&config.bucket) {
            return Err(format!("invalid bucket name {:?}", config.bucket));
        }
        if let Some(owner) = &config.expected_bucket_owner
            && !is_account_id(owner)
        {
            return Err(format!("expected_bucket_owner {owner:?} is not a 12-digit account id"));
        }
        match (&config.acl, &config.access_control_policy) {
            (Some(_), Some(_)) => Err("acl and access_control_policy are mutually exclusive".to_owned()),
            (None, None) => Err("one of acl or access_control_policy is required".to_owned()),
            (Some(acl), None) => {
                if CANNED_ACLS.contains(&acl.as_str()) {
                    Ok(())
                } else {
                    Err(format!("unknown canned ACL {acl:?}"))
                }
            }
            (None, Some(policy)) => {
                if policy.owner.id.is_empty() {
                    return Err("access_control_policy.owner.id is required".to_owned());
                }
                policy.grants.iter().try_for_each(validate_grant)
            }
        }
    }

    fn normalize(mut state: BucketAclState) -> BucketAclState {
        let grants = &mut state.access_control_policy.grants;
        grants.sort();
        grants.dedup();
        state
    }

    fn matches(desired: &BucketAclConfig, remote: &BucketAclState) -> bool {
        let current = &remote.access_control_policy;
        if let Some(policy) = &desired.access_control_policy {
            return policy.owner.id == current.owner.id && same_grants(&policy.grants, &current.grants);
        }
        match desired.acl.as_deref().and_then(|acl| expand_canned_acl(acl, &current.owner.id)) {
            Some(expected) => same_grants(&expected, &current.grants),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{format_id, parse_id};

    fn key(bucket: &str, owner: &str, acl: &str) -> BucketAclKey {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_owned());
        BucketAclKey {
            bucket: bucket.to_owned(),
            expected_bucket_owner: opt(owner),
            acl: opt(acl),
        }
    }

    fn owner_policy(owner: &str, grants: Vec<Grant>) -> AccessControlPolicy {
        AccessControlPolicy {
            grants,
            owner: Owner {
                id: owner.to_owned(),
                display_name: None,
            },
        }
    }

    fn state(policy: AccessControlPolicy) -> BucketAclState {
        BucketAcl::normalize(BucketAclState {
            bucket: "example".to_owned(),
            expected_bucket_owner: None,
            acl: None,
            access_control_policy: policy,
        })
    }

    fn canned(acl: &str) -> BucketAclConfig {
        BucketAclConfig {
            bucket: "example".to_owned(),
            expected_bucket_owner: None,
            acl: Some(acl.to_owned()),
            access_control_policy: None,
        }
    }

    #[test]
    fn rejects_malformed_ids() {
        let cases = [
            "",
            "test/123456789012",
            "test/123456789012/private",
            "test/123456789012,private",
            "test,private,123456789012",
            "Test",
            "example,",
            "example,123456789012,private,extra",
            ",123456789012,private",
        ];
        for id in cases {
            assert!(parse_id::<BucketAcl>(id).is_err(), "{id:?}");
        }
    }

    #[test]
    fn parses_minted_ids() {
        let cases = [
            ("example", "", ""),
            ("my-example-bucket", "", ""),
            ("my-example.bucket", "", ""),
            ("my-example.bucket.4000", "", ""),
            ("example", "", "private"),
            ("example", "", "public-read-write"),
            ("my-example.bucket.4000", "", "public-read-write"),
            ("example", "123456789012", ""),
            ("my-example.bucket.4000", "123456789012", ""),
            ("example", "123456789012", "private"),
            ("example", "123456789012", "public-read-write"),
            ("my-example.bucket.4000", "123456789012", "public-read-write"),
        ];
        for (bucket, owner, acl) in cases {
            let expected = key(bucket, owner, acl);
            let id = format_id::<BucketAcl>(&expected);
            assert_eq!(parse_id::<BucketAcl>(id.as_str()).unwrap(), expected, "{id}");
        }
    }

    #[test]
    fn minted_ids_always_have_three_parts() {
        assert_eq!(format_id::<BucketAcl>(&key("example", "", "")).as_str(), "example,,");
        assert_eq!(format_id::<BucketAcl>(&key("example", "", "private")).as_str(), "example,,private");
        assert_eq!(
            format_id::<BucketAcl>(&key("my-bucket.4000", "123456789012", "private")).as_str(),
            "my-bucket.4000,123456789012,private"
        );
    }

    #[test]
    fn parses_legacy_ids() {
        assert_eq!(parse_id::<BucketAcl>("example").unwrap(), key("example", "", ""));
        assert_eq!(
            parse_id::<BucketAcl>("my-bucket.4000,123456789012").unwrap(),
            key("my-bucket.4000", "123456789012", "")
        );
        assert_eq!(parse_id::<BucketAcl>("example,private").unwrap(), key("example", "", "private"));
        assert_eq!(
            parse_id::<BucketAcl>("example,public-read-write").unwrap(),
            key("example", "", "public-read-write")
        );
    }

    #[test]
    fn invalid_part_positions() {
        assert_eq!(
            parse_id::<BucketAcl>("test,private,123456789012"),
            Err(DecodeError::InvalidPart {
                position: 1,
                reason: "expected a 12-digit account id",
            })
        );
        assert!(matches!(
            parse_id::<BucketAcl>("test,123456789012,PRIVATE"),
            Err(DecodeError::InvalidPart { position: 2, .. })
        ));
        assert!(matches!(
            parse_id::<BucketAcl>("test/123456789012"),
            Err(DecodeError::InvalidPart { position: 0, .. })
        ));
    }

    #[test]
    fn validate_config() {
        assert!(BucketAcl::validate(&canned("private")).is_ok());
        assert!(BucketAcl::validate(&canned("public-reed")).is_err());

        let mut both = canned("private");
        both.access_control_policy = Some(owner_policy("owner", vec![]));
        assert!(BucketAcl::validate(&both).is_err());

        let mut neither = canned("private");
        neither.acl = None;
        assert!(BucketAcl::validate(&neither).is_err());

        let mut bad_owner = canned("private");
        bad_owner.expected_bucket_owner = Some("12345".to_owned());
        assert!(BucketAcl::validate(&bad_owner).is_err());

        let mut missing_uri = canned("private");
        missing_uri.acl = None;
        let mut grantee = Grantee::group("x");
        grantee.uri = None;
        missing_uri.access_control_policy = Some(owner_policy("owner", vec![Grant::new(grantee, Permission::Read)]));
        assert!(BucketAcl::validate(&missing_uri).is_err());
    }

    #[test]
    fn email_grantees_are_rejected() {
        let mut by_email = canned("private");
        by_email.acl = None;
        let grantee = Grantee {
            kind: GranteeType::AmazonCustomerByEmail,
            id: None,
            uri: None,
            email_address: Some("someone@example.com".to_owned()),
            display_name: None,
        };
        by_email.access_control_policy = Some(owner_policy("owner", vec![Grant::new(grantee, Permission::Read)]));
        let err = BucketAcl::validate(&by_email).unwrap_err();
        assert!(err.contains("AmazonCustomerByEmail"), "{err}");
    }

    #[test]
    fn canned_acl_matches_expanded_grants() {
        let private = state(owner_policy(
            "owner",
            vec![Grant::new(Grantee::canonical_user("owner"), Permission::FullControl)],
        ));
        assert!(BucketAcl::matches(&canned("private"), &private));
        assert_eq!(BucketAcl::matches(&canned("public-read"), &private), false);

        let public = state(owner_policy(
            "owner",
            vec![
                Grant::new(Grantee::group(ALL_USERS_URI), Permission::Write),
                Grant::new(Grantee::canonical_user("owner"), Permission::FullControl),
                Grant::new(Grantee::group(ALL_USERS_URI), Permission::Read),
            ],
        ));
        assert!(BucketAcl::matches(&canned("public-read-write"), &public));
        assert_eq!(BucketAcl::matches(&canned("private"), &public), false);

        // not derivable from the owner
        assert_eq!(BucketAcl::matches(&canned("aws-exec-read"), &private), false);
    }

    #[test]
    fn explicit_policy_ignores_order_and_display_names() {
        let mut remote_owner = Grantee::canonical_user("owner");
        remote_owner.display_name = Some("someone".to_owned());
        let remote = state(owner_policy(
            "owner",
            vec![
                Grant::new(Grantee::group(LOG_DELIVERY_URI), Permission::ReadAcp),
                Grant::new(remote_owner, Permission::Read),
            ],
        ));

        let mut desired = canned("private");
        desired.acl = None;
        desired.access_control_policy = Some(owner_policy(
            "owner",
            vec![
                Grant::new(Grantee::canonical_user("owner"), Permission::Read),
                Grant::new(Grantee::group(LOG_DELIVERY_URI), Permission::ReadAcp),
            ],
        ));
        assert!(BucketAcl::matches(&desired, &remote));

        desired.access_control_policy = Some(owner_policy(
            "owner",
            vec![Grant::new(Grantee::canonical_user("owner"), Permission::Write)],
        ));
        assert_eq!(BucketAcl::matches(&desired, &remote), false);
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let g = Grant::new(Grantee::canonical_user("owner"), Permission::FullControl);
        let s = state(owner_policy(
            "owner",
            vec![Grant::new(Grantee::group(ALL_USERS_URI), Permission::Read), g.clone(), g],
        ));
        assert_eq!(s.access_control_policy.grants.len(), 2);
        assert_eq!(s.access_control_policy.grants[0].grantee.kind, GranteeType::CanonicalUser);
    }

    #[test]
    fn config_json() {
        let json = r#"{
            "bucket": "example",
            "access_control_policy": {
                "owner": {"id": "abc"},
                "grants": [{"grantee": {"type": "Group", "uri": "http://acs.amazonaws.com/groups/s3/LogDelivery"}, "permission": "READ_ACP"}]
            }
        }"#;
        let config: BucketAclConfig = serde_json::from_str(json).unwrap();
        let policy = config.access_control_policy.as_ref().unwrap();
        assert_eq!(policy.grants[0].permission, Permission::ReadAcp);
        assert_eq!(policy.grants[0].grantee.kind, GranteeType::Group);
        assert!(BucketAcl::validate(&config).is_ok());
    }
}
