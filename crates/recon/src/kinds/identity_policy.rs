//! SES identity policy
//!
//! Identifier: `identity|policy_name`. The identity is an email address, a domain or
//! an identity ARN, none of which can contain `|`.

use crate::error::DecodeError;
use crate::id::IdCodec;
use crate::resource::Resource;

use recon_policy::PolicyDocument;
use serde::{Deserialize, Serialize};

/// Marker for the `ses_identity_policy` kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityPolicyKey {
    pub identity: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPolicyConfig {
    pub identity: String,
    pub name: String,
    /// JSON policy document
    pub policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPolicyState {
    pub identity: String,
    pub name: String,
    pub policy: String,
}

/// SES policy names: 1 to 64 letters, digits, hyphens and underscores.
#[must_use]
pub fn is_policy_name(s: &str) -> bool {
    (1..=64).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl Resource for IdentityPolicy {
    const NAME: &'static str = "ses_identity_policy";
    const CODEC: IdCodec = IdCodec::new("|", &[2]);

    type Key = IdentityPolicyKey;
    type Config = IdentityPolicyConfig;
    type State = IdentityPolicyState;

    fn key_parts(key: &IdentityPolicyKey) -> Vec<String> {
        vec![key.identity.clone(), key.name.clone()]
    }

    fn parse_key(parts: &[&str]) -> Result<IdentityPolicyKey, DecodeError> {
        let [identity, name] = parts else {
            return Err(DecodeError::WrongArity {
                found: parts.len(),
                accepted: vec![2],
            });
        };
        if !is_policy_name(name) {
            return Err(DecodeError::InvalidPart {
                position: 1,
                reason: "policy name must be 1-64 letters, digits, hyphens or underscores",
            });
        }
        Ok(IdentityPolicyKey {
            identity: (*identity).to_owned(),
            name: (*name).to_owned(),
        })
    }

    fn desired_key(config: &IdentityPolicyConfig) -> Option<IdentityPolicyKey> {
        Some(IdentityPolicyKey {
            identity: config.identity.clone(),
            name: config.name.clone(),
        })
    }

    fn validate(config: &IdentityPolicyConfig) -> Result<(), String> {
        if config.identity.is_empty() {
            return Err("identity is required".to_owned());
        }
        if !is_policy_name(&config.name) {
            return Err(format!("invalid policy name {:?}", config.name));
        }
        PolicyDocument::parse(&config.policy)
            .map(drop)
            .map_err(|e| format!("policy: {e}"))
    }

    fn matches(desired: &IdentityPolicyConfig, remote: &IdentityPolicyState) -> bool {
        recon_policy::equivalent(&desired.policy, &remote.policy)
    }

    fn retain_desired(desired: &IdentityPolicyConfig, mut remote: IdentityPolicyState) -> IdentityPolicyState {
        remote.policy = recon_policy::prefer_desired(&desired.policy, &remote.policy).to_owned();
        remote
    }
}
