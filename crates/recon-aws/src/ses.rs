use crate::error::from_sdk_error;

use recon::kinds::identity_policy::{IdentityPolicy, IdentityPolicyConfig, IdentityPolicyKey, IdentityPolicyState};
use recon::remote::{Deletion, Remote};
use recon::RemoteError;

use aws_sdk_ses::Client;

/// SES sending-authorization policies.
#[derive(Debug, Clone)]
pub struct SesIdentityPolicy {
    client: Client,
}

impl SesIdentityPolicy {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn put(&self, identity: &str, name: &str, policy: &str) -> Result<(), RemoteError> {
        self.client
            .put_identity_policy()
            .identity(identity)
            .policy_name(name)
            .policy(policy)
            .send()
            .await
            .map_err(from_sdk_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Remote<IdentityPolicy> for SesIdentityPolicy {
    async fn create(&self, config: &IdentityPolicyConfig) -> Result<IdentityPolicyKey, RemoteError> {
        self.put(&config.identity, &config.name, &config.policy).await?;
        Ok(IdentityPolicyKey {
            identity: config.identity.clone(),
            name: config.name.clone(),
        })
    }

    async fn update(&self, key: &IdentityPolicyKey, config: &IdentityPolicyConfig) -> Result<(), RemoteError> {
        self.put(&key.identity, &key.name, &config.policy).await
    }

    async fn fetch(&self, key: &IdentityPolicyKey) -> Result<Option<IdentityPolicyState>, RemoteError> {
        let output = self
            .client
            .get_identity_policies()
            .identity(&key.identity)
            .policy_names(&key.name)
            .send()
            .await
            .map_err(from_sdk_error)?;

        // an unknown identity or policy name yields an empty map
        Ok(output.policies().get(&key.name).map(|policy| IdentityPolicyState {
            identity: key.identity.clone(),
            name: key.name.clone(),
            policy: policy.clone(),
        }))
    }

    async fn delete(&self, key: &IdentityPolicyKey) -> Result<Deletion, RemoteError> {
        let result = self
            .client
            .delete_identity_policy()
            .identity(&key.identity)
            .policy_name(&key.name)
            .send()
            .await;
        match result {
            Ok(_) => Ok(Deletion::Deleted),
            Err(e) => {
                let err = from_sdk_error(e);
                if err.is_not_found() {
                    Ok(Deletion::AlreadyAbsent)
                } else {
                    Err(err)
                }
            }
        }
    }
}
