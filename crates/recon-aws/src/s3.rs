use crate::error::{from_sdk_error, incomplete_response};

use recon::kinds::bucket_acl::{
    AccessControlPolicy, BucketAcl, BucketAclConfig, BucketAclKey, BucketAclState, Grant, Grantee, GranteeType, Owner,
    Permission,
};
use recon::remote::{Deletion, Remote};
use recon::{RemoteError, RemoteErrorKind};

use aws_sdk_s3::Client;
use aws_sdk_s3::types as s3;

use tracing::{debug, warn};

/// Bucket ACLs through `GetBucketAcl` / `PutBucketAcl`.
#[derive(Debug, Clone)]
pub struct S3BucketAcl {
    client: Client,
}

impl S3BucketAcl {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn put(&self, config: &BucketAclConfig) -> Result<(), RemoteError> {
        let mut req = self
            .client
            .put_bucket_acl()
            .bucket(&config.bucket)
            .set_expected_bucket_owner(config.expected_bucket_owner.clone());

        if let Some(acl) = &config.acl {
            req = req.acl(s3::BucketCannedAcl::from(acl.as_str()));
        }
        if let Some(policy) = &config.access_control_policy {
            req = req.access_control_policy(to_sdk_policy(policy)?);
        }

        req.send().await.map_err(from_sdk_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Remote<BucketAcl> for S3BucketAcl {
    async fn create(&self, config: &BucketAclConfig) -> Result<BucketAclKey, RemoteError> {
        self.put(config).await?;
        Ok(BucketAclKey {
            bucket: config.bucket.clone(),
            expected_bucket_owner: config.expected_bucket_owner.clone(),
            acl: config.acl.clone(),
        })
    }

    async fn update(&self, _key: &BucketAclKey, config: &BucketAclConfig) -> Result<(), RemoteError> {
        self.put(config).await
    }

    async fn fetch(&self, key: &BucketAclKey) -> Result<Option<BucketAclState>, RemoteError> {
        let result = self
            .client
            .get_bucket_acl()
            .bucket(&key.bucket)
            .set_expected_bucket_owner(key.expected_bucket_owner.clone())
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                let err = from_sdk_error(e);
                if err.is_not_found() {
                    return Ok(None);
                }
                return Err(err);
            }
        };

        let owner = output
            .owner()
            .and_then(s3::Owner::id)
            .ok_or_else(|| incomplete_response("owner"))?;

        Ok(Some(BucketAclState {
            bucket: key.bucket.clone(),
            expected_bucket_owner: key.expected_bucket_owner.clone(),
            acl: key.acl.clone(),
            access_control_policy: AccessControlPolicy {
                grants: output.grants().iter().filter_map(from_sdk_grant).collect(),
                owner: Owner {
                    id: owner.to_owned(),
                    display_name: None,
                },
            },
        }))
    }

    async fn delete(&self, key: &BucketAclKey) -> Result<Deletion, RemoteError> {
        debug!(bucket = %key.bucket, "bucket ACLs cannot be deleted, dropping from tracking");
        Ok(Deletion::Deleted)
    }
}

fn to_sdk_policy(policy: &AccessControlPolicy) -> Result<s3::AccessControlPolicy, RemoteError> {
    let grants = policy.grants.iter().map(to_sdk_grant).collect::<Result<Vec<_>, _>>()?;
    let owner = s3::Owner::builder().id(&policy.owner.id).build();
    Ok(s3::AccessControlPolicy::builder()
        .set_grants(Some(grants))
        .owner(owner)
        .build())
}

fn to_sdk_grant(grant: &Grant) -> Result<s3::Grant, RemoteError> {
    let g = &grant.grantee;
    let grantee = s3::Grantee::builder()
        .r#type(s3::Type::from(g.kind.as_str()))
        .set_id(g.id.clone())
        .set_uri(g.uri.clone())
        .set_email_address(g.email_address.clone())
        .build()
        .map_err(|e| RemoteError::with_message(RemoteErrorKind::Validation, e.to_string()))?;

    Ok(s3::Grant::builder()
        .grantee(grantee)
        .permission(s3::Permission::from(grant.permission.as_str()))
        .build())
}

fn from_sdk_grant(grant: &s3::Grant) -> Option<Grant> {
    let (Some(grantee), Some(permission)) = (grant.grantee(), grant.permission()) else {
        warn!(?grant, "skipping incomplete grant");
        return None;
    };
    let (Some(kind), Some(permission)) = (
        GranteeType::from_str_opt(grantee.r#type().as_str()),
        Permission::from_str_opt(permission.as_str()),
    ) else {
        warn!(?grant, "skipping grant of unknown type or permission");
        return None;
    };
    Some(Grant::new(
        Grantee {
            kind,
            id: grantee.id().map(str::to_owned),
            uri: grantee.uri().map(str::to_owned),
            email_address: grantee.email_address().map(str::to_owned),
            display_name: None,
        },
        permission,
    ))
}
