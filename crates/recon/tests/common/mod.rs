#![allow(dead_code)]

use recon::kinds::bucket_acl::{AccessControlPolicy, BucketAcl, BucketAclConfig, BucketAclKey, BucketAclState, Owner, expand_canned_acl};
use recon::kinds::distribution_configuration::{
    DistributionConfiguration, DistributionConfigurationConfig, DistributionConfigurationState,
};
use recon::kinds::identity_policy::{IdentityPolicy, IdentityPolicyConfig, IdentityPolicyKey, IdentityPolicyState};
use recon::remote::{Deletion, Remote};
use recon::{RemoteError, RemoteErrorKind, remote_error};
use recon_policy::PolicyDocument;

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
pub struct Calls {
    pub create: AtomicUsize,
    pub update: AtomicUsize,
    pub fetch: AtomicUsize,
    pub delete: AtomicUsize,
}

impl Calls {
    pub fn create(&self) -> usize {
        self.create.load(Ordering::SeqCst)
    }

    pub fn update(&self) -> usize {
        self.update.load(Ordering::SeqCst)
    }

    pub fn fetch(&self) -> usize {
        self.fetch.load(Ordering::SeqCst)
    }

    pub fn delete(&self) -> usize {
        self.delete.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.create() + self.update() + self.delete()
    }
}

/// SES stand-in. Stores policies the way the service does: reformatted.
#[derive(Debug, Default)]
pub struct FakeSes {
    pub calls: Calls,
    policies: Mutex<HashMap<(String, String), String>>,
    fetch_failure: Mutex<Option<RemoteErrorKind>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSes {
    pub fn with_policy(identity: &str, name: &str, policy: &str) -> Self {
        let this = Self::default();
        this.put(identity, name, policy);
        this
    }

    pub fn put(&self, identity: &str, name: &str, policy: &str) {
        let stored = PolicyDocument::parse(policy).map_or_else(|_| policy.to_owned(), |doc| doc.to_canonical_string());
        let mut policies = self.policies.lock().unwrap();
        policies.insert((identity.to_owned(), name.to_owned()), stored);
    }

    pub fn stored(&self, identity: &str, name: &str) -> Option<String> {
        let policies = self.policies.lock().unwrap();
        policies.get(&(identity.to_owned(), name.to_owned())).cloned()
    }

    /// Deletes behind the reconciler's back.
    pub fn remove(&self, identity: &str, name: &str) {
        let mut policies = self.policies.lock().unwrap();
        policies.remove(&(identity.to_owned(), name.to_owned()));
    }

    pub fn fail_fetches(&self, kind: Option<RemoteErrorKind>) {
        *self.fetch_failure.lock().unwrap() = kind;
    }

    fn contains(&self, key: &IdentityPolicyKey) -> bool {
        self.stored(&key.identity, &key.name).is_some()
    }
}

#[async_trait::async_trait]
impl Remote<IdentityPolicy> for FakeSes {
    async fn create(&self, config: &IdentityPolicyConfig) -> Result<IdentityPolicyKey, RemoteError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.put(&config.identity, &config.name, &config.policy);
        Ok(IdentityPolicyKey {
            identity: config.identity.clone(),
            name: config.name.clone(),
        })
    }

    async fn update(&self, key: &IdentityPolicyKey, config: &IdentityPolicyConfig) -> Result<(), RemoteError> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        self.put(&key.identity, &key.name, &config.policy);
        Ok(())
    }

    async fn fetch(&self, key: &IdentityPolicyKey) -> Result<Option<IdentityPolicyState>, RemoteError> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failure = *self.fetch_failure.lock().unwrap();
        if let Some(kind) = failure {
            return Err(RemoteError::with_message(kind, "injected").with_code("Injected"));
        }

        Ok(self.stored(&key.identity, &key.name).map(|policy| IdentityPolicyState {
            identity: key.identity.clone(),
            name: key.name.clone(),
            policy,
        }))
    }

    async fn delete(&self, key: &IdentityPolicyKey) -> Result<Deletion, RemoteError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        if !self.contains(key) {
            return Err(remote_error!(NotFound, "identity {} has no policy {}", key.identity, key.name));
        }
        self.remove(&key.identity, &key.name);
        Ok(Deletion::Deleted)
    }
}

pub const OWNER_ID: &str = "79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2be";

/// S3 stand-in. ACLs exist exactly as long as their bucket.
#[derive(Debug, Default)]
pub struct FakeS3 {
    pub calls: Calls,
    acls: Mutex<HashMap<String, AccessControlPolicy>>,
}

impl FakeS3 {
    pub fn with_buckets(buckets: &[&str]) -> Self {
        let this = Self::default();
        for bucket in buckets {
            this.set_acl(bucket, "private");
        }
        this
    }

    pub fn set_acl(&self, bucket: &str, acl: &str) {
        let grants = expand_canned_acl(acl, OWNER_ID).unwrap();
        let policy = AccessControlPolicy {
            grants,
            owner: owner(),
        };
        self.acls.lock().unwrap().insert(bucket.to_owned(), policy);
    }

    pub fn delete_bucket(&self, bucket: &str) {
        self.acls.lock().unwrap().remove(bucket);
    }

    fn no_such_bucket(bucket: &str) -> RemoteError {
        remote_error!(NotFound, "The specified bucket does not exist: {bucket}").with_code("NoSuchBucket")
    }

    fn put(&self, config: &BucketAclConfig) -> Result<(), RemoteError> {
        let mut acls = self.acls.lock().unwrap();
        let Some(current) = acls.get_mut(&config.bucket) else {
            return Err(Self::no_such_bucket(&config.bucket));
        };
        *current = match (&config.acl, &config.access_control_policy) {
            (_, Some(policy)) => policy.clone(),
            (Some(acl), None) => AccessControlPolicy {
                grants: expand_canned_acl(acl, OWNER_ID).ok_or_else(|| remote_error!(Validation, "unsupported ACL {acl}"))?,
                owner: owner(),
            },
            (None, None) => return Err(remote_error!(Validation, "missing ACL")),
        };
        Ok(())
    }
}

fn owner() -> Owner {
    Owner {
        id: OWNER_ID.to_owned(),
        display_name: Some("owner".to_owned()),
    }
}

#[async_trait::async_trait]
impl Remote<BucketAcl> for FakeS3 {
    async fn create(&self, config: &BucketAclConfig) -> Result<BucketAclKey, RemoteError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.put(config)?;
        Ok(BucketAclKey {
            bucket: config.bucket.clone(),
            expected_bucket_owner: config.expected_bucket_owner.clone(),
            acl: config.acl.clone(),
        })
    }

    async fn update(&self, _: &BucketAclKey, config: &BucketAclConfig) -> Result<(), RemoteError> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        self.put(config)
    }

    async fn fetch(&self, key: &BucketAclKey) -> Result<Option<BucketAclState>, RemoteError> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        let acls = self.acls.lock().unwrap();
        let Some(policy) = acls.get(&key.bucket) else {
            return Err(Self::no_such_bucket(&key.bucket));
        };
        Ok(Some(BucketAclState {
            bucket: key.bucket.clone(),
            expected_bucket_owner: key.expected_bucket_owner.clone(),
            acl: key.acl.clone(),
            access_control_policy: policy.clone(),
        }))
    }

    async fn delete(&self, _: &BucketAclKey) -> Result<Deletion, RemoteError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        Ok(Deletion::Deleted)
    }
}

/// Image Builder stand-in. Assigns ARNs and refuses duplicate names.
#[derive(Debug, Default)]
pub struct FakeImageBuilder {
    pub calls: Calls,
    configs: Mutex<HashMap<String, DistributionConfigurationState>>,
}

impl FakeImageBuilder {
    pub fn arn(name: &str) -> String {
        format!("arn:aws:imagebuilder:us-east-1:123456789012:distribution-configuration/{name}")
    }

    pub fn len(&self) -> usize {
        self.configs.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Remote<DistributionConfiguration> for FakeImageBuilder {
    async fn create(&self, config: &DistributionConfigurationConfig) -> Result<String, RemoteError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        let arn = Self::arn(&config.name);
        let mut configs = self.configs.lock().unwrap();
        if configs.contains_key(&arn) {
            return Err(remote_error!(Conflict, "{arn} already exists").with_code("ResourceAlreadyExistsException"));
        }
        let state = DistributionConfigurationState {
            arn: arn.clone(),
            name: config.name.clone(),
            description: Some(config.description.clone().unwrap_or_default()),
            distributions: config.distributions.clone(),
            tags: config.tags.clone(),
            date_created: Some("2021-01-01T00:00:00Z".to_owned()),
            date_updated: None,
        };
        configs.insert(arn.clone(), state);
        Ok(arn)
    }

    async fn update(&self, arn: &String, config: &DistributionConfigurationConfig) -> Result<(), RemoteError> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        let mut configs = self.configs.lock().unwrap();
        let Some(state) = configs.get_mut(arn) else {
            return Err(remote_error!(NotFound).with_code("ResourceNotFoundException"));
        };
        state.description = config.description.clone();
        state.distributions = config.distributions.clone();
        state.tags = config.tags.clone();
        state.date_updated = Some("2021-01-02T00:00:00Z".to_owned());
        Ok(())
    }

    async fn fetch(&self, arn: &String) -> Result<Option<DistributionConfigurationState>, RemoteError> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        Ok(self.configs.lock().unwrap().get(arn).cloned())
    }

    async fn delete(&self, arn: &String) -> Result<Deletion, RemoteError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        match self.configs.lock().unwrap().remove(arn) {
            Some(_) => Ok(Deletion::Deleted),
            None => Ok(Deletion::AlreadyAbsent),
        }
    }
}
