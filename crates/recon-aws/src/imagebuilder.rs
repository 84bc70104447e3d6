use crate::error::{from_sdk_error, incomplete_response};

use recon::kinds::distribution_configuration::{
    AmiDistribution, ContainerDistribution, Distribution, DistributionConfiguration, DistributionConfigurationConfig,
    DistributionConfigurationState, LaunchPermission, LaunchTemplateConfiguration, TargetRepository,
};
use recon::remote::{Deletion, Remote};
use recon::{RemoteError, RemoteErrorKind};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use aws_sdk_imagebuilder::Client;
use aws_sdk_imagebuilder::types as ib;

use tracing::debug;

/// Image Builder distribution configurations.
#[derive(Debug, Clone)]
pub struct ImageBuilderDistribution {
    client: Client,
}

impl ImageBuilderDistribution {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, arn: &str) -> Result<Option<ib::DistributionConfiguration>, RemoteError> {
        let result = self
            .client
            .get_distribution_configuration()
            .distribution_configuration_arn(arn)
            .send()
            .await;
        match result {
            Ok(output) => Ok(output.distribution_configuration().cloned()),
            Err(e) => {
                let err = from_sdk_error(e);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Tags are not part of `UpdateDistributionConfiguration`.
    async fn sync_tags(&self, arn: &str, desired: &BTreeMap<String, String>) -> Result<(), RemoteError> {
        let current = self.get(arn).await?.and_then(|c| c.tags().cloned()).unwrap_or_default();

        let stale: Vec<String> = current.keys().filter(|k| !desired.contains_key(*k)).cloned().collect();
        if !stale.is_empty() {
            debug!(arn, ?stale, "removing tags");
            self.client
                .untag_resource()
                .resource_arn(arn)
                .set_tag_keys(Some(stale))
                .send()
                .await
                .map_err(from_sdk_error)?;
        }

        let changed = desired.iter().any(|(k, v)| current.get(k) != Some(v));
        if changed {
            self.client
                .tag_resource()
                .resource_arn(arn)
                .set_tags(Some(to_hash_map(desired)))
                .send()
                .await
                .map_err(from_sdk_error)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Remote<DistributionConfiguration> for ImageBuilderDistribution {
    async fn create(&self, config: &DistributionConfigurationConfig) -> Result<String, RemoteError> {
        let distributions = to_sdk_distributions(config)?;
        let output = self
            .client
            .create_distribution_configuration()
            .name(&config.name)
            .set_description(config.description.clone())
            .set_distributions(Some(distributions))
            .set_tags((!config.tags.is_empty()).then(|| to_hash_map(&config.tags)))
            .send()
            .await
            .map_err(from_sdk_error)?;

        output
            .distribution_configuration_arn()
            .map(str::to_owned)
            .ok_or_else(|| incomplete_response("distributionConfigurationArn"))
    }

    async fn update(&self, arn: &String, config: &DistributionConfigurationConfig) -> Result<(), RemoteError> {
        let distributions = to_sdk_distributions(config)?;
        self.client
            .update_distribution_configuration()
            .distribution_configuration_arn(arn)
            .set_description(config.description.clone())
            .set_distributions(Some(distributions))
            .send()
            .await
            .map_err(from_sdk_error)?;

        self.sync_tags(arn, &config.tags).await
    }

    async fn fetch(&self, arn: &String) -> Result<Option<DistributionConfigurationState>, RemoteError> {
        match self.get(arn).await? {
            Some(c) => from_sdk_configuration(&c).map(Some),
            None => Ok(None),
        }
    }

    async fn delete(&self, arn: &String) -> Result<Deletion, RemoteError> {
        let result = self
            .client
            .delete_distribution_configuration()
            .distribution_configuration_arn(arn)
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

fn to_hash_map(map: &BTreeMap<String, String>) -> HashMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn to_vec(set: &BTreeSet<String>) -> Option<Vec<String>> {
    (!set.is_empty()).then(|| set.iter().cloned().collect())
}

fn invalid(e: &impl std::fmt::Display) -> RemoteError {
    RemoteError::with_message(RemoteErrorKind::Validation, e.to_string())
}

fn to_sdk_distributions(config: &DistributionConfigurationConfig) -> Result<Vec<ib::Distribution>, RemoteError> {
    config.distributions.iter().map(to_sdk_distribution).collect()
}

fn to_sdk_distribution(d: &Distribution) -> Result<ib::Distribution, RemoteError> {
    let ami = d.ami_distribution_configuration.as_ref().map(|ami| {
        ib::AmiDistributionConfiguration::builder()
            .set_name(ami.name.clone())
            .set_description(ami.description.clone())
            .set_kms_key_id(ami.kms_key_id.clone())
            .set_ami_tags((!ami.ami_tags.is_empty()).then(|| to_hash_map(&ami.ami_tags)))
            .set_target_account_ids(to_vec(&ami.target_account_ids))
            .set_launch_permission(ami.launch_permission.as_ref().map(|p| {
                ib::LaunchPermissionConfiguration::builder()
                    .set_user_groups(to_vec(&p.user_groups))
                    .set_user_ids(to_vec(&p.user_ids))
                    .build()
            }))
            .build()
    });

    let container = match &d.container_distribution_configuration {
        Some(c) => {
            let repository = ib::TargetContainerRepository::builder()
                .service(ib::ContainerRepositoryService::from(c.target_repository.service.as_str()))
                .repository_name(&c.target_repository.repository_name)
                .build()
                .map_err(|e| invalid(&e))?;
            Some(
                ib::ContainerDistributionConfiguration::builder()
                    .set_description(c.description.clone())
                    .set_container_tags(to_vec(&c.container_tags))
                    .target_repository(repository)
                    .build(),
            )
        }
        None => None,
    };

    let templates = d
        .launch_template_configurations
        .iter()
        .map(|t| {
            ib::LaunchTemplateConfiguration::builder()
                .launch_template_id(&t.launch_template_id)
                .set_default_version(t.default)
                .build()
                .map_err(|e| invalid(&e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    ib::Distribution::builder()
        .region(&d.region)
        .set_ami_distribution_configuration(ami)
        .set_container_distribution_configuration(container)
        .set_launch_template_configurations((!templates.is_empty()).then_some(templates))
        .set_license_configuration_arns(to_vec(&d.license_configuration_arns))
        .build()
        .map_err(|e| invalid(&e))
}

fn to_set(v: &[String]) -> BTreeSet<String> {
    v.iter().cloned().collect()
}

fn to_btree_map(map: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    map.map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn from_sdk_distribution(d: &ib::Distribution) -> Distribution {
    Distribution {
        region: d.region().to_owned(),
        ami_distribution_configuration: d.ami_distribution_configuration().map(|ami| AmiDistribution {
            name: ami.name().map(str::to_owned),
            description: ami.description().map(str::to_owned),
            kms_key_id: ami.kms_key_id().map(str::to_owned),
            ami_tags: to_btree_map(ami.ami_tags()),
            launch_permission: ami.launch_permission().map(|p| LaunchPermission {
                user_groups: to_set(p.user_groups()),
                user_ids: to_set(p.user_ids()),
            }),
            target_account_ids: to_set(ami.target_account_ids()),
        }),
        container_distribution_configuration: d.container_distribution_configuration().and_then(|c| {
            let repository = c.target_repository()?;
            Some(ContainerDistribution {
                container_tags: to_set(c.container_tags()),
                description: c.description().map(str::to_owned),
                target_repository: TargetRepository {
                    repository_name: repository.repository_name().to_owned(),
                    service: repository.service().as_str().to_owned(),
                },
            })
        }),
        launch_template_configurations: d
            .launch_template_configurations()
            .iter()
            .map(|t| LaunchTemplateConfiguration {
                default: t.set_default_version(),
                launch_template_id: t.launch_template_id().to_owned(),
            })
            .collect(),
        license_configuration_arns: to_set(d.license_configuration_arns()),
    }
}

fn from_sdk_configuration(c: &ib::DistributionConfiguration) -> Result<DistributionConfigurationState, RemoteError> {
    Ok(DistributionConfigurationState {
        arn: c.arn().ok_or_else(|| incomplete_response("arn"))?.to_owned(),
        name: c.name().ok_or_else(|| incomplete_response("name"))?.to_owned(),
        description: c.description().map(str::to_owned),
        distributions: c.distributions().iter().map(from_sdk_distribution).collect(),
        tags: to_btree_map(c.tags()),
        date_created: c.date_created().map(str::to_owned),
        date_updated: c.date_updated().map(str::to_owned),
    })
}
