//! Image Builder distribution configuration
//!
//! The identifier is the ARN the remote assigns on create, so this kind has a single
//! identifier part and no caller-chosen key.

use crate::error::DecodeError;
use crate::id::IdCodec;
use crate::resource::Resource;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Marker for the `imagebuilder_distribution_configuration` kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionConfiguration;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaunchPermission {
    #[serde(default)]
    pub user_groups: BTreeSet<String>,
    #[serde(default)]
    pub user_ids: BTreeSet<String>,
}

impl LaunchPermission {
    fn is_empty(&self) -> bool {
        self.user_groups.is_empty() && self.user_ids.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AmiDistribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(default)]
    pub ami_tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_permission: Option<LaunchPermission>,
    #[serde(default)]
    pub target_account_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRepository {
    pub repository_name: String,
    /// Only `ECR` is accepted by the remote.
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerDistribution {
    #[serde(default)]
    pub container_tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub target_repository: TargetRepository,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaunchTemplateConfiguration {
    #[serde(default = "default_true")]
    pub default: bool,
    pub launch_template_id: String,
}

fn default_true() -> bool {
    true
}

/// Per-region distribution settings. Ordered by region first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Distribution {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami_distribution_configuration: Option<AmiDistribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_distribution_configuration: Option<ContainerDistribution>,
    #[serde(default)]
    pub launch_template_configurations: BTreeSet<LaunchTemplateConfiguration>,
    #[serde(default)]
    pub license_configuration_arns: BTreeSet<String>,
}

impl Distribution {
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ami_distribution_configuration: None,
            container_distribution_configuration: None,
            launch_template_configurations: BTreeSet::new(),
            license_configuration_arns: BTreeSet::new(),
        }
    }

    fn normalized(mut self) -> Self {
        if let Some(ami) = &mut self.ami_distribution_configuration {
            if ami.launch_permission.as_ref().is_some_and(LaunchPermission::is_empty) {
                ami.launch_permission = None;
            }
            ami.description = non_empty(ami.description.take());
        }
        if let Some(container) = &mut self.container_distribution_configuration {
            container.description = non_empty(container.description.take());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfigurationConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub distributions: BTreeSet<Distribution>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfigurationState {
    pub arn: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub distributions: BTreeSet<Distribution>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

fn is_distribution_configuration_arn(s: &str) -> bool {
    let mut fields = s.splitn(6, ':');
    let (Some("arn"), Some(partition), Some("imagebuilder"), Some(region), Some(account), Some(resource)) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return false;
    };
    !partition.is_empty()
        && !region.is_empty()
        && recon_policy::is_account_id(account)
        && resource
            .strip_prefix("distribution-configuration/")
            .is_some_and(|name| !name.is_empty())
}

impl Resource for DistributionConfiguration {
    const NAME: &'static str = "imagebuilder_distribution_configuration";
    const CODEC: IdCodec = IdCodec::new(",", &[1]);

    type Key = String;
    type Config = DistributionConfigurationConfig;
    type State = DistributionConfigurationState;

    fn key_parts(key: &String) -> Vec<String> {
        vec![key.clone()]
    }

    fn parse_key(parts: &[&str]) -> Result<String, DecodeError> {
        match parts {
            [arn] if is_distribution_configuration_arn(arn) => Ok((*arn).to_owned()),
            [_] => Err(DecodeError::InvalidPart {
                position: 0,
                reason: "expected an Image Builder distribution configuration ARN",
            }),
            _ => Err(DecodeError::WrongArity {
                found: parts.len(),
                accepted: vec![1],
            }),
        }
    }

    fn validate(config: &DistributionConfigurationConfig) -> Result<(), String> {
        if config.name.is_empty() {
            return Err("name is required".to_owned());
        }
        if config.distributions.is_empty() {
            return Err("at least one distribution is required".to_owned());
        }
        let mut regions = BTreeSet::new();
        for d in &config.distributions {
            if d.region.is_empty() {
                return Err("distribution region is required".to_owned());
            }
            if !regions.insert(d.region.as_str()) {
                return Err(format!("region {:?} has more than one distribution", d.region));
            }
            if let Some(container) = &d.container_distribution_configuration
                && container.target_repository.service != "ECR"
            {
                return Err(format!(
                    "unsupported container repository service {:?}",
                    container.target_repository.service
                ));
            }
            if d.launch_template_configurations.iter().any(|t| t.launch_template_id.is_empty()) {
                return Err("launch_template_id is required".to_owned());
            }
        }
        Ok(())
    }

    fn normalize(mut state: DistributionConfigurationState) -> DistributionConfigurationState {
        state.description = non_empty(state.description);
        state.distributions = state.distributions.into_iter().map(Distribution::normalized).collect();
        state
    }

    fn matches(desired: &DistributionConfigurationConfig, remote: &DistributionConfigurationState) -> bool {
        let distributions: BTreeSet<_> = desired.distributions.iter().cloned().map(Distribution::normalized).collect();
        non_empty(desired.description.clone()) == remote.description
            && distributions == remote.distributions
            && desired.tags == remote.tags
    }

    fn replaces(desired: &DistributionConfigurationConfig, remote: &DistributionConfigurationState) -> bool {
        desired.name != remote.name
    }
}
