use std::{collections::BTreeMap, collections::HashSet, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "eksctl.io/v1alpha5";
pub const CLUSTER_CONFIG_KIND: &str = "ClusterConfig";

pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_GIT_USER: &str = "Flux";
pub const DEFAULT_FLUX_PATH: &str = "flux/";
pub const DEFAULT_OPERATOR_LABEL: &str = "flux";
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "flux";
pub const DEFAULT_PROFILE_REVISION: &str = "master";

pub const DEFAULT_NODE_COUNT: i32 = 2;
pub const DEFAULT_VOLUME_SIZE: i32 = 80;
pub const DEFAULT_VOLUME_TYPE: &str = "gp3";
pub const DEFAULT_INSTANCE_TYPE: &str = "m5.large";
pub const DEFAULT_AMI_FAMILY: &str = "AmazonLinux2";

/// A cluster definition as read from `-f/--config-file`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
  #[serde(default = "default_api_version")]
  pub api_version: String,
  #[serde(default = "default_kind")]
  pub kind: String,
  #[serde(default)]
  pub metadata: ClusterMeta,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub managed_node_groups: Vec<ManagedNodeGroup>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub addons: Vec<Addon>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub git: Option<Git>,
}

impl Default for ClusterConfig {
  fn default() -> Self {
    Self {
      api_version: default_api_version(),
      kind: default_kind(),
      metadata: ClusterMeta::default(),
      managed_node_groups: Vec::new(),
      addons: Vec::new(),
      git: None,
    }
  }
}

fn default_api_version() -> String {
  API_VERSION.to_string()
}

fn default_kind() -> String {
  CLUSTER_CONFIG_KIND.to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMeta {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub region: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedNodeGroup {
  pub name: String,
  #[serde(default = "default_ami_family")]
  pub ami_family: String,
  #[serde(default = "default_instance_type")]
  pub instance_type: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub instance_types: Vec<String>,
  #[serde(default = "default_node_count")]
  pub desired_capacity: i32,
  #[serde(default = "default_node_count")]
  pub min_size: i32,
  #[serde(default = "default_node_count")]
  pub max_size: i32,
  #[serde(default = "default_volume_size")]
  pub volume_size: i32,
  #[serde(default = "default_volume_type")]
  pub volume_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub volume_encrypted: Option<bool>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub labels: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub tags: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub taints: Vec<Taint>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub subnets: Vec<String>,
  #[serde(default)]
  pub private_networking: bool,
  #[serde(default)]
  pub spot: bool,
  #[serde(default)]
  pub disable_imdsv1: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub release_version: Option<String>,
  #[serde(default)]
  pub ssh: NodeGroupSsh,
  #[serde(default)]
  pub iam: NodeGroupIam,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub update_config: Option<UpdateConfig>,
}

impl ManagedNodeGroup {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ami_family: default_ami_family(),
      instance_type: default_instance_type(),
      instance_types: Vec::new(),
      desired_capacity: DEFAULT_NODE_COUNT,
      min_size: DEFAULT_NODE_COUNT,
      max_size: DEFAULT_NODE_COUNT,
      volume_size: DEFAULT_VOLUME_SIZE,
      volume_type: default_volume_type(),
      volume_encrypted: None,
      labels: BTreeMap::new(),
      tags: BTreeMap::new(),
      taints: Vec::new(),
      subnets: Vec::new(),
      private_networking: false,
      spot: false,
      disable_imdsv1: false,
      release_version: None,
      ssh: NodeGroupSsh::default(),
      iam: NodeGroupIam::default(),
      update_config: None,
    }
  }

  /// Instance types requested for the node group, `instanceTypes` winning over `instanceType`
  pub fn instance_type_list(&self) -> Vec<String> {
    if self.instance_types.is_empty() {
      vec![self.instance_type.clone()]
    } else {
      self.instance_types.clone()
    }
  }
}

fn default_ami_family() -> String {
  DEFAULT_AMI_FAMILY.to_string()
}

fn default_instance_type() -> String {
  DEFAULT_INSTANCE_TYPE.to_string()
}

fn default_volume_type() -> String {
  DEFAULT_VOLUME_TYPE.to_string()
}

fn default_node_count() -> i32 {
  DEFAULT_NODE_COUNT
}

fn default_volume_size() -> i32 {
  DEFAULT_VOLUME_SIZE
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
  pub key: String,
  #[serde(default)]
  pub value: String,
  pub effect: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupSsh {
  #[serde(default)]
  pub allow: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub public_key_name: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub source_security_group_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupIam {
  #[serde(default, rename = "instanceRoleARN", skip_serializing_if = "Option::is_none")]
  pub instance_role_arn: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub instance_role_name: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub attach_policy_arns: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_unavailable: Option<i32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_unavailable_percentage: Option<i32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, rename = "serviceAccountRoleARN", skip_serializing_if = "Option::is_none")]
  pub service_account_role_arn: Option<String>,
}

/// GitOps settings, `git` in the config file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Git {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repo: Option<Repo>,
  #[serde(default)]
  pub operator: Operator,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bootstrap_profile: Option<Profile>,
}

/// The user's GitOps repository
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
  #[serde(default)]
  pub url: String,
  #[serde(default = "default_branch")]
  pub branch: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub paths: Vec<String>,
  #[serde(default = "default_flux_path")]
  pub flux_path: String,
  #[serde(default = "default_git_user")]
  pub user: String,
  #[serde(default)]
  pub email: String,
  #[serde(default, rename = "privateSSHKeyPath")]
  pub private_ssh_key_path: String,
}

impl Default for Repo {
  fn default() -> Self {
    Self {
      url: String::new(),
      branch: default_branch(),
      paths: Vec::new(),
      flux_path: default_flux_path(),
      user: default_git_user(),
      email: String::new(),
      private_ssh_key_path: String::new(),
    }
  }
}

fn default_branch() -> String {
  DEFAULT_BRANCH.to_string()
}

fn default_flux_path() -> String {
  DEFAULT_FLUX_PATH.to_string()
}

fn default_git_user() -> String {
  DEFAULT_GIT_USER.to_string()
}

/// How Flux and the Helm Operator are installed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
  #[serde(default = "default_true")]
  pub commit_operator_manifests: bool,
  #[serde(default = "default_operator_label")]
  pub label: String,
  #[serde(default = "default_operator_namespace")]
  pub namespace: String,
  #[serde(default = "default_true")]
  pub with_helm: bool,
  #[serde(default)]
  pub read_only: bool,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub additional_flux_args: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub additional_helm_operator_args: Vec<String>,
}

impl Default for Operator {
  fn default() -> Self {
    Self {
      commit_operator_manifests: true,
      label: default_operator_label(),
      namespace: default_operator_namespace(),
      with_helm: true,
      read_only: false,
      additional_flux_args: Vec::new(),
      additional_helm_operator_args: Vec::new(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_operator_label() -> String {
  DEFAULT_OPERATOR_LABEL.to_string()
}

fn default_operator_namespace() -> String {
  DEFAULT_OPERATOR_NAMESPACE.to_string()
}

/// A Quick Start profile to bootstrap the repository with
///
/// An empty `revision` keeps the default branch of the profile's repository.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  #[serde(default)]
  pub source: String,
  #[serde(default)]
  pub revision: String,
  #[serde(default)]
  pub output_path: String,
}

impl ClusterConfig {
  pub fn new(name: &str, region: &str) -> Self {
    Self {
      metadata: ClusterMeta {
        name: name.to_string(),
        region: region.to_string(),
        ..Default::default()
      },
      ..Default::default()
    }
  }

  pub fn managed_node_group(&self, name: &str) -> Option<&ManagedNodeGroup> {
    self.managed_node_groups.iter().find(|ng| ng.name == name)
  }

  /// Checks sizes and name uniqueness of the managed node groups
  pub fn validate_managed_nodegroups(&self) -> Result<()> {
    let mut names = HashSet::new();

    for (i, ng) in self.managed_node_groups.iter().enumerate() {
      if ng.name.is_empty() {
        bail!("managedNodeGroups[{i}].name must be set");
      }
      if !names.insert(ng.name.as_str()) {
        bail!("managedNodeGroups[{i}].name {} is not unique", ng.name);
      }
      if ng.min_size > ng.desired_capacity {
        bail!(
          "cannot use --nodes-min={} and --nodes={} at the same time",
          ng.min_size,
          ng.desired_capacity
        );
      }
      if ng.desired_capacity > ng.max_size {
        bail!(
          "cannot use --nodes-max={} and --nodes={} at the same time",
          ng.max_size,
          ng.desired_capacity
        );
      }
    }

    Ok(())
  }
}

/// Reads and parses a cluster config file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<ClusterConfig> {
  let path = path.as_ref();
  let contents =
    std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
  let config: ClusterConfig =
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file: {}", path.display()))?;

  if config.api_version != API_VERSION {
    bail!(
      "unsupported apiVersion {} in {}, expected {API_VERSION}",
      config.api_version,
      path.display()
    );
  }
  if config.kind != CLUSTER_CONFIG_KIND {
    bail!("unsupported kind {} in {}", config.kind, path.display());
  }

  Ok(config)
}
