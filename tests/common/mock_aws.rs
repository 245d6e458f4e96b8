use std::{
  collections::{BTreeMap, HashMap},
  sync::Mutex,
};

use anyhow::{Result, bail};
use aws_sdk_eks::types::{Addon, Cluster, Nodegroup};

use eksctl::clients::AwsClients;

/// A label update sent to EKS: nodegroup, labels added, keys removed
pub type LabelUpdate = (String, BTreeMap<String, String>, Vec<String>);

/// Mock EKS client for testing. All fields default to an empty, healthy cluster.
pub struct MockAwsClients {
  pub cluster: Cluster,
  pub nodegroups: HashMap<String, Nodegroup>,
  pub addons: Vec<Addon>,
  pub addon_versions: HashMap<String, Vec<String>>,
  pub label_updates: Mutex<Vec<LabelUpdate>>,
}

impl Default for MockAwsClients {
  fn default() -> Self {
    Self {
      cluster: Cluster::builder().name("test-cluster").version("1.30").build(),
      nodegroups: HashMap::new(),
      addons: vec![],
      addon_versions: HashMap::new(),
      label_updates: Mutex::new(vec![]),
    }
  }
}

impl MockAwsClients {
  pub fn label_updates(&self) -> Vec<LabelUpdate> {
    self.label_updates.lock().unwrap().clone()
  }
}

impl AwsClients for MockAwsClients {
  async fn get_cluster(&self, _name: &str) -> Result<Cluster> {
    Ok(self.cluster.clone())
  }

  async fn get_nodegroup(&self, _cluster_name: &str, nodegroup_name: &str) -> Result<Nodegroup> {
    self
      .nodegroups
      .get(nodegroup_name)
      .cloned()
      .ok_or_else(|| anyhow::anyhow!("No mock nodegroup {nodegroup_name}"))
  }

  async fn update_nodegroup_labels(
    &self,
    _cluster_name: &str,
    nodegroup_name: &str,
    add: &BTreeMap<String, String>,
    remove: &[String],
  ) -> Result<()> {
    self
      .label_updates
      .lock()
      .unwrap()
      .push((nodegroup_name.to_string(), add.clone(), remove.to_vec()));
    Ok(())
  }

  async fn list_addons(&self, _cluster_name: &str) -> Result<Vec<String>> {
    Ok(
      self
        .addons
        .iter()
        .filter_map(|addon| addon.addon_name().map(str::to_string))
        .collect(),
    )
  }

  async fn get_addon(&self, _cluster_name: &str, name: &str) -> Result<Addon> {
    self
      .addons
      .iter()
      .find(|addon| addon.addon_name() == Some(name))
      .cloned()
      .ok_or_else(|| anyhow::anyhow!("No mock addon {name}"))
  }

  async fn get_addon_versions(&self, name: &str, _kubernetes_version: &str) -> Result<Vec<String>> {
    self
      .addon_versions
      .get(name)
      .cloned()
      .ok_or_else(|| anyhow::anyhow!("No mock addon versions for {name}"))
  }
}

/// Mock EKS client where every call fails
pub struct MockAwsClientsError;

impl AwsClients for MockAwsClientsError {
  async fn get_cluster(&self, _name: &str) -> Result<Cluster> {
    bail!("mock AWS error: get_cluster")
  }

  async fn get_nodegroup(&self, _cluster_name: &str, _nodegroup_name: &str) -> Result<Nodegroup> {
    bail!("mock AWS error: get_nodegroup")
  }

  async fn update_nodegroup_labels(
    &self,
    _cluster_name: &str,
    _nodegroup_name: &str,
    _add: &BTreeMap<String, String>,
    _remove: &[String],
  ) -> Result<()> {
    bail!("mock AWS error: update_nodegroup_labels")
  }

  async fn list_addons(&self, _cluster_name: &str) -> Result<Vec<String>> {
    bail!("mock AWS error: list_addons")
  }

  async fn get_addon(&self, _cluster_name: &str, _name: &str) -> Result<Addon> {
    bail!("mock AWS error: get_addon")
  }

  async fn get_addon_versions(&self, _name: &str, _kubernetes_version: &str) -> Result<Vec<String>> {
    bail!("mock AWS error: get_addon_versions")
  }
}
