use std::{collections::BTreeMap, future::Future};

use anyhow::Result;
use aws_sdk_eks::types::{Addon, Cluster, Nodegroup};

use crate::eks::resources as eks_resources;

/// Trait abstracting all EKS API operations used by eksctl
pub trait AwsClients {
  fn get_cluster(&self, name: &str) -> impl Future<Output = Result<Cluster>> + Send;
  fn get_nodegroup(&self, cluster_name: &str, nodegroup_name: &str) -> impl Future<Output = Result<Nodegroup>> + Send;
  fn update_nodegroup_labels(
    &self,
    cluster_name: &str,
    nodegroup_name: &str,
    add: &BTreeMap<String, String>,
    remove: &[String],
  ) -> impl Future<Output = Result<()>> + Send;
  fn list_addons(&self, cluster_name: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
  fn get_addon(&self, cluster_name: &str, name: &str) -> impl Future<Output = Result<Addon>> + Send;
  fn get_addon_versions(
    &self,
    name: &str,
    kubernetes_version: &str,
  ) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Real AWS client implementation wrapping the SDK client
pub struct RealAwsClients {
  eks: aws_sdk_eks::Client,
}

impl RealAwsClients {
  pub fn new(config: &aws_config::SdkConfig) -> Self {
    Self {
      eks: aws_sdk_eks::Client::new(config),
    }
  }
}

impl AwsClients for RealAwsClients {
  async fn get_cluster(&self, name: &str) -> Result<Cluster> {
    eks_resources::get_cluster(&self.eks, name).await
  }

  async fn get_nodegroup(&self, cluster_name: &str, nodegroup_name: &str) -> Result<Nodegroup> {
    eks_resources::get_nodegroup(&self.eks, cluster_name, nodegroup_name).await
  }

  async fn update_nodegroup_labels(
    &self,
    cluster_name: &str,
    nodegroup_name: &str,
    add: &BTreeMap<String, String>,
    remove: &[String],
  ) -> Result<()> {
    eks_resources::update_nodegroup_labels(&self.eks, cluster_name, nodegroup_name, add, remove).await
  }

  async fn list_addons(&self, cluster_name: &str) -> Result<Vec<String>> {
    eks_resources::list_addons(&self.eks, cluster_name).await
  }

  async fn get_addon(&self, cluster_name: &str, name: &str) -> Result<Addon> {
    eks_resources::get_addon(&self.eks, cluster_name, name).await
  }

  async fn get_addon_versions(&self, name: &str, kubernetes_version: &str) -> Result<Vec<String>> {
    eks_resources::get_addon_versions(&self.eks, name, kubernetes_version).await
  }
}
