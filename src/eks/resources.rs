use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use aws_sdk_eks::{
  Client as EksClient,
  types::{Addon, Cluster, Nodegroup, UpdateLabelsPayload},
};
use tracing::debug;

/// Describe the cluster to get its full details
pub async fn get_cluster(client: &EksClient, name: &str) -> Result<Cluster> {
  client
    .describe_cluster()
    .name(name)
    .send()
    .await
    .with_context(|| format!("failed to describe cluster {name}"))?
    .cluster
    .with_context(|| format!("Cluster {name} not found"))
}

pub async fn get_nodegroup(client: &EksClient, cluster_name: &str, nodegroup_name: &str) -> Result<Nodegroup> {
  client
    .describe_nodegroup()
    .cluster_name(cluster_name)
    .nodegroup_name(nodegroup_name)
    .send()
    .await
    .with_context(|| format!("failed to describe nodegroup {nodegroup_name}"))?
    .nodegroup
    .with_context(|| format!("Nodegroup {nodegroup_name} not found"))
}

/// Update the Kubernetes labels of a managed node group through the EKS API
///
/// Used for node groups that are not backed by an eksctl stack
pub async fn update_nodegroup_labels(
  client: &EksClient,
  cluster_name: &str,
  nodegroup_name: &str,
  add: &BTreeMap<String, String>,
  remove: &[String],
) -> Result<()> {
  let add_or_update: HashMap<String, String> = add.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
  let payload = UpdateLabelsPayload::builder()
    .set_add_or_update_labels((!add_or_update.is_empty()).then_some(add_or_update))
    .set_remove_labels((!remove.is_empty()).then(|| remove.to_vec()))
    .build();

  let update = client
    .update_nodegroup_config()
    .cluster_name(cluster_name)
    .nodegroup_name(nodegroup_name)
    .labels(payload)
    .send()
    .await
    .with_context(|| format!("failed to update labels of nodegroup {nodegroup_name}"))?;

  debug!(
    "nodegroup {nodegroup_name} label update {} started",
    update.update().and_then(|u| u.id()).unwrap_or_default()
  );

  Ok(())
}

pub async fn list_addons(client: &EksClient, cluster_name: &str) -> Result<Vec<String>> {
  let names = client
    .list_addons()
    .cluster_name(cluster_name)
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await?;

  Ok(names)
}

pub async fn get_addon(client: &EksClient, cluster_name: &str, name: &str) -> Result<Addon> {
  client
    .describe_addon()
    .cluster_name(cluster_name)
    .addon_name(name)
    .send()
    .await?
    .addon
    .with_context(|| format!("Addon {name} not found"))
}

/// Get every version of an addon that supports the given Kubernetes version
///
/// Versions are returned in the order the EKS API lists them, latest first
pub async fn get_addon_versions(client: &EksClient, name: &str, kubernetes_version: &str) -> Result<Vec<String>> {
  let describe = client
    .describe_addon_versions()
    .addon_name(name)
    .kubernetes_version(kubernetes_version)
    .send()
    .await?;

  Ok(
    describe
      .addons()
      .iter()
      .flat_map(|addon| addon.addon_versions())
      .filter_map(|version| version.addon_version())
      .map(str::to_owned)
      .collect(),
  )
}
