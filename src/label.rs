use std::{collections::BTreeMap, future::Future};

use anyhow::{Context, Result};
use serde::Serialize;
use tabled::Tabled;
use tracing::{debug, info};

use crate::{
  cfn::{
    StackCollection, StackValidationError,
    stack::{labels_from_template, update_labels_in_template},
  },
  clients::AwsClients,
};

/// Labels as stored on a managed node group that eksctl created
pub trait NodegroupStackService {
  fn get_labels(&self, nodegroup: &str) -> impl Future<Output = Result<BTreeMap<String, String>>> + Send;
  fn update_labels(
    &self,
    nodegroup: &str,
    add: &BTreeMap<String, String>,
    remove: &[String],
  ) -> impl Future<Output = Result<()>> + Send;
}

impl NodegroupStackService for StackCollection {
  async fn get_labels(&self, nodegroup: &str) -> Result<BTreeMap<String, String>> {
    let template = self.get_managed_nodegroup_template(nodegroup).await?;
    labels_from_template(&template)
  }

  async fn update_labels(&self, nodegroup: &str, add: &BTreeMap<String, String>, remove: &[String]) -> Result<()> {
    let mut template = self.get_managed_nodegroup_template(nodegroup).await?;
    update_labels_in_template(&mut template, add, remove)?;
    self.update_nodegroup_stack(nodegroup, &template).await
  }
}

/// Whether the error, or anything it wraps, is a stack `ValidationError`
pub fn is_validation_error(err: &anyhow::Error) -> bool {
  err.chain().any(|cause| cause.downcast_ref::<StackValidationError>().is_some())
}

/// Labels of one node group
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
  pub cluster: String,
  pub nodegroup: String,
  pub labels: BTreeMap<String, String>,
}

#[derive(Tabled)]
#[tabled(rename_all = "UpperCase")]
pub struct SummaryRow {
  pub cluster: String,
  pub nodegroup: String,
  pub labels: String,
}

impl From<&Summary> for SummaryRow {
  fn from(summary: &Summary) -> Self {
    Self {
      cluster: summary.cluster.clone(),
      nodegroup: summary.nodegroup.clone(),
      labels: summary
        .labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(","),
    }
  }
}

/// Gets and edits node group labels
///
/// Node groups created by eksctl carry their labels in their stack template, so
/// the stack is the first place to look. When there is no such stack the node
/// group was created elsewhere and the EKS API is used instead.
pub struct Manager<'a, S, A> {
  cluster_name: String,
  service: &'a S,
  eks: &'a A,
}

impl<'a, S: NodegroupStackService, A: AwsClients> Manager<'a, S, A> {
  pub fn new(cluster_name: &str, service: &'a S, eks: &'a A) -> Self {
    Self {
      cluster_name: cluster_name.to_string(),
      service,
      eks,
    }
  }

  pub async fn get(&self, nodegroup: &str) -> Result<Vec<Summary>> {
    let labels = match self.service.get_labels(nodegroup).await {
      Ok(labels) => labels,
      Err(err) if is_validation_error(&err) => {
        debug!("nodegroup {nodegroup} has no stack, reading labels from EKS: {err:#}");
        let ng = self.eks.get_nodegroup(&self.cluster_name, nodegroup).await?;
        ng.labels()
          .map(|labels| labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
          .unwrap_or_default()
      }
      Err(err) => return Err(err),
    };

    Ok(vec![Summary {
      cluster: self.cluster_name.clone(),
      nodegroup: nodegroup.to_string(),
      labels,
    }])
  }

  pub async fn set(&self, nodegroup: &str, labels: &BTreeMap<String, String>) -> Result<()> {
    match self.service.update_labels(nodegroup, labels, &[]).await {
      Ok(()) => {}
      Err(err) if is_validation_error(&err) => {
        debug!("nodegroup {nodegroup} has no stack, setting labels through EKS: {err:#}");
        self
          .eks
          .update_nodegroup_labels(&self.cluster_name, nodegroup, labels, &[])
          .await?;
      }
      Err(err) => return Err(err),
    }

    info!("labels set on nodegroup {nodegroup}");
    Ok(())
  }

  pub async fn unset(&self, nodegroup: &str, keys: &[String]) -> Result<()> {
    let none = BTreeMap::new();
    match self.service.update_labels(nodegroup, &none, keys).await {
      Ok(()) => {}
      Err(err) if is_validation_error(&err) => {
        debug!("nodegroup {nodegroup} has no stack, removing labels through EKS: {err:#}");
        self
          .eks
          .update_nodegroup_labels(&self.cluster_name, nodegroup, &none, keys)
          .await?;
      }
      Err(err) => return Err(err),
    }

    info!("labels removed from nodegroup {nodegroup}");
    Ok(())
  }
}

/// Parses `k1=v1,k2=v2` as given to `set labels`
pub fn parse_labels(raw: &str) -> Result<BTreeMap<String, String>> {
  raw
    .split(',')
    .filter(|pair| !pair.trim().is_empty())
    .map(|pair| {
      let (key, value) = pair
        .split_once('=')
        .with_context(|| format!("invalid label {pair:?}, expected key=value"))?;
      Ok((key.trim().to_string(), value.trim().to_string()))
    })
    .collect()
}
