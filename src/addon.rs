use anyhow::{Context, Result};
use aws_sdk_eks::types::Addon;
use semver::Version;
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use tracing::{debug, warn};

use crate::clients::AwsClients;

/// A health issue reported for an addon
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Issue {
  pub code: String,
  pub message: String,
  #[serde(rename = "ResourceIDs")]
  pub resource_ids: Vec<String>,
}

/// The state of an installed addon together with the versions it could be updated to
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Summary {
  pub name: String,
  pub version: String,
  pub newer_version: String,
  #[serde(rename = "IAMRole")]
  pub iam_role: String,
  pub status: String,
  pub configuration_values: String,
  pub issues: Vec<Issue>,
}

#[derive(Tabled)]
#[tabled(rename_all = "UpperCase")]
pub struct SummaryRow {
  pub name: String,
  pub version: String,
  pub status: String,
  pub issues: usize,
  #[tabled(rename = "IAMROLE")]
  pub iam_role: String,
  #[tabled(rename = "UPDATE AVAILABLE")]
  pub update_available: String,
  #[tabled(rename = "CONFIGURATION VALUES")]
  pub configuration_values: String,
}

impl From<&Summary> for SummaryRow {
  fn from(summary: &Summary) -> Self {
    Self {
      name: summary.name.clone(),
      version: summary.version.clone(),
      status: summary.status.clone(),
      issues: summary.issues.len(),
      iam_role: summary.iam_role.clone(),
      update_available: summary.newer_version.clone(),
      configuration_values: summary.configuration_values.clone(),
    }
  }
}

fn parse_version(version: &str) -> Option<Version> {
  Version::parse(version.trim_start_matches('v')).ok()
}

/// Versions greater than `current`, oldest first, joined by `,`
///
/// Versions that are not valid semver are ignored.
pub fn newer_versions(current: &str, available: &[String]) -> String {
  let Some(current) = parse_version(current) else {
    return String::new();
  };

  let mut newer: Vec<(Version, &String)> = available
    .iter()
    .filter_map(|raw| parse_version(raw).map(|version| (version, raw)))
    .filter(|(version, _)| *version > current)
    .collect();
  newer.sort_by(|a, b| a.0.cmp(&b.0));
  newer.dedup_by(|a, b| a.0 == b.0);

  newer.into_iter().map(|(_, raw)| raw.as_str()).collect::<Vec<_>>().join(",")
}

/// Reads addon state for one cluster
pub struct Manager<'a, A> {
  cluster_name: String,
  kubernetes_version: String,
  eks: &'a A,
}

impl<'a, A: AwsClients> Manager<'a, A> {
  pub fn new(cluster_name: &str, kubernetes_version: &str, eks: &'a A) -> Self {
    Self {
      cluster_name: cluster_name.to_string(),
      kubernetes_version: kubernetes_version.to_string(),
      eks,
    }
  }

  pub async fn get(&self, name: &str) -> Result<Summary> {
    let addon = self
      .eks
      .get_addon(&self.cluster_name, name)
      .await
      .with_context(|| format!("failed to get addon {name:?}"))?;
    debug!("addon: {addon:?}");

    let mut summary = summarize(&addon);

    match self.eks.get_addon_versions(name, &self.kubernetes_version).await {
      Ok(available) => summary.newer_version = newer_versions(&summary.version, &available),
      Err(err) => warn!("failed to get available versions for addon {name}: {err:#}"),
    }

    Ok(summary)
  }

  pub async fn get_all(&self) -> Result<Vec<Summary>> {
    let names = self
      .eks
      .list_addons(&self.cluster_name)
      .await
      .context("failed to list addons")?;

    let mut summaries = Vec::with_capacity(names.len());
    for name in &names {
      summaries.push(self.get(name).await?);
    }

    Ok(summaries)
  }
}

fn summarize(addon: &Addon) -> Summary {
  let issues = addon
    .health()
    .map(|health| {
      health
        .issues()
        .iter()
        .map(|issue| Issue {
          code: issue.code().map(|code| code.as_str().to_string()).unwrap_or_default(),
          message: issue.message().unwrap_or_default().to_string(),
          resource_ids: issue.resource_ids().to_vec(),
        })
        .collect()
    })
    .unwrap_or_default();

  Summary {
    name: addon.addon_name().unwrap_or_default().to_string(),
    version: addon.addon_version().unwrap_or_default().to_string(),
    newer_version: String::new(),
    iam_role: addon.service_account_role_arn().unwrap_or_default().to_string(),
    status: addon.status().map(|s| s.as_str().to_string()).unwrap_or_default(),
    configuration_values: addon.configuration_values().unwrap_or_default().to_string(),
    issues,
  }
}
