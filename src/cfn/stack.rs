use std::{collections::BTreeMap, time::Duration};

use anyhow::{Context, Result, bail};
use aws_sdk_cloudformation::{Client as CfnClient, error::ProvideErrorMetadata, types::Capability};
use serde_json::Value as Json;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use super::{Template, Value, builder::MANAGED_NODEGROUP_RESOURCE, eks::Nodegroup};

const VALIDATION_ERROR: &str = "ValidationError";
const NO_UPDATES: &str = "No updates are to be performed";

const UPDATE_TIMEOUT: Duration = Duration::from_secs(25 * 60);
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// The stack API rejected the request, most often because the stack does not exist
#[derive(Debug, Error)]
#[error("stack {stack}: {message}")]
pub struct StackValidationError {
  pub stack: String,
  pub message: String,
}

fn stack_error<E>(stack_name: &str, err: E) -> anyhow::Error
where
  E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
  if err.code() == Some(VALIDATION_ERROR) {
    return StackValidationError {
      stack: stack_name.to_string(),
      message: err.message().unwrap_or_default().to_string(),
    }
    .into();
  }

  anyhow::Error::new(err).context(format!("Stack request for {stack_name} failed"))
}

/// An update with an unchanged template is rejected, which counts as success
fn is_no_updates<E: ProvideErrorMetadata>(err: &E) -> bool {
  err.message().is_some_and(|message| message.contains(NO_UPDATES))
}

#[derive(Debug, PartialEq, Eq)]
enum UpdateProgress {
  Complete,
  InProgress,
}

fn update_progress(stack_name: &str, status: &str, reason: Option<&str>) -> Result<UpdateProgress> {
  match status {
    "UPDATE_COMPLETE" => Ok(UpdateProgress::Complete),
    s if s.ends_with("_IN_PROGRESS") => Ok(UpdateProgress::InProgress),
    _ => bail!(
      "updating stack {stack_name} ended in status {status}: {}",
      reason.unwrap_or("no reason given")
    ),
  }
}

/// Name of the stack that owns a managed node group
pub fn nodegroup_stack_name(cluster: &str, nodegroup: &str) -> String {
  format!("eksctl-{cluster}-nodegroup-{nodegroup}")
}

/// Stacks of one cluster
pub struct StackCollection {
  client: CfnClient,
  cluster_name: String,
  timeout: Duration,
}

impl StackCollection {
  pub fn new(config: &aws_config::SdkConfig, cluster_name: &str) -> Self {
    Self {
      client: CfnClient::new(config),
      cluster_name: cluster_name.to_string(),
      timeout: UPDATE_TIMEOUT,
    }
  }

  pub fn nodegroup_stack_name(&self, nodegroup: &str) -> String {
    nodegroup_stack_name(&self.cluster_name, nodegroup)
  }

  pub async fn get_stack_template(&self, stack_name: &str) -> Result<String> {
    let output = self
      .client
      .get_template()
      .stack_name(stack_name)
      .send()
      .await
      .map_err(|err| stack_error(stack_name, err))?;

    output
      .template_body
      .with_context(|| format!("Stack {stack_name} has no template"))
  }

  pub async fn get_managed_nodegroup_template(&self, nodegroup: &str) -> Result<Template> {
    let stack_name = self.nodegroup_stack_name(nodegroup);
    let body = self.get_stack_template(&stack_name).await?;
    Template::from_json(&body)
  }

  pub async fn update_nodegroup_stack(&self, nodegroup: &str, template: &Template) -> Result<()> {
    let stack_name = self.nodegroup_stack_name(nodegroup);
    self.update_stack(&stack_name, template).await
  }

  /// Submits a new template for an existing stack and waits for the update to finish
  pub async fn update_stack(&self, stack_name: &str, template: &Template) -> Result<()> {
    let body = template.to_json()?;
    info!("updating stack {stack_name}");

    let result = self
      .client
      .update_stack()
      .stack_name(stack_name)
      .template_body(body)
      .capabilities(Capability::CapabilityIam)
      .capabilities(Capability::CapabilityNamedIam)
      .send()
      .await;

    match result {
      Ok(_) => {}
      Err(err) if is_no_updates(&err) => {
        info!("nothing to update in stack {stack_name}");
        return Ok(());
      }
      Err(err) => return Err(stack_error(stack_name, err)),
    }

    self.wait_for_update(stack_name).await
  }

  async fn wait_for_update(&self, stack_name: &str) -> Result<()> {
    let deadline = Instant::now() + self.timeout;

    loop {
      let output = self
        .client
        .describe_stacks()
        .stack_name(stack_name)
        .send()
        .await
        .map_err(|err| stack_error(stack_name, err))?;

      let stack = output
        .stacks()
        .first()
        .with_context(|| format!("Stack {stack_name} not found"))?;
      let status = stack.stack_status().map(|s| s.as_str()).unwrap_or_default();
      debug!("stack {stack_name} is in status {status}");

      if update_progress(stack_name, status, stack.stack_status_reason())? == UpdateProgress::Complete {
        info!("stack {stack_name} updated");
        return Ok(());
      }
      if Instant::now() >= deadline {
        bail!("timed out waiting for stack {stack_name} to be updated");
      }

      sleep(POLL_INTERVAL).await;
    }
  }
}

/// Reads the `Labels` property of the managed node group resource
pub fn labels_from_template(template: &Template) -> Result<BTreeMap<String, String>> {
  let nodegroup = template.resource::<Nodegroup>(MANAGED_NODEGROUP_RESOURCE)?;
  let labels = nodegroup.properties.labels.context("failed to find labels")?;

  match labels {
    Value::Literal(Json::Object(map)) => Ok(
      map
        .into_iter()
        .map(|(key, value)| match value {
          Json::String(s) => (key, s),
          other => (key, other.to_string()),
        })
        .collect(),
    ),
    _ => bail!("failed to find labels"),
  }
}

/// Adds and removes labels on the managed node group resource in place
pub fn update_labels_in_template(
  template: &mut Template,
  add: &BTreeMap<String, String>,
  remove: &[String],
) -> Result<()> {
  let mut nodegroup = template.resource::<Nodegroup>(MANAGED_NODEGROUP_RESOURCE)?;
  let mut labels = labels_from_template(template)?;

  for (key, value) in add {
    labels.insert(key.clone(), value.clone());
  }
  for key in remove {
    labels.remove(key);
  }

  let object = labels.into_iter().map(|(k, v)| (k, Json::String(v))).collect();
  nodegroup.properties.labels = Some(Value::Literal(Json::Object(object)));
  template.set_resource(MANAGED_NODEGROUP_RESOURCE, &nodegroup)
}
