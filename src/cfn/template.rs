use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};

use super::{Envelope, Resource, Value};

pub const FORMAT_VERSION: &str = "2010-09-09";

/// A CloudFormation template
///
/// Resources are stored as raw JSON keyed by logical ID so that resource types
/// without a binding survive a read/modify/write cycle. Typed access goes
/// through [`Template::resource`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
  #[serde(
    rename = "AWSTemplateFormatVersion",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub aws_template_format_version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub resources: Map<String, Json>,
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub outputs: Map<String, Json>,
  #[serde(flatten)]
  pub additional: Map<String, Json>,
}

impl Template {
  pub fn new(description: impl Into<String>) -> Self {
    Self {
      aws_template_format_version: Some(FORMAT_VERSION.to_string()),
      description: Some(description.into()),
      ..Default::default()
    }
  }

  pub fn from_json(body: &str) -> Result<Self> {
    serde_json::from_str(body).context("Failed to parse stack template")
  }

  pub fn to_json(&self) -> Result<String> {
    serde_json::to_string_pretty(self).context("Failed to serialize stack template")
  }

  /// Adds a resource under a logical ID that is not in use yet
  pub fn add_resource<T: Resource>(&mut self, logical_id: &str, resource: &Envelope<T>) -> Result<()> {
    if self.resources.contains_key(logical_id) {
      bail!("Resource {logical_id} is already defined in the template");
    }
    self.set_resource(logical_id, resource)
  }

  /// Adds or replaces a resource
  pub fn set_resource<T: Resource>(&mut self, logical_id: &str, resource: &Envelope<T>) -> Result<()> {
    let raw = serde_json::to_value(resource).with_context(|| format!("Failed to serialize resource {logical_id}"))?;
    self.resources.insert(logical_id.to_string(), raw);
    Ok(())
  }

  /// Returns the typed view of a resource, failing when it is missing or has another type
  pub fn resource<T: Resource>(&self, logical_id: &str) -> Result<Envelope<T>> {
    let raw = self
      .resources
      .get(logical_id)
      .with_context(|| format!("Resource {logical_id} not found in the template"))?;

    serde_json::from_value(raw.clone()).with_context(|| format!("Failed to read resource {logical_id}"))
  }

  pub fn has_resource(&self, logical_id: &str) -> bool {
    self.resources.contains_key(logical_id)
  }

  /// Adds an output, optionally exported as `<stack name>::<name>`
  pub fn add_output(&mut self, name: &str, value: Value, export: bool) {
    let mut output = json!({ "Value": value.to_json() });
    if export {
      output["Export"] = json!({ "Name": Value::sub(format!("${{AWS::StackName}}::{name}")).to_json() });
    }
    self.outputs.insert(name.to_string(), output);
  }
}
