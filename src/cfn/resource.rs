use std::fmt::Debug;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned, ser::SerializeMap};
use serde_json::{Map, Value as Json};

use super::policies::{DeletionPolicy, UpdateReplacePolicy};

/// A template resource type with a fixed type name such as `AWS::EKS::Nodegroup`
pub trait Resource: Clone + Debug + Default + Serialize + DeserializeOwned {
  const TYPE: &'static str;
}

/// A resource as it appears under `Resources` in a template
///
/// Holds the typed properties alongside the attributes that every resource
/// type shares. Empty attributes are left out of the serialized form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Envelope<T> {
  pub properties: T,
  pub depends_on: Vec<String>,
  pub metadata: Map<String, Json>,
  pub deletion_policy: Option<DeletionPolicy>,
  pub update_replace_policy: Option<UpdateReplacePolicy>,
  pub condition: Option<String>,
}

impl<T: Resource> Envelope<T> {
  pub fn new(properties: T) -> Self {
    Self {
      properties,
      depends_on: Vec::new(),
      metadata: Map::new(),
      deletion_policy: None,
      update_replace_policy: None,
      condition: None,
    }
  }

  pub fn resource_type(&self) -> &'static str {
    T::TYPE
  }

  pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
    self.depends_on.push(logical_id.into());
    self
  }

  pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
    self.deletion_policy = Some(policy);
    self
  }

  pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
    self.condition = Some(condition.into());
    self
  }
}

impl<T: Resource> Serialize for Envelope<T> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(None)?;
    map.serialize_entry("Type", T::TYPE)?;
    map.serialize_entry("Properties", &self.properties)?;
    if !self.depends_on.is_empty() {
      map.serialize_entry("DependsOn", &self.depends_on)?;
    }
    if !self.metadata.is_empty() {
      map.serialize_entry("Metadata", &self.metadata)?;
    }
    if let Some(policy) = &self.deletion_policy {
      map.serialize_entry("DeletionPolicy", policy)?;
    }
    if let Some(policy) = &self.update_replace_policy {
      map.serialize_entry("UpdateReplacePolicy", policy)?;
    }
    if let Some(condition) = &self.condition {
      map.serialize_entry("Condition", condition)?;
    }
    map.end()
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
  One(String),
  Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
  Ok(match OneOrMany::deserialize(deserializer)? {
    OneOrMany::One(id) => vec![id],
    OneOrMany::Many(ids) => ids,
  })
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct RawEnvelope<T> {
  #[serde(rename = "Type")]
  kind: String,
  #[serde(default)]
  properties: Option<T>,
  #[serde(default, deserialize_with = "one_or_many")]
  depends_on: Vec<String>,
  #[serde(default)]
  metadata: Map<String, Json>,
  #[serde(default)]
  deletion_policy: Option<DeletionPolicy>,
  #[serde(default)]
  update_replace_policy: Option<UpdateReplacePolicy>,
  #[serde(default)]
  condition: Option<String>,
}

impl<'de, T: Resource> Deserialize<'de> for Envelope<T> {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = RawEnvelope::<T>::deserialize(deserializer)?;
    if raw.kind != T::TYPE {
      return Err(serde::de::Error::custom(format!(
        "resource has type {} but {} was expected",
        raw.kind,
        T::TYPE
      )));
    }

    Ok(Self {
      properties: raw.properties.unwrap_or_default(),
      depends_on: raw.depends_on,
      metadata: raw.metadata,
      deletion_policy: raw.deletion_policy,
      update_replace_policy: raw.update_replace_policy,
      condition: raw.condition,
    })
  }
}
