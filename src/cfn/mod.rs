//! Bindings for the CloudFormation resources that eksctl emits and edits
//!
//! Every binding follows the same shape: all properties are optional, names are
//! PascalCase in the template, and properties without a typed field are kept in
//! `additional` so that a template read from a stack can be written back unchanged.

/// Declares a property struct
macro_rules! properties {
  (
    $(#[$meta:meta])*
    pub struct $name:ident {
      $(
        $(#[$field_meta:meta])*
        $field:ident: $ty:ty
      ),* $(,)?
    }
  ) => {
    $(#[$meta])*
    #[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct $name {
      $(
        $(#[$field_meta])*
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub $field: Option<$ty>,
      )*
      #[serde(flatten)]
      pub additional: serde_json::Map<String, serde_json::Value>,
    }
  };
}

/// Declares a property struct that is also a top-level resource type
macro_rules! resource {
  (
    $(#[$meta:meta])*
    pub struct $name:ident = $kind:literal {
      $(
        $(#[$field_meta:meta])*
        $field:ident: $ty:ty
      ),* $(,)?
    }
  ) => {
    properties! {
      $(#[$meta])*
      pub struct $name {
        $(
          $(#[$field_meta])*
          $field: $ty
        ),*
      }
    }

    impl $crate::cfn::resource::Resource for $name {
      const TYPE: &'static str = $kind;
    }
  };
}

pub mod builder;
pub mod ec2;
pub mod eks;
pub mod iam;
pub mod policies;
pub mod resource;
pub mod stack;
pub mod template;
pub mod value;

pub use policies::{DeletionPolicy, UpdateReplacePolicy};
pub use resource::{Envelope, Resource};
pub use stack::{StackCollection, StackValidationError};
pub use template::Template;
pub use value::Value;

properties! {
  /// A `Key`/`Value` pair used by the IAM and EC2 resource types
  pub struct Tag {
    key: Value,
    value: Value,
  }
}

impl Tag {
  pub fn new(key: impl Into<Value>, value: impl Into<Value>) -> Self {
    Self {
      key: Some(key.into()),
      value: Some(value.into()),
      ..Default::default()
    }
  }
}
