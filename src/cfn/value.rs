use std::fmt;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json, json};

pub const ACCOUNT_ID: &str = "AWS::AccountId";
pub const NOTIFICATION_ARNS: &str = "AWS::NotificationARNs";
pub const NO_VALUE: &str = "AWS::NoValue";
pub const PARTITION: &str = "AWS::Partition";
pub const REGION: &str = "AWS::Region";
pub const STACK_ID: &str = "AWS::StackId";
pub const STACK_NAME: &str = "AWS::StackName";

const REF: &str = "Ref";
const FN_BASE64: &str = "Fn::Base64";
const FN_CIDR: &str = "Fn::Cidr";
const FN_AND: &str = "Fn::And";
const FN_EQUALS: &str = "Fn::Equals";
const FN_IF: &str = "Fn::If";
const FN_NOT: &str = "Fn::Not";
const FN_OR: &str = "Fn::Or";
const FN_FIND_IN_MAP: &str = "Fn::FindInMap";
const FN_GET_ATT: &str = "Fn::GetAtt";
const FN_GET_AZS: &str = "Fn::GetAZs";
const FN_IMPORT_VALUE: &str = "Fn::ImportValue";
const FN_JOIN: &str = "Fn::Join";
const FN_SUB: &str = "Fn::Sub";
const FN_SELECT: &str = "Fn::Select";
const FN_SPLIT: &str = "Fn::Split";

/// A template property value
///
/// Either a plain JSON literal or one of the intrinsic functions that are resolved
/// by CloudFormation when the stack is created or updated
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Literal(Json),
  Intrinsic(Intrinsic),
}

/// Intrinsic functions supported in template property values
#[derive(Clone, Debug, PartialEq)]
pub enum Intrinsic {
  Ref(String),
  GetAtt(String, Box<Value>),
  Sub(Box<Value>),
  Join(String, Vec<Value>),
  Select(Box<Value>, Box<Value>),
  Split(String, Box<Value>),
  ImportValue(Box<Value>),
  Cidr(Box<Value>, Box<Value>, Box<Value>),
  GetAZs(Box<Value>),
  Base64(Box<Value>),
  FindInMap(Box<Value>, Box<Value>, Box<Value>),
  If(String, Box<Value>, Box<Value>),
  Equals(Box<Value>, Box<Value>),
  Not(Box<Value>),
  And(Vec<Value>),
  Or(Vec<Value>),
}

impl Value {
  pub fn string(v: impl Into<String>) -> Self {
    Value::Literal(Json::String(v.into()))
  }

  pub fn strings<I, S>(values: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Value::Literal(Json::Array(values.into_iter().map(|v| Json::String(v.into())).collect()))
  }

  pub fn integer(v: i64) -> Self {
    Value::Literal(json!(v))
  }

  pub fn boolean(v: bool) -> Self {
    Value::Literal(Json::Bool(v))
  }

  pub fn list(values: Vec<Value>) -> Self {
    Value::Literal(Json::Array(values.iter().map(Value::to_json).collect()))
  }

  pub fn reference(name: impl Into<String>) -> Self {
    Value::Intrinsic(Intrinsic::Ref(name.into()))
  }

  pub fn get_att(name: impl Into<String>, attribute: impl Into<String>) -> Self {
    Value::Intrinsic(Intrinsic::GetAtt(name.into(), Box::new(Value::string(attribute))))
  }

  pub fn sub(template: impl Into<String>) -> Self {
    Value::Intrinsic(Intrinsic::Sub(Box::new(Value::string(template))))
  }

  pub fn join(separator: impl Into<String>, values: Vec<Value>) -> Self {
    Value::Intrinsic(Intrinsic::Join(separator.into(), values))
  }

  pub fn select(index: Value, list: Value) -> Self {
    Value::Intrinsic(Intrinsic::Select(Box::new(index), Box::new(list)))
  }

  pub fn split(separator: impl Into<String>, value: Value) -> Self {
    Value::Intrinsic(Intrinsic::Split(separator.into(), Box::new(value)))
  }

  pub fn import_value(name: impl Into<String>) -> Self {
    Value::Intrinsic(Intrinsic::ImportValue(Box::new(Value::string(name))))
  }

  pub fn cidr(block: Value, count: Value, bits: Value) -> Self {
    Value::Intrinsic(Intrinsic::Cidr(Box::new(block), Box::new(count), Box::new(bits)))
  }

  pub fn get_azs(region: Value) -> Self {
    Value::Intrinsic(Intrinsic::GetAZs(Box::new(region)))
  }

  pub fn base64(value: Value) -> Self {
    Value::Intrinsic(Intrinsic::Base64(Box::new(value)))
  }

  pub fn find_in_map(map_name: Value, top_level_key: Value, second_level_key: Value) -> Self {
    Value::Intrinsic(Intrinsic::FindInMap(
      Box::new(map_name),
      Box::new(top_level_key),
      Box::new(second_level_key),
    ))
  }

  pub fn if_(condition: impl Into<String>, when_true: Value, when_false: Value) -> Self {
    Value::Intrinsic(Intrinsic::If(condition.into(), Box::new(when_true), Box::new(when_false)))
  }

  pub fn equals(a: Value, b: Value) -> Self {
    Value::Intrinsic(Intrinsic::Equals(Box::new(a), Box::new(b)))
  }

  pub fn not(condition: Value) -> Self {
    Value::Intrinsic(Intrinsic::Not(Box::new(condition)))
  }

  pub fn and(conditions: Vec<Value>) -> Self {
    Value::Intrinsic(Intrinsic::And(conditions))
  }

  pub fn or(conditions: Vec<Value>) -> Self {
    Value::Intrinsic(Intrinsic::Or(conditions))
  }

  /// `{"Ref": "AWS::Region"}`
  pub fn region() -> Self {
    Value::reference(REGION)
  }

  /// `{"Ref": "AWS::Partition"}`
  pub fn partition() -> Self {
    Value::reference(PARTITION)
  }

  /// `{"Ref": "AWS::StackName"}`
  pub fn stack_name() -> Self {
    Value::reference(STACK_NAME)
  }

  /// `{"Ref": "AWS::AccountId"}`
  pub fn account_id() -> Self {
    Value::reference(ACCOUNT_ID)
  }

  /// `{"Ref": "AWS::NoValue"}`
  pub fn no_value() -> Self {
    Value::reference(NO_VALUE)
  }

  /// Returns the string when the value is a string literal
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Literal(Json::String(s)) => Some(s),
      _ => None,
    }
  }

  pub fn is_intrinsic(&self) -> bool {
    matches!(self, Value::Intrinsic(_))
  }

  /// Converts the value into its template JSON representation
  pub fn to_json(&self) -> Json {
    match self {
      Value::Literal(v) => v.clone(),
      Value::Intrinsic(intrinsic) => intrinsic.to_json(),
    }
  }

  /// Builds a value from template JSON
  ///
  /// Single-key objects keyed by a known intrinsic function are parsed into that intrinsic,
  /// everything else is kept as a literal
  pub fn from_json(raw: Json) -> Result<Self> {
    if let Json::Object(map) = &raw {
      if let (1, Some((key, arg))) = (map.len(), map.iter().next()) {
        if let Some(intrinsic) = Intrinsic::parse(key, arg)? {
          return Ok(Value::Intrinsic(intrinsic));
        }
      }
    }

    Ok(Value::Literal(raw))
  }
}

fn boxed(raw: &Json) -> Result<Box<Value>> {
  Ok(Box::new(Value::from_json(raw.clone())?))
}

fn values(raw: &[Json]) -> Result<Vec<Value>> {
  raw.iter().map(|v| Value::from_json(v.clone())).collect()
}

fn args<'a>(name: &str, arg: &'a Json, len: usize) -> Result<&'a [Json]> {
  match arg {
    Json::Array(items) if items.len() == len => Ok(items),
    _ => bail!("Cannot parse {name}: expected an array of {len} elements"),
  }
}

fn conditions<'a>(name: &str, arg: &'a Json) -> Result<&'a [Json]> {
  arg
    .as_array()
    .map(Vec::as_slice)
    .ok_or_else(|| anyhow!("Cannot parse {name}: expected an array of conditions"))
}

fn string_arg(name: &str, arg: &Json) -> Result<String> {
  arg
    .as_str()
    .map(str::to_owned)
    .ok_or_else(|| anyhow!("Cannot parse {name}: expected a string argument"))
}

impl Intrinsic {
  fn parse(key: &str, arg: &Json) -> Result<Option<Self>> {
    let intrinsic = match key {
      REF => Intrinsic::Ref(string_arg(REF, arg)?),
      FN_GET_ATT => match arg {
        Json::String(s) => match s.split_once('.') {
          Some((name, attribute)) if !name.is_empty() && !attribute.is_empty() && !attribute.contains('.') => {
            Intrinsic::GetAtt(name.to_owned(), Box::new(Value::string(attribute)))
          }
          _ => bail!("Cannot parse parameters for {FN_GET_ATT}: {s}"),
        },
        _ => {
          let a = args(FN_GET_ATT, arg, 2)?;
          Intrinsic::GetAtt(string_arg(FN_GET_ATT, &a[0])?, boxed(&a[1])?)
        }
      },
      FN_SUB => Intrinsic::Sub(boxed(arg)?),
      FN_JOIN => {
        let a = args(FN_JOIN, arg, 2)?;
        let list = a[1]
          .as_array()
          .ok_or_else(|| anyhow!("Cannot parse {FN_JOIN}: expected a list of values"))?;
        Intrinsic::Join(string_arg(FN_JOIN, &a[0])?, values(list)?)
      }
      FN_SELECT => {
        let a = args(FN_SELECT, arg, 2)?;
        Intrinsic::Select(boxed(&a[0])?, boxed(&a[1])?)
      }
      FN_SPLIT => {
        let a = args(FN_SPLIT, arg, 2)?;
        Intrinsic::Split(string_arg(FN_SPLIT, &a[0])?, boxed(&a[1])?)
      }
      FN_IMPORT_VALUE => Intrinsic::ImportValue(boxed(arg)?),
      FN_CIDR => {
        let a = args(FN_CIDR, arg, 3)?;
        Intrinsic::Cidr(boxed(&a[0])?, boxed(&a[1])?, boxed(&a[2])?)
      }
      FN_GET_AZS => Intrinsic::GetAZs(boxed(arg)?),
      FN_BASE64 => Intrinsic::Base64(boxed(arg)?),
      FN_FIND_IN_MAP => {
        let a = args(FN_FIND_IN_MAP, arg, 3)?;
        Intrinsic::FindInMap(boxed(&a[0])?, boxed(&a[1])?, boxed(&a[2])?)
      }
      FN_IF => {
        let a = args(FN_IF, arg, 3)?;
        Intrinsic::If(string_arg(FN_IF, &a[0])?, boxed(&a[1])?, boxed(&a[2])?)
      }
      FN_EQUALS => {
        let a = args(FN_EQUALS, arg, 2)?;
        Intrinsic::Equals(boxed(&a[0])?, boxed(&a[1])?)
      }
      FN_NOT => {
        let a = args(FN_NOT, arg, 1)?;
        Intrinsic::Not(boxed(&a[0])?)
      }
      FN_AND => Intrinsic::And(values(conditions(FN_AND, arg)?)?),
      FN_OR => Intrinsic::Or(values(conditions(FN_OR, arg)?)?),
      _ => return Ok(None),
    };

    Ok(Some(intrinsic))
  }

  fn to_json(&self) -> Json {
    let (key, arg) = match self {
      Intrinsic::Ref(name) => (REF, json!(name)),
      Intrinsic::GetAtt(name, attribute) => (FN_GET_ATT, json!([name, attribute.to_json()])),
      Intrinsic::Sub(template) => (FN_SUB, template.to_json()),
      Intrinsic::Join(separator, items) => (
        FN_JOIN,
        json!([separator, items.iter().map(Value::to_json).collect::<Vec<_>>()]),
      ),
      Intrinsic::Select(index, list) => (FN_SELECT, json!([index.to_json(), list.to_json()])),
      Intrinsic::Split(separator, value) => (FN_SPLIT, json!([separator, value.to_json()])),
      Intrinsic::ImportValue(name) => (FN_IMPORT_VALUE, name.to_json()),
      Intrinsic::Cidr(block, count, bits) => (FN_CIDR, json!([block.to_json(), count.to_json(), bits.to_json()])),
      Intrinsic::GetAZs(region) => (FN_GET_AZS, region.to_json()),
      Intrinsic::Base64(value) => (FN_BASE64, value.to_json()),
      Intrinsic::FindInMap(map_name, top, second) => {
        (FN_FIND_IN_MAP, json!([map_name.to_json(), top.to_json(), second.to_json()]))
      }
      Intrinsic::If(condition, when_true, when_false) => {
        (FN_IF, json!([condition, when_true.to_json(), when_false.to_json()]))
      }
      Intrinsic::Equals(a, b) => (FN_EQUALS, json!([a.to_json(), b.to_json()])),
      Intrinsic::Not(condition) => (FN_NOT, json!([condition.to_json()])),
      Intrinsic::And(conditions) => (FN_AND, Json::Array(conditions.iter().map(Value::to_json).collect())),
      Intrinsic::Or(conditions) => (FN_OR, Json::Array(conditions.iter().map(Value::to_json).collect())),
    };

    let mut map = Map::new();
    map.insert(key.to_owned(), arg);
    Json::Object(map)
  }
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.to_json().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for Value {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = Json::deserialize(deserializer)?;
    Value::from_json(raw).map_err(serde::de::Error::custom)
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.as_str() {
      Some(s) => write!(f, "{s}"),
      None => write!(f, "{}", self.to_json()),
    }
  }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self {
    Value::string(v)
  }
}

impl From<String> for Value {
  fn from(v: String) -> Self {
    Value::string(v)
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self {
    Value::integer(v)
  }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self {
    Value::boolean(v)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn intrinsics_serialize_to_template_form() {
    assert_eq!(Value::region().to_json(), json!({"Ref": "AWS::Region"}));
    assert_eq!(
      Value::get_att("NodeInstanceRole", "Arn").to_json(),
      json!({"Fn::GetAtt": ["NodeInstanceRole", "Arn"]})
    );
    assert_eq!(
      Value::join("", vec![Value::string("arn:"), Value::partition()]).to_json(),
      json!({"Fn::Join": ["", ["arn:", {"Ref": "AWS::Partition"}]]})
    );
    assert_eq!(Value::not(Value::boolean(true)).to_json(), json!({"Fn::Not": [true]}));
  }

  #[test]
  fn get_att_short_form() {
    let value = Value::from_json(json!({"Fn::GetAtt": "ControlPlane.Arn"})).unwrap();
    assert_eq!(value, Value::get_att("ControlPlane", "Arn"));
  }

  #[test]
  fn get_att_short_form_invalid() {
    assert!(Value::from_json(json!({"Fn::GetAtt": "ControlPlane"})).is_err());
    assert!(Value::from_json(json!({"Fn::GetAtt": "a.b.c"})).is_err());
  }

  #[test]
  fn ref_requires_string() {
    let err = Value::from_json(json!({"Ref": 1})).unwrap_err();
    assert!(err.to_string().contains("Cannot parse Ref"), "{err}");
  }

  #[test]
  fn join_requires_list() {
    assert!(Value::from_json(json!({"Fn::Join": ["-", "a"]})).is_err());
    assert!(Value::from_json(json!({"Fn::Join": ["-"]})).is_err());
  }

  #[test]
  fn and_or_require_list() {
    let err = Value::from_json(json!({"Fn::And": "x"})).unwrap_err();
    assert_eq!(err.to_string(), "Cannot parse Fn::And: expected an array of conditions");
    assert!(Value::from_json(json!({"Fn::Or": {"Condition": "IsProd"}})).is_err());

    let raw = json!({"Fn::Or": [{"Condition": "IsProd"}, {"Fn::Equals": ["a", "b"]}]});
    assert_eq!(Value::from_json(raw.clone()).unwrap().to_json(), raw);
  }

  #[test]
  fn unknown_single_key_objects_stay_literal() {
    let raw = json!({"k8s.io/role": "worker"});
    assert_eq!(Value::from_json(raw.clone()).unwrap(), Value::Literal(raw));
  }

  #[test]
  fn nested_intrinsics_are_parsed() {
    let raw = json!({"Fn::Select": [0, {"Fn::GetAZs": {"Ref": "AWS::Region"}}]});
    let value = Value::from_json(raw.clone()).unwrap();
    assert_eq!(value, Value::select(Value::integer(0), Value::get_azs(Value::region())));
    assert_eq!(value.to_json(), raw);
  }

  #[test]
  fn display_prints_strings_raw() {
    assert_eq!(Value::string("m5.large").to_string(), "m5.large");
    assert_eq!(Value::reference("VPC").to_string(), r#"{"Ref":"VPC"}"#);
  }
}
