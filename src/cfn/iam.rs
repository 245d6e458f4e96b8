use super::{Tag, Value};

resource! {
  /// `AWS::IAM::Role`
  pub struct Role = "AWS::IAM::Role" {
    assume_role_policy_document: Value,
    description: Value,
    managed_policy_arns: Value,
    max_session_duration: Value,
    path: Value,
    permissions_boundary: Value,
    policies: Vec<Policy>,
    role_name: Value,
    tags: Vec<Tag>,
  }
}

properties! {
  /// An inline policy embedded in a role
  pub struct Policy {
    policy_document: Value,
    policy_name: Value,
  }
}

/// Trust policy allowing the given service principals to assume the role
pub fn assume_role_policy_document(services: &[&str]) -> Value {
  let principals: Vec<Value> = services
    .iter()
    .map(|service| Value::join("", vec![Value::string(*service), Value::string(".amazonaws.com")]))
    .collect();

  Value::Literal(serde_json::json!({
    "Version": "2012-10-17",
    "Statement": [{
      "Effect": "Allow",
      "Action": ["sts:AssumeRole"],
      "Principal": {"Service": principals.iter().map(Value::to_json).collect::<Vec<_>>()},
    }],
  }))
}

/// ARN of an AWS managed policy in the stack's partition
pub fn managed_policy_arn(name: &str) -> Value {
  Value::sub(format!("arn:${{AWS::Partition}}:iam::aws:policy/{name}"))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn managed_policy_arn_uses_partition() {
    assert_eq!(
      managed_policy_arn("AmazonEKSWorkerNodePolicy").to_json(),
      json!({"Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/AmazonEKSWorkerNodePolicy"})
    );
  }

  #[test]
  fn trust_policy_lists_services() {
    let doc = assume_role_policy_document(&["ec2"]).to_json();
    assert_eq!(
      doc["Statement"][0]["Principal"]["Service"],
      json!([{"Fn::Join": ["", ["ec2", ".amazonaws.com"]]}])
    );
  }

  #[test]
  fn role_with_tags() {
    let role = Role {
      path: Some(Value::string("/")),
      tags: Some(vec![Tag::new("team", "platform")]),
      ..Default::default()
    };

    assert_eq!(
      serde_json::to_value(&role).unwrap(),
      json!({"Path": "/", "Tags": [{"Key": "team", "Value": "platform"}]})
    );
  }
}
