use super::Value;

resource! {
  /// `AWS::EKS::Cluster`
  pub struct Cluster = "AWS::EKS::Cluster" {
    name: Value,
    role_arn: Value,
    version: Value,
    resources_vpc_config: ResourcesVpcConfig,
    kubernetes_network_config: KubernetesNetworkConfig,
    logging: Logging,
    encryption_config: Value,
    tags: Value,
  }
}

properties! {
  pub struct ResourcesVpcConfig {
    security_group_ids: Value,
    subnet_ids: Value,
    endpoint_private_access: Value,
    endpoint_public_access: Value,
    public_access_cidrs: Value,
  }
}

properties! {
  pub struct KubernetesNetworkConfig {
    ip_family: Value,
    service_ipv4_cidr: Value,
  }
}

properties! {
  pub struct Logging {
    cluster_logging: Value,
  }
}

resource! {
  /// `AWS::EKS::Nodegroup`, a managed node group
  pub struct Nodegroup = "AWS::EKS::Nodegroup" {
    ami_type: Value,
    capacity_type: Value,
    cluster_name: Value,
    disk_size: Value,
    force_update_enabled: Value,
    instance_types: Value,
    labels: Value,
    launch_template: LaunchTemplateSpecification,
    nodegroup_name: Value,
    node_role: Value,
    release_version: Value,
    remote_access: RemoteAccess,
    scaling_config: ScalingConfig,
    subnets: Value,
    tags: Value,
    taints: Vec<Taint>,
    update_config: UpdateConfig,
    version: Value,
  }
}

properties! {
  pub struct ScalingConfig {
    desired_size: Value,
    max_size: Value,
    min_size: Value,
  }
}

properties! {
  pub struct LaunchTemplateSpecification {
    id: Value,
    name: Value,
    version: Value,
  }
}

properties! {
  pub struct RemoteAccess {
    ec2_ssh_key: Value,
    source_security_groups: Value,
  }
}

properties! {
  pub struct Taint {
    effect: Value,
    key: Value,
    value: Value,
  }
}

properties! {
  pub struct UpdateConfig {
    max_unavailable: Value,
    max_unavailable_percentage: Value,
  }
}

resource! {
  /// `AWS::EKS::Addon`
  pub struct Addon = "AWS::EKS::Addon" {
    addon_name: Value,
    addon_version: Value,
    cluster_name: Value,
    configuration_values: Value,
    resolve_conflicts: Value,
    service_account_role_arn: Value,
    tags: Value,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::cfn::Resource;

  #[test]
  fn nodegroup_property_names() {
    let nodegroup = Nodegroup {
      ami_type: Some(Value::string("AL2_x86_64")),
      node_role: Some(Value::get_att("NodeInstanceRole", "Arn")),
      remote_access: Some(RemoteAccess {
        ec2_ssh_key: Some(Value::string("key")),
        ..Default::default()
      }),
      scaling_config: Some(ScalingConfig {
        desired_size: Some(Value::integer(2)),
        ..Default::default()
      }),
      ..Default::default()
    };

    assert_eq!(
      serde_json::to_value(&nodegroup).unwrap(),
      json!({
        "AmiType": "AL2_x86_64",
        "NodeRole": {"Fn::GetAtt": ["NodeInstanceRole", "Arn"]},
        "RemoteAccess": {"Ec2SshKey": "key"},
        "ScalingConfig": {"DesiredSize": 2},
      })
    );
  }

  #[test]
  fn unmodelled_properties_round_trip() {
    let raw = json!({"NodegroupName": "ng-1", "DiskSize": 80, "SomethingNew": {"Enabled": true}});
    let nodegroup: Nodegroup = serde_json::from_value(raw.clone()).unwrap();

    assert_eq!(nodegroup.nodegroup_name, Some(Value::string("ng-1")));
    assert_eq!(nodegroup.additional.get("SomethingNew"), Some(&json!({"Enabled": true})));
    assert_eq!(serde_json::to_value(&nodegroup).unwrap(), raw);
  }

  #[test]
  fn type_names() {
    assert_eq!(Cluster::TYPE, "AWS::EKS::Cluster");
    assert_eq!(Nodegroup::TYPE, "AWS::EKS::Nodegroup");
    assert_eq!(Addon::TYPE, "AWS::EKS::Addon");
  }
}
