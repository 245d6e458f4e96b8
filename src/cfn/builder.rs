use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde_json::{Map, Value as Json, json};

use super::{
  Envelope, Tag, Template, Value,
  ec2::{BlockDeviceMapping, Ebs, Ingress, LaunchTemplate, LaunchTemplateData, MetadataOptions, SecurityGroup},
  eks::{LaunchTemplateSpecification, Nodegroup, ScalingConfig, Taint, UpdateConfig},
  iam::{self, Role},
};
use crate::config::{ClusterConfig, ManagedNodeGroup};

pub const MANAGED_NODEGROUP_RESOURCE: &str = "ManagedNodeGroup";
pub const INSTANCE_ROLE_RESOURCE: &str = "NodeInstanceRole";
pub const LAUNCH_TEMPLATE_RESOURCE: &str = "LaunchTemplate";
pub const SSH_RESOURCE: &str = "SSH";

pub const CLUSTER_NAME_LABEL: &str = "alpha.eksctl.io/cluster-name";
pub const NODEGROUP_NAME_LABEL: &str = "alpha.eksctl.io/nodegroup-name";

const WORKER_NODE_POLICIES: [&str; 4] = [
  "AmazonEKSWorkerNodePolicy",
  "AmazonEKS_CNI_Policy",
  "AmazonEC2ContainerRegistryReadOnly",
  "AmazonSSMManagedInstanceCore",
];

const SSH_PORT: i64 = 22;

/// Name of the stack holding a cluster's control plane and networking
pub fn cluster_stack_name(cluster: &str) -> String {
  format!("eksctl-{cluster}-cluster")
}

fn import_cluster_output(cluster: &str, output: &str) -> Value {
  Value::import_value(format!("{}::{output}", cluster_stack_name(cluster)))
}

/// The resources making up the stack of one managed node group
pub struct ManagedNodeGroupResourceSet<'a> {
  cluster: &'a ClusterConfig,
  nodegroup: &'a ManagedNodeGroup,
  template: Template,
}

impl<'a> ManagedNodeGroupResourceSet<'a> {
  pub fn new(cluster: &'a ClusterConfig, nodegroup: &'a ManagedNodeGroup) -> Self {
    let description = format!(
      "EKS Managed Nodes (SSH access: {}) [created by eksctl]",
      nodegroup.ssh.allow
    );

    Self {
      cluster,
      nodegroup,
      template: Template::new(description),
    }
  }

  /// Adds every resource and output and returns the finished template
  pub fn build(mut self) -> Result<Template> {
    let node_role = match &self.nodegroup.iam.instance_role_arn {
      Some(arn) => Value::string(arn.clone()),
      None => {
        self.add_node_role()?;
        Value::get_att(INSTANCE_ROLE_RESOURCE, "Arn")
      }
    };

    self.add_launch_template()?;

    let ng = self.nodegroup;
    let cluster_name = &self.cluster.metadata.name;

    let mut labels: BTreeMap<String, String> = ng.labels.clone();
    labels.insert(CLUSTER_NAME_LABEL.to_string(), cluster_name.clone());
    labels.insert(NODEGROUP_NAME_LABEL.to_string(), ng.name.clone());

    let mut tags = ng.tags.clone();
    for (key, value) in &self.cluster.metadata.tags {
      tags.entry(key.clone()).or_insert_with(|| value.clone());
    }

    let nodegroup = Nodegroup {
      ami_type: Some(Value::string(ami_type(&ng.ami_family, &selected_instance_type(ng)))),
      capacity_type: Some(Value::string(if ng.spot { "SPOT" } else { "ON_DEMAND" })),
      cluster_name: Some(Value::string(cluster_name.clone())),
      instance_types: Some(Value::strings(ng.instance_type_list())),
      labels: Some(string_map(&labels)),
      launch_template: Some(LaunchTemplateSpecification {
        id: Some(Value::reference(LAUNCH_TEMPLATE_RESOURCE)),
        version: Some(Value::get_att(LAUNCH_TEMPLATE_RESOURCE, "LatestVersionNumber")),
        ..Default::default()
      }),
      nodegroup_name: Some(Value::string(ng.name.clone())),
      node_role: Some(node_role),
      release_version: ng.release_version.clone().map(Value::string),
      scaling_config: Some(ScalingConfig {
        desired_size: Some(Value::integer(ng.desired_capacity.into())),
        max_size: Some(Value::integer(ng.max_size.into())),
        min_size: Some(Value::integer(ng.min_size.into())),
        ..Default::default()
      }),
      subnets: Some(self.subnets()),
      tags: (!tags.is_empty()).then(|| string_map(&tags)),
      taints: taints(ng)?,
      update_config: ng.update_config.as_ref().map(|config| UpdateConfig {
        max_unavailable: config.max_unavailable.map(|v| Value::integer(v.into())),
        max_unavailable_percentage: config.max_unavailable_percentage.map(|v| Value::integer(v.into())),
        ..Default::default()
      }),
      ..Default::default()
    };

    self
      .template
      .add_resource(MANAGED_NODEGROUP_RESOURCE, &Envelope::new(nodegroup))?;

    Ok(self.template)
  }

  fn add_node_role(&mut self) -> Result<()> {
    let iam_config = &self.nodegroup.iam;

    let mut policy_arns: Vec<Value> = WORKER_NODE_POLICIES.iter().map(|p| iam::managed_policy_arn(p)).collect();
    policy_arns.extend(iam_config.attach_policy_arns.iter().map(|arn| Value::string(arn.clone())));

    let role = Role {
      assume_role_policy_document: Some(iam::assume_role_policy_document(&["ec2"])),
      managed_policy_arns: Some(Value::list(policy_arns)),
      path: Some(Value::string("/")),
      role_name: iam_config.instance_role_name.clone().map(Value::string),
      ..Default::default()
    };

    self.template.add_resource(INSTANCE_ROLE_RESOURCE, &Envelope::new(role))?;
    self
      .template
      .add_output("InstanceRoleARN", Value::get_att(INSTANCE_ROLE_RESOURCE, "Arn"), true);

    Ok(())
  }

  fn add_launch_template(&mut self) -> Result<()> {
    let ng = self.nodegroup;
    let cluster_name = &self.cluster.metadata.name;

    let mut security_groups = vec![import_cluster_output(cluster_name, "ClusterSecurityGroupId")];
    let mut key_name = None;

    if let Some(public_key_name) = ng.ssh.public_key_name.as_ref().filter(|name| !name.is_empty()) {
      key_name = Some(Value::string(public_key_name.clone()));

      if ng.ssh.allow {
        self.add_ssh_security_group()?;
        security_groups.push(Value::reference(SSH_RESOURCE));
      }
    }

    let data = LaunchTemplateData {
      block_device_mappings: (ng.volume_size > 0).then(|| {
        vec![BlockDeviceMapping {
          device_name: Some(Value::string("/dev/xvda")),
          ebs: Some(Ebs {
            encrypted: ng.volume_encrypted.map(Value::boolean),
            volume_size: Some(Value::integer(ng.volume_size.into())),
            volume_type: Some(Value::string(ng.volume_type.clone())),
            ..Default::default()
          }),
          ..Default::default()
        }]
      }),
      key_name,
      metadata_options: Some(MetadataOptions {
        http_put_response_hop_limit: Some(Value::integer(2)),
        http_tokens: Some(Value::string(if ng.disable_imdsv1 { "required" } else { "optional" })),
        ..Default::default()
      }),
      security_group_ids: Some(Value::list(security_groups)),
      ..Default::default()
    };

    let launch_template = LaunchTemplate {
      launch_template_data: Some(data),
      launch_template_name: Some(Value::sub("${AWS::StackName}")),
      ..Default::default()
    };

    self
      .template
      .add_resource(LAUNCH_TEMPLATE_RESOURCE, &Envelope::new(launch_template))
  }

  fn add_ssh_security_group(&mut self) -> Result<()> {
    let ng = self.nodegroup;

    let ssh_ingress = |source: Ingress| Ingress {
      from_port: Some(Value::integer(SSH_PORT)),
      to_port: Some(Value::integer(SSH_PORT)),
      ip_protocol: Some(Value::string("tcp")),
      ..source
    };

    let ingress = if ng.ssh.source_security_group_ids.is_empty() {
      vec![
        ssh_ingress(Ingress {
          cidr_ip: Some(Value::string("0.0.0.0/0")),
          ..Default::default()
        }),
        ssh_ingress(Ingress {
          cidr_ipv6: Some(Value::string("::/0")),
          ..Default::default()
        }),
      ]
    } else {
      ng.ssh
        .source_security_group_ids
        .iter()
        .map(|id| {
          ssh_ingress(Ingress {
            source_security_group_id: Some(Value::string(id.clone())),
            ..Default::default()
          })
        })
        .collect()
    };

    let group = SecurityGroup {
      group_description: Some(Value::string("Allow SSH access")),
      group_name: Some(Value::sub("${AWS::StackName}-remoteAccess")),
      security_group_ingress: Some(ingress),
      tags: Some(vec![Tag::new("alpha.eksctl.io/nodegroup-name", ng.name.clone())]),
      vpc_id: Some(import_cluster_output(&self.cluster.metadata.name, "VPC")),
      ..Default::default()
    };

    self.template.add_resource(SSH_RESOURCE, &Envelope::new(group))
  }

  fn subnets(&self) -> Value {
    if !self.nodegroup.subnets.is_empty() {
      return Value::strings(self.nodegroup.subnets.clone());
    }

    let output = if self.nodegroup.private_networking {
      "SubnetsPrivate"
    } else {
      "SubnetsPublic"
    };
    Value::split(",", import_cluster_output(&self.cluster.metadata.name, output))
  }
}

fn string_map(map: &BTreeMap<String, String>) -> Value {
  let object: Map<String, Json> = map.iter().map(|(k, v)| (k.clone(), Json::String(v.clone()))).collect();
  Value::Literal(Json::Object(object))
}

fn taints(ng: &ManagedNodeGroup) -> Result<Option<Vec<Taint>>> {
  if ng.taints.is_empty() {
    return Ok(None);
  }

  let mut taints = Vec::with_capacity(ng.taints.len());
  for taint in &ng.taints {
    let effect = match taint.effect.as_str() {
      "NoSchedule" => "NO_SCHEDULE",
      "PreferNoSchedule" => "PREFER_NO_SCHEDULE",
      "NoExecute" => "NO_EXECUTE",
      other => bail!("unexpected taint effect: {other}"),
    };

    taints.push(Taint {
      effect: Some(Value::string(effect)),
      key: Some(Value::string(taint.key.clone())),
      value: Some(Value::string(taint.value.clone())),
      ..Default::default()
    });
  }

  Ok(Some(taints))
}

/// GPU instance types drive the AMI choice when several are listed
fn selected_instance_type(ng: &ManagedNodeGroup) -> String {
  let instance_types = ng.instance_type_list();
  instance_types
    .iter()
    .find(|instance_type| is_nvidia(instance_type))
    .or_else(|| instance_types.first())
    .cloned()
    .unwrap_or_default()
}

fn instance_family(instance_type: &str) -> &str {
  instance_type.split('.').next().unwrap_or_default()
}

fn is_arm(instance_type: &str) -> bool {
  let family = instance_family(instance_type);
  family.starts_with("a1") || family.starts_with("t4g") || family.chars().skip(2).any(|c| c == 'g')
}

fn is_nvidia(instance_type: &str) -> bool {
  ["p2", "p3", "p4", "p5", "g3", "g4dn", "g5", "g6"]
    .iter()
    .any(|prefix| instance_family(instance_type).starts_with(prefix))
}

fn is_neuron(instance_type: &str) -> bool {
  ["inf1", "inf2", "trn1"]
    .iter()
    .any(|prefix| instance_family(instance_type).starts_with(prefix))
}

/// Maps an AMI family and instance type to the EKS AMI type
pub fn ami_type(ami_family: &str, instance_type: &str) -> &'static str {
  let arm = is_arm(instance_type) && !is_nvidia(instance_type);

  match ami_family {
    "AmazonLinux2023" if arm => "AL2023_ARM_64_STANDARD",
    "AmazonLinux2023" if is_nvidia(instance_type) => "AL2023_x86_64_NVIDIA",
    "AmazonLinux2023" if is_neuron(instance_type) => "AL2023_x86_64_NEURON",
    "AmazonLinux2023" => "AL2023_x86_64_STANDARD",
    "AmazonLinux2" if arm => "AL2_ARM_64",
    "AmazonLinux2" if is_nvidia(instance_type) || is_neuron(instance_type) => "AL2_x86_64_GPU",
    "AmazonLinux2" => "AL2_x86_64",
    "Bottlerocket" if arm => "BOTTLEROCKET_ARM_64",
    "Bottlerocket" if is_nvidia(instance_type) => "BOTTLEROCKET_x86_64_NVIDIA",
    "Bottlerocket" => "BOTTLEROCKET_x86_64",
    _ => "CUSTOM",
  }
}

/// Shorthand used by `generate nodegroup-stack`
pub fn managed_nodegroup_template(cluster: &ClusterConfig, nodegroup: &ManagedNodeGroup) -> Result<Template> {
  ManagedNodeGroupResourceSet::new(cluster, nodegroup).build()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    cfn::eks::Nodegroup,
    config::{self, NodeGroupSsh},
  };

  fn cluster() -> ClusterConfig {
    let mut cluster = ClusterConfig::new("dev", "us-west-2");
    cluster.metadata.tags.insert("env".into(), "test".into());
    cluster
  }

  #[test]
  fn default_nodegroup() {
    let cluster = cluster();
    let ng = ManagedNodeGroup::new("ng-1");
    let template = managed_nodegroup_template(&cluster, &ng).unwrap();

    assert!(template.has_resource(INSTANCE_ROLE_RESOURCE));
    assert!(template.has_resource(LAUNCH_TEMPLATE_RESOURCE));
    assert!(!template.has_resource(SSH_RESOURCE));
    assert!(template.outputs.contains_key("InstanceRoleARN"));

    let nodegroup = template.resource::<Nodegroup>(MANAGED_NODEGROUP_RESOURCE).unwrap().properties;
    assert_eq!(nodegroup.ami_type, Some(Value::string("AL2_x86_64")));
    assert_eq!(nodegroup.capacity_type, Some(Value::string("ON_DEMAND")));
    assert_eq!(nodegroup.node_role, Some(Value::get_att("NodeInstanceRole", "Arn")));
    assert_eq!(
      nodegroup.labels.unwrap().to_json(),
      json!({"alpha.eksctl.io/cluster-name": "dev", "alpha.eksctl.io/nodegroup-name": "ng-1"})
    );
    assert_eq!(nodegroup.tags.unwrap().to_json(), json!({"env": "test"}));
    assert_eq!(
      nodegroup.subnets.unwrap().to_json(),
      json!({"Fn::Split": [",", {"Fn::ImportValue": "eksctl-dev-cluster::SubnetsPublic"}]})
    );

    let scaling = nodegroup.scaling_config.unwrap();
    assert_eq!(scaling.desired_size, Some(Value::integer(2)));
  }

  #[test]
  fn instance_role_arn_skips_role() {
    let cluster = cluster();
    let mut ng = ManagedNodeGroup::new("ng-1");
    ng.iam.instance_role_arn = Some("arn:aws:iam::123456789012:role/nodes".into());

    let template = managed_nodegroup_template(&cluster, &ng).unwrap();
    assert!(!template.has_resource(INSTANCE_ROLE_RESOURCE));
    assert!(template.outputs.is_empty());

    let nodegroup = template.resource::<Nodegroup>(MANAGED_NODEGROUP_RESOURCE).unwrap().properties;
    assert_eq!(
      nodegroup.node_role,
      Some(Value::string("arn:aws:iam::123456789012:role/nodes"))
    );
  }

  #[test]
  fn ssh_access_adds_security_group() {
    let cluster = cluster();
    let mut ng = ManagedNodeGroup::new("ng-1");
    ng.ssh = NodeGroupSsh {
      allow: true,
      public_key_name: Some("dev-key".into()),
      ..Default::default()
    };

    let template = managed_nodegroup_template(&cluster, &ng).unwrap();
    assert!(template.has_resource(SSH_RESOURCE));
    assert_eq!(
      template.description.as_deref(),
      Some("EKS Managed Nodes (SSH access: true) [created by eksctl]")
    );

    let lt = template.resource::<LaunchTemplate>(LAUNCH_TEMPLATE_RESOURCE).unwrap().properties;
    let data = lt.launch_template_data.unwrap();
    assert_eq!(data.key_name, Some(Value::string("dev-key")));
    assert_eq!(
      data.security_group_ids.unwrap().to_json(),
      json!([{"Fn::ImportValue": "eksctl-dev-cluster::ClusterSecurityGroupId"}, {"Ref": "SSH"}])
    );
  }

  #[test]
  fn taints_and_spot() {
    let cluster = cluster();
    let mut ng = ManagedNodeGroup::new("ng-1");
    ng.spot = true;
    ng.taints.push(config::Taint {
      key: "dedicated".into(),
      value: "gpu".into(),
      effect: "NoSchedule".into(),
    });

    let template = managed_nodegroup_template(&cluster, &ng).unwrap();
    let nodegroup = template.resource::<Nodegroup>(MANAGED_NODEGROUP_RESOURCE).unwrap().properties;
    assert_eq!(nodegroup.capacity_type, Some(Value::string("SPOT")));
    assert_eq!(
      nodegroup.taints.unwrap()[0].effect,
      Some(Value::string("NO_SCHEDULE"))
    );

    ng.taints[0].effect = "Sometimes".into();
    let err = managed_nodegroup_template(&cluster, &ng).unwrap_err();
    assert_eq!(err.to_string(), "unexpected taint effect: Sometimes");
  }

  #[test]
  fn ami_types() {
    assert_eq!(ami_type("AmazonLinux2", "m5.large"), "AL2_x86_64");
    assert_eq!(ami_type("AmazonLinux2", "m6g.large"), "AL2_ARM_64");
    assert_eq!(ami_type("AmazonLinux2", "p3.2xlarge"), "AL2_x86_64_GPU");
    assert_eq!(ami_type("AmazonLinux2023", "c7g.large"), "AL2023_ARM_64_STANDARD");
    assert_eq!(ami_type("Bottlerocket", "g4dn.xlarge"), "BOTTLEROCKET_x86_64_NVIDIA");
    assert_eq!(ami_type("Ubuntu2004", "m5.large"), "CUSTOM");
  }

  #[test]
  fn ami_types_non_ascii_instance_type() {
    assert_eq!(ami_type("AmazonLinux2", "aé.large"), "AL2_x86_64");
    assert_eq!(ami_type("AmazonLinux2", "é"), "AL2_x86_64");
    assert_eq!(ami_type("AmazonLinux2023", "m6gé.large"), "AL2023_ARM_64_STANDARD");
  }
}
