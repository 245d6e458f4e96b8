mod common;

use std::collections::BTreeMap;

use common::{
  fixtures::{self, CLUSTER},
  mock_aws::{MockAwsClients, MockAwsClientsError},
  mock_stacks::{MockStacks, StackBehaviour},
};
use eksctl::{addon, cfn::stack::labels_from_template, config, label, output};

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

// ============================================================================
// Nodegroup labels
// ============================================================================

#[tokio::test]
async fn get_labels_from_stack() {
  let stacks = MockStacks::with_labels(&[("alpha.eksctl.io/cluster-name", CLUSTER), ("team", "a")]);
  let eks = MockAwsClients::default();

  let summaries = label::Manager::new(CLUSTER, &stacks, &eks).get("ng-1").await.unwrap();

  assert_eq!(
    summaries,
    vec![label::Summary {
      cluster: CLUSTER.to_string(),
      nodegroup: "ng-1".to_string(),
      labels: labels(&[("alpha.eksctl.io/cluster-name", CLUSTER), ("team", "a")]),
    }]
  );
}

#[tokio::test]
async fn get_labels_falls_back_to_eks_without_stack() {
  let stacks = MockStacks::failing(StackBehaviour::Missing);
  let eks = fixtures::healthy_aws();

  let summaries = label::Manager::new(CLUSTER, &stacks, &eks)
    .get("ng-unowned")
    .await
    .unwrap();

  assert_eq!(summaries[0].labels, labels(&[("env", "dev"), ("team", "platform")]));
}

#[tokio::test]
async fn get_labels_propagates_other_stack_errors() {
  let stacks = MockStacks::failing(StackBehaviour::Broken);
  let eks = fixtures::healthy_aws();

  let err = label::Manager::new(CLUSTER, &stacks, &eks)
    .get("ng-unowned")
    .await
    .unwrap_err();
  assert_eq!(err.to_string(), "something-terrible");
}

#[tokio::test]
async fn get_labels_fallback_error() {
  let stacks = MockStacks::failing(StackBehaviour::Missing);

  let err = label::Manager::new(CLUSTER, &stacks, &MockAwsClientsError)
    .get("ng-1")
    .await
    .unwrap_err();
  assert_eq!(err.to_string(), "mock AWS error: get_nodegroup");
}

#[tokio::test]
async fn set_labels_updates_stack() {
  let stacks = MockStacks::with_labels(&[("team", "a")]);
  let eks = MockAwsClients::default();

  label::Manager::new(CLUSTER, &stacks, &eks)
    .set("ng-1", &labels(&[("team", "b"), ("tier", "web")]))
    .await
    .unwrap();

  assert_eq!(stacks.labels(), labels(&[("team", "b"), ("tier", "web")]));
  assert!(eks.label_updates().is_empty());
}

#[tokio::test]
async fn set_labels_falls_back_to_eks_without_stack() {
  let stacks = MockStacks::failing(StackBehaviour::Missing);
  let eks = MockAwsClients::default();

  label::Manager::new(CLUSTER, &stacks, &eks)
    .set("ng-unowned", &labels(&[("tier", "web")]))
    .await
    .unwrap();

  assert_eq!(
    eks.label_updates(),
    vec![("ng-unowned".to_string(), labels(&[("tier", "web")]), vec![])]
  );
}

#[tokio::test]
async fn set_labels_propagates_other_stack_errors() {
  let stacks = MockStacks::failing(StackBehaviour::Broken);
  let eks = MockAwsClients::default();

  let result = label::Manager::new(CLUSTER, &stacks, &eks)
    .set("ng-1", &labels(&[("tier", "web")]))
    .await;

  assert!(result.is_err());
  assert!(eks.label_updates().is_empty());
}

#[tokio::test]
async fn unset_labels() {
  let stacks = MockStacks::with_labels(&[("team", "a"), ("tier", "web")]);
  let eks = MockAwsClients::default();

  label::Manager::new(CLUSTER, &stacks, &eks)
    .unset("ng-1", &["tier".to_string(), "absent".to_string()])
    .await
    .unwrap();

  assert_eq!(stacks.labels(), labels(&[("team", "a")]));
}

#[tokio::test]
async fn unset_labels_falls_back_to_eks_without_stack() {
  let stacks = MockStacks::failing(StackBehaviour::Missing);
  let eks = MockAwsClients::default();

  label::Manager::new(CLUSTER, &stacks, &eks)
    .unset("ng-unowned", &["team".to_string()])
    .await
    .unwrap();

  assert_eq!(
    eks.label_updates(),
    vec![("ng-unowned".to_string(), BTreeMap::new(), vec!["team".to_string()])]
  );
}

// ============================================================================
// Addons
// ============================================================================

#[tokio::test]
async fn get_addon_with_newer_versions() {
  let eks = fixtures::healthy_aws();
  let manager = addon::Manager::new(CLUSTER, "1.30", &eks);

  let summary = manager.get("vpc-cni").await.unwrap();
  assert_eq!(summary.name, "vpc-cni");
  assert_eq!(summary.version, "v1.1.0-eksbuild.1");
  assert_eq!(summary.status, "ACTIVE");
  assert_eq!(summary.iam_role, "arn:aws:iam::123456789012:role/vpc-cni");
  assert_eq!(summary.newer_version, "v1.1.0-eksbuild.4,v1.2.0-eksbuild.1");
}

#[tokio::test]
async fn get_addon_without_available_versions() {
  let eks = fixtures::healthy_aws();
  let manager = addon::Manager::new(CLUSTER, "1.30", &eks);

  let summary = manager.get("coredns").await.unwrap();
  assert_eq!(summary.newer_version, "");
  assert_eq!(summary.issues.len(), 1);
  assert_eq!(summary.issues[0].code, "InsufficientNumberOfReplicas");
}

#[tokio::test]
async fn get_all_addons() {
  let eks = fixtures::healthy_aws();
  let summaries = addon::Manager::new(CLUSTER, "1.30", &eks).get_all().await.unwrap();

  let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
  assert_eq!(names, vec!["vpc-cni", "coredns"]);
}

#[tokio::test]
async fn get_all_addons_empty() {
  let eks = MockAwsClients::default();
  let summaries = addon::Manager::new(CLUSTER, "1.30", &eks).get_all().await.unwrap();
  assert!(summaries.is_empty());
}

#[tokio::test]
async fn addon_errors() {
  let manager = addon::Manager::new(CLUSTER, "1.30", &MockAwsClientsError);

  let err = manager.get("vpc-cni").await.unwrap_err();
  assert_eq!(format!("{err:#}"), "failed to get addon \"vpc-cni\": mock AWS error: get_addon");

  let err = manager.get_all().await.unwrap_err();
  assert_eq!(format!("{err:#}"), "failed to list addons: mock AWS error: list_addons");
}

#[tokio::test]
async fn addon_json_output() {
  let eks = fixtures::healthy_aws();
  let summary = addon::Manager::new(CLUSTER, "1.30", &eks).get("coredns").await.unwrap();

  let rendered = output::render(&vec![summary], output::Format::Json).unwrap();
  insta::assert_snapshot!(rendered, @r#"
  [
    {
      "Name": "coredns",
      "Version": "v1.8.7-eksbuild.3",
      "NewerVersion": "",
      "IAMRole": "",
      "Status": "DEGRADED",
      "ConfigurationValues": "",
      "Issues": [
        {
          "Code": "InsufficientNumberOfReplicas",
          "Message": "not enough replicas",
          "ResourceIDs": [
            "coredns"
          ]
        }
      ]
    }
  ]
  "#);
}

// ============================================================================
// Nodegroup stacks
// ============================================================================

fn cluster_with_nodegroups() -> config::ClusterConfig {
  let mut cluster = config::ClusterConfig::new("dev", "us-west-2");
  let mut ng = config::ManagedNodeGroup::new("ng-1");
  ng.labels.insert("team".into(), "a".into());
  cluster.managed_node_groups.push(ng);
  cluster.managed_node_groups.push(config::ManagedNodeGroup::new("ng-2"));
  cluster
}

#[test]
fn nodegroup_stack_templates() {
  let cluster = cluster_with_nodegroups();

  let templates = eksctl::nodegroup_stack_templates(&cluster, None).unwrap();
  assert_eq!(
    templates.keys().map(String::as_str).collect::<Vec<_>>(),
    vec!["eksctl-dev-nodegroup-ng-1", "eksctl-dev-nodegroup-ng-2"]
  );

  let labels = labels_from_template(&templates["eksctl-dev-nodegroup-ng-1"]).unwrap();
  assert_eq!(labels["team"], "a");
  assert_eq!(labels["alpha.eksctl.io/nodegroup-name"], "ng-1");
}

#[test]
fn nodegroup_stack_template_by_name() {
  let cluster = cluster_with_nodegroups();

  let templates = eksctl::nodegroup_stack_templates(&cluster, Some("ng-2")).unwrap();
  assert_eq!(templates.len(), 1);
  assert!(templates.contains_key("eksctl-dev-nodegroup-ng-2"));

  let err = eksctl::nodegroup_stack_templates(&cluster, Some("ng-3")).unwrap_err();
  assert_eq!(err.to_string(), "managed nodegroup ng-3 not found in config file");
}
