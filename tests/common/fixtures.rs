use std::collections::HashMap;

use aws_sdk_eks::types::{Addon, AddonHealth, AddonIssue, AddonIssueCode, AddonStatus, Nodegroup};

use eksctl::config;

use super::{fake_exec::FakeExecutor, mock_aws::MockAwsClients};

pub const CLUSTER: &str = "test-cluster";
pub const REPO_URL: &str = "git@github.com:example/gitops-repo.git";

/// A cluster with one nodegroup created outside eksctl and two addons
pub fn healthy_aws() -> MockAwsClients {
  let nodegroup = Nodegroup::builder()
    .nodegroup_name("ng-unowned")
    .labels("team", "platform")
    .labels("env", "dev")
    .build();

  MockAwsClients {
    nodegroups: HashMap::from([("ng-unowned".to_string(), nodegroup)]),
    addons: vec![
      Addon::builder()
        .addon_name("vpc-cni")
        .addon_version("v1.1.0-eksbuild.1")
        .status(AddonStatus::Active)
        .service_account_role_arn("arn:aws:iam::123456789012:role/vpc-cni")
        .build(),
      Addon::builder()
        .addon_name("coredns")
        .addon_version("v1.8.7-eksbuild.3")
        .status(AddonStatus::Degraded)
        .health(
          AddonHealth::builder()
            .issues(
              AddonIssue::builder()
                .code(AddonIssueCode::InsufficientNumberOfReplicas)
                .message("not enough replicas")
                .resource_ids("coredns")
                .build(),
            )
            .build(),
        )
        .build(),
    ],
    addon_versions: HashMap::from([(
      "vpc-cni".to_string(),
      vec![
        "v1.2.0-eksbuild.1".to_string(),
        "v1.0.0-eksbuild.1".to_string(),
        "v1.1.0-eksbuild.4".to_string(),
        "v1.1.0-eksbuild.1".to_string(),
      ],
    )]),
    ..Default::default()
  }
}

pub fn repo() -> config::Repo {
  config::Repo {
    url: REPO_URL.to_string(),
    email: "flux@example.com".to_string(),
    paths: vec!["base".to_string()],
    ..Default::default()
  }
}

pub fn git_config() -> config::Git {
  config::Git {
    repo: Some(repo()),
    ..Default::default()
  }
}

/// Files of a Quick Start repository
pub fn quickstart_files() -> Vec<(&'static str, &'static str)> {
  vec![
    ("README.md", "# app-dev"),
    ("cluster.yaml.tmpl", "cluster: {{ .ClusterName }}\nregion: {{ .ClusterRegion }}\n"),
    ("kube-system/namespace.yaml", "kind: Namespace"),
    ("ignored/secret.yaml", "do not copy"),
    (".eksctlignore", "ignored\nREADME.md # docs\n"),
    (".git/HEAD", "ref: refs/heads/master"),
  ]
}

pub fn quickstart_cloner() -> FakeExecutor {
  FakeExecutor::with_files(&quickstart_files())
}
