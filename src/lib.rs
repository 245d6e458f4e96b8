//! `eksctl` manages Amazon EKS node group labels, add-ons and GitOps bootstrapping

pub mod addon;
pub mod cfn;
pub mod cli;
pub mod clients;
pub mod cmdutils;
pub mod config;
pub mod eks;
pub mod git;
pub mod gitops;
pub mod k8s;
pub mod label;
pub mod output;

use std::{collections::BTreeMap, env, path::Path};

use anyhow::{Context, Result, bail};
use aws_config::meta::region::RegionProviderChain;
use aws_types::region::Region;
use tracing::info;

pub use cli::{Cli, Commands};

use crate::{
  cfn::{StackCollection, builder, stack},
  cli::{
    EnableProfile, EnableRepo, GenerateNodegroupStack, GenerateProfile, GetAddon, GetLabels, GitopsApply, SetLabels,
    UnsetLabels,
  },
  clients::{AwsClients, RealAwsClients},
  config::ClusterConfig,
  git::ShellExecutor,
  gitops::{Applier, Installer, Profile, TemplateParameters, TemplateProcessor},
  k8s::RealKubeApi,
};

/// Get the configuration to authn/authz with AWS that will be used across AWS clients
pub async fn get_config(region: &Option<String>) -> Result<aws_config::SdkConfig> {
  let aws_region = match region {
    Some(region) => Some(Region::new(region.to_owned())),
    None => env::var("AWS_REGION").ok().map(Region::new),
  };

  let region_provider = RegionProviderChain::first_try(aws_region).or_default_provider();

  Ok(aws_config::from_env().region(region_provider).load().await)
}

pub async fn get_labels(args: &GetLabels) -> Result<()> {
  let aws_config = get_config(&args.region).await?;
  let stacks = StackCollection::new(&aws_config, &args.cluster);
  let eks = RealAwsClients::new(&aws_config);

  let summaries = label::Manager::new(&args.cluster, &stacks, &eks).get(&args.nodegroup).await?;
  output::print(&summaries, args.output, None)
}

pub async fn set_labels(args: &SetLabels) -> Result<()> {
  let labels = label::parse_labels(&args.labels)?;
  if labels.is_empty() {
    bail!("--labels must be set");
  }

  let aws_config = get_config(&args.region).await?;
  let stacks = StackCollection::new(&aws_config, &args.cluster);
  let eks = RealAwsClients::new(&aws_config);

  label::Manager::new(&args.cluster, &stacks, &eks)
    .set(&args.nodegroup, &labels)
    .await
}

pub async fn unset_labels(args: &UnsetLabels) -> Result<()> {
  let aws_config = get_config(&args.region).await?;
  let stacks = StackCollection::new(&aws_config, &args.cluster);
  let eks = RealAwsClients::new(&aws_config);

  label::Manager::new(&args.cluster, &stacks, &eks)
    .unset(&args.nodegroup, &args.labels)
    .await
}

pub async fn get_addon(args: &GetAddon) -> Result<()> {
  let aws_config = get_config(&args.region).await?;
  let eks = RealAwsClients::new(&aws_config);

  let cluster = eks.get_cluster(&args.cluster).await?;
  let version = cluster.version().context("Cluster version not found")?;
  let manager = addon::Manager::new(&args.cluster, version, &eks);

  let summaries = match &args.name {
    Some(name) => vec![manager.get(name).await?],
    None => manager.get_all().await?,
  };
  output::print(&summaries, args.output, None)
}

fn template_processor(cluster_config: &ClusterConfig) -> TemplateProcessor {
  TemplateProcessor::new(TemplateParameters {
    cluster_name: cluster_config.metadata.name.clone(),
    cluster_region: cluster_config.metadata.region.clone(),
  })
}

fn private_ssh_key_path(cluster_config: &ClusterConfig) -> &str {
  cluster_config
    .git
    .as_ref()
    .and_then(|git| git.repo.as_ref())
    .map(|repo| repo.private_ssh_key_path.as_str())
    .unwrap_or_default()
}

fn profile_generator(cluster_config: &ClusterConfig) -> Profile<ShellExecutor> {
  Profile::new(
    template_processor(cluster_config),
    git::Client::new(ShellExecutor::default()),
    git::Client::new(ShellExecutor::new(private_ssh_key_path(cluster_config))),
  )
}

pub async fn enable_profile(args: &EnableProfile) -> Result<()> {
  let cluster_config = cmdutils::load_enable_profile(args)?;

  profile_generator(&cluster_config).install(&cluster_config).await?;
  info!("profile successfully installed");

  Ok(())
}

pub async fn enable_repo(args: &EnableRepo) -> Result<()> {
  let cluster_config = cmdutils::load_enable_repo(args)?;
  let git_config = cluster_config.git.as_ref().context("git configuration is missing")?;

  let kube = RealKubeApi::new(&cluster_config.metadata.name).await?;
  let git_client = git::Client::new(ShellExecutor::new(private_ssh_key_path(&cluster_config)));
  let mut installer = Installer::new(git_config, args.timeout, &kube, git_client)?;

  if let Some(instructions) = installer.run().await? {
    println!("{instructions}");
  }

  Ok(())
}

pub async fn generate_profile(args: &GenerateProfile) -> Result<()> {
  let cluster_config = cmdutils::load_generate_profile(args)?;
  let profile = cluster_config
    .git
    .as_ref()
    .and_then(|git| git.bootstrap_profile.clone())
    .context("git.bootstrapProfile.Source must be set")?;

  profile_generator(&cluster_config).generate(&profile).await?;
  info!("profile generated in {}", profile.output_path);

  Ok(())
}

/// Stack templates of the managed node groups in the config file, keyed by stack name
pub fn nodegroup_stack_templates(
  cluster_config: &ClusterConfig,
  name: Option<&str>,
) -> Result<BTreeMap<String, cfn::Template>> {
  cluster_config.validate_managed_nodegroups()?;

  if let Some(name) = name
    && cluster_config.managed_node_group(name).is_none()
  {
    bail!("managed nodegroup {name} not found in config file");
  }

  cluster_config
    .managed_node_groups
    .iter()
    .filter(|ng| name.is_none_or(|name| ng.name == name))
    .map(|ng| {
      let template = builder::managed_nodegroup_template(cluster_config, ng)?;
      Ok::<_, anyhow::Error>((stack::nodegroup_stack_name(&cluster_config.metadata.name, &ng.name), template))
    })
    .collect()
}

pub fn generate_nodegroup_stack(args: &GenerateNodegroupStack) -> Result<()> {
  let cluster_config = config::load_from_file(&args.config_file)?;
  let templates = nodegroup_stack_templates(&cluster_config, args.name.as_deref())?;

  match (args.name.as_deref(), templates.values().next()) {
    (Some(_), Some(template)) => println!("{}", template.to_json()?),
    _ => println!("{}", serde_json::to_string_pretty(&templates)?),
  }

  Ok(())
}

pub async fn gitops_apply(args: &GitopsApply) -> Result<()> {
  let repo = config::Repo {
    url: args.git_url.clone(),
    branch: args.git_branch.clone(),
    user: args.git_user.clone(),
    email: args.git_email.clone(),
    private_ssh_key_path: args.git_private_ssh_key_path.clone(),
    ..Default::default()
  };
  let quickstart_url = cmdutils::validate_gitops_apply(&args.quickstart_profile, &repo)?;

  let region = args.region.clone().or_else(|| env::var("AWS_REGION").ok()).unwrap_or_default();
  let mut cluster_config = ClusterConfig::new(&args.cluster, &region);
  cluster_config.git = Some(config::Git {
    repo: Some(repo.clone()),
    ..Default::default()
  });

  let user_repo_path = Path::new(&args.output_path).join(git::repo_name(&repo.url)?);
  let quickstart = config::Profile {
    source: quickstart_url,
    revision: String::new(),
    output_path: user_repo_path.join("base").to_string_lossy().into_owned(),
  };

  let kube = RealKubeApi::new(&args.cluster).await?;
  let installer = Installer::new(
    cluster_config.git.as_ref().context("git configuration is missing")?,
    args.timeout,
    &kube,
    git::Client::new(ShellExecutor::new(&repo.private_ssh_key_path)),
  )?;

  let mut applier = Applier::new(
    user_repo_path,
    repo,
    quickstart,
    installer,
    profile_generator(&cluster_config),
  );
  if let Some(instructions) = applier.run().await? {
    println!("{instructions}");
  }

  Ok(())
}
