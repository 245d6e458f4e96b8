use std::time::Duration;

use anstyle::{AnsiColor, Effects};
use anyhow::{Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, builder::Styles};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use crate::{config, output};

#[derive(Parser, Debug)]
#[command(author, about, version)]
#[command(propagate_version = true, styles = styles())]
pub struct Cli {
  #[command(subcommand)]
  pub commands: Commands,

  #[clap(flatten)]
  pub verbose: Verbosity<InfoLevel>,
}

fn styles() -> Styles {
  Styles::styled()
    .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
    .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
    .literal(AnsiColor::Green.on_default())
    .placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Get resource(s)
  #[command(subcommand)]
  Get(GetCommands),
  /// Set values
  #[command(subcommand)]
  Set(SetCommands),
  /// Unset values
  #[command(subcommand)]
  Unset(UnsetCommands),
  /// Enable features in a cluster
  #[command(subcommand)]
  Enable(EnableCommands),
  /// Generate GitOps manifests
  #[command(subcommand)]
  Generate(GenerateCommands),
  /// Commands for GitOps
  #[command(subcommand)]
  Gitops(GitopsCommands),
}

#[derive(Debug, Subcommand)]
pub enum GetCommands {
  /// Get nodegroup labels
  Labels(GetLabels),
  /// Get an addon or all addons of a cluster
  #[command(alias = "addons")]
  Addon(GetAddon),
}

#[derive(Debug, Subcommand)]
pub enum SetCommands {
  /// Create or overwrite labels for a managed nodegroup
  Labels(SetLabels),
}

#[derive(Debug, Subcommand)]
pub enum UnsetCommands {
  /// Remove labels from a managed nodegroup
  Labels(UnsetLabels),
}

#[derive(Debug, Subcommand)]
pub enum EnableCommands {
  /// Set up a repo for GitOps and install a Quick Start profile in it
  Profile(EnableProfile),
  /// Set up a repo for GitOps
  Repo(EnableRepo),
}

#[derive(Debug, Subcommand)]
pub enum GenerateCommands {
  /// Generate a GitOps profile
  Profile(GenerateProfile),
  /// Generate the stack template of a managed nodegroup
  NodegroupStack(GenerateNodegroupStack),
}

#[derive(Debug, Subcommand)]
pub enum GitopsCommands {
  /// Set up GitOps and apply a Quick Start profile
  Apply(GitopsApply),
}

/// Get the labels of a managed nodegroup
#[derive(Args, Debug, Clone)]
pub struct GetLabels {
  /// EKS cluster name
  #[arg(short, long)]
  pub cluster: String,

  /// Nodegroup name
  #[arg(short, long)]
  pub nodegroup: String,

  /// The AWS region where the cluster is provisioned
  #[arg(short, long)]
  pub region: Option<String>,

  #[arg(short, long, value_enum, default_value_t)]
  pub output: output::Format,
}

#[derive(Args, Debug, Clone)]
pub struct SetLabels {
  /// EKS cluster name
  #[arg(short, long)]
  pub cluster: String,

  /// Nodegroup name
  #[arg(short, long)]
  pub nodegroup: String,

  /// Labels to set, as key=value pairs separated by commas
  #[arg(short, long)]
  pub labels: String,

  /// The AWS region where the cluster is provisioned
  #[arg(short, long)]
  pub region: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UnsetLabels {
  /// EKS cluster name
  #[arg(short, long)]
  pub cluster: String,

  /// Nodegroup name
  #[arg(short, long)]
  pub nodegroup: String,

  /// Label keys to remove
  #[arg(short, long, value_delimiter = ',', required = true)]
  pub labels: Vec<String>,

  /// The AWS region where the cluster is provisioned
  #[arg(short, long)]
  pub region: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GetAddon {
  /// EKS cluster name
  #[arg(short, long)]
  pub cluster: String,

  /// Addon name, all addons are listed when omitted
  #[arg(long)]
  pub name: Option<String>,

  /// The AWS region where the cluster is provisioned
  #[arg(short, long)]
  pub region: Option<String>,

  #[arg(short, long, value_enum, default_value_t)]
  pub output: output::Format,
}

/// Flags selecting the cluster, either directly or through a config file
#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
  /// EKS cluster name
  #[arg(long)]
  pub cluster: Option<String>,

  /// The AWS region where the cluster is provisioned
  #[arg(short, long)]
  pub region: Option<String>,

  /// Load configuration from a file
  #[arg(short = 'f', long)]
  pub config_file: Option<String>,
}

/// Flags describing the GitOps repository
#[derive(Args, Debug, Clone)]
pub struct GitArgs {
  /// SSH URL of the Git repository to be used for GitOps, e.g. git@github.com:<github_org>/<repo_name>
  #[arg(long)]
  pub git_url: Option<String>,

  /// Git branch to be used for GitOps
  #[arg(long, default_value = config::DEFAULT_BRANCH)]
  pub git_branch: String,

  /// Username to use as Git committer
  #[arg(long, default_value = config::DEFAULT_GIT_USER)]
  pub git_user: String,

  /// Email to use as Git committer
  #[arg(long)]
  pub git_email: Option<String>,

  /// Optional path to the private SSH key to use with Git, e.g. ~/.ssh/id_rsa
  #[arg(long, default_value = "")]
  pub git_private_ssh_key_path: String,
}

impl Default for GitArgs {
  fn default() -> Self {
    Self {
      git_url: None,
      git_branch: config::DEFAULT_BRANCH.to_string(),
      git_user: config::DEFAULT_GIT_USER.to_string(),
      git_email: None,
      git_private_ssh_key_path: String::new(),
    }
  }
}

/// Flags controlling how Flux and the Helm Operator are installed
#[derive(Args, Debug, Clone)]
pub struct OperatorArgs {
  /// Relative paths within the Git repo for Flux to locate Kubernetes manifests
  #[arg(long, value_delimiter = ',')]
  pub git_paths: Vec<String>,

  /// Git label to keep track of Flux's sync progress
  #[arg(long, default_value = config::DEFAULT_OPERATOR_LABEL)]
  pub git_label: String,

  /// Directory within the Git repository where to commit the Flux manifests
  #[arg(long, default_value = config::DEFAULT_FLUX_PATH)]
  pub git_flux_subdir: String,

  /// Cluster namespace where to install Flux and the Helm Operator
  #[arg(long, default_value = config::DEFAULT_OPERATOR_NAMESPACE)]
  pub namespace: String,

  /// Install the Helm Operator
  #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_value_t = true, default_missing_value = "true")]
  pub with_helm: bool,

  /// Configure Flux in read-only mode and create the deploy key as read-only
  #[arg(long)]
  pub read_only: bool,

  /// Commit and push the Flux manifests to the Git repository
  #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_value_t = true, default_missing_value = "true")]
  pub commit_operator_manifests: bool,

  /// Additional command line arguments for the Flux daemon
  #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
  pub additional_flux_args: Vec<String>,

  /// Additional command line arguments for the Helm Operator
  #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
  pub additional_helm_operator_args: Vec<String>,
}

impl Default for OperatorArgs {
  fn default() -> Self {
    Self {
      git_paths: Vec::new(),
      git_label: config::DEFAULT_OPERATOR_LABEL.to_string(),
      git_flux_subdir: config::DEFAULT_FLUX_PATH.to_string(),
      namespace: config::DEFAULT_OPERATOR_NAMESPACE.to_string(),
      with_helm: true,
      read_only: false,
      commit_operator_manifests: true,
      additional_flux_args: Vec::new(),
      additional_helm_operator_args: Vec::new(),
    }
  }
}

/// Flags selecting a Quick Start profile
#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
  /// Name or URL of the Quick Start profile, for example app-dev
  #[arg(long)]
  pub profile_source: Option<String>,

  /// Revision of the Quick Start profile
  #[arg(long, default_value = config::DEFAULT_PROFILE_REVISION)]
  pub profile_revision: String,
}

impl Default for ProfileArgs {
  fn default() -> Self {
    Self {
      profile_source: None,
      profile_revision: config::DEFAULT_PROFILE_REVISION.to_string(),
    }
  }
}

#[derive(Args, Debug, Clone, Default)]
pub struct EnableProfile {
  /// Name or URL of the Quick Start profile
  pub name: Option<String>,

  #[clap(flatten)]
  pub cluster: ClusterArgs,

  #[clap(flatten)]
  pub git: GitArgs,

  #[clap(flatten)]
  pub profile: ProfileArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EnableRepo {
  #[clap(flatten)]
  pub cluster: ClusterArgs,

  #[clap(flatten)]
  pub git: GitArgs,

  #[clap(flatten)]
  pub operator: OperatorArgs,

  /// Maximum time to wait for Flux to start, e.g. 90s, 20m
  #[arg(long, default_value = "20m", value_parser = parse_duration)]
  pub timeout: Duration,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GenerateProfile {
  /// Name or URL of the Quick Start profile
  pub name: Option<String>,

  #[clap(flatten)]
  pub cluster: ClusterArgs,

  #[clap(flatten)]
  pub profile: ProfileArgs,

  /// Path to generate the profile in
  #[arg(long)]
  pub profile_path: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateNodegroupStack {
  /// Cluster config file describing the managed nodegroups
  #[arg(short = 'f', long)]
  pub config_file: String,

  /// Only generate the stack of this nodegroup
  #[arg(long)]
  pub name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GitopsApply {
  /// Name or URL of the Quick Start profile, for example app-dev
  #[arg(long)]
  pub quickstart_profile: String,

  /// SSH URL of the Git repository that will contain the cluster components
  #[arg(long)]
  pub git_url: String,

  /// Git branch
  #[arg(long, default_value = config::DEFAULT_BRANCH)]
  pub git_branch: String,

  /// Username to use as Git committer
  #[arg(long, default_value = config::DEFAULT_GIT_USER)]
  pub git_user: String,

  /// Email to use as Git committer
  #[arg(long)]
  pub git_email: String,

  /// Optional path to the private SSH key to use with Git
  #[arg(long, default_value = "")]
  pub git_private_ssh_key_path: String,

  /// Path to directory where the GitOps repo will be cloned
  #[arg(long, default_value = "./")]
  pub output_path: String,

  /// EKS cluster name
  #[arg(long)]
  pub cluster: String,

  /// The AWS region where the cluster is provisioned
  #[arg(short, long)]
  pub region: Option<String>,

  /// Maximum time to wait for Flux to start, e.g. 90s, 20m
  #[arg(long, default_value = "20m", value_parser = parse_duration)]
  pub timeout: Duration,
}

/// Parses durations such as `90s`, `20m` or `1h`, plain numbers are seconds
pub fn parse_duration(raw: &str) -> Result<Duration> {
  let raw = raw.trim();
  let (value, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
    Some(idx) => raw.split_at(idx),
    None => (raw, "s"),
  };

  let Ok(value) = value.parse::<u64>() else {
    bail!("invalid duration {raw:?}");
  };

  let seconds = match unit {
    "s" => value,
    "m" => value * 60,
    "h" => value * 60 * 60,
    _ => bail!("invalid duration unit in {raw:?}, expected one of s, m, h"),
  };

  Ok(Duration::from_secs(seconds))
}
