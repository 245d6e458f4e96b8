use std::process;

use anyhow::Result;
use clap::Parser;
use eksctl::{
  Cli, Commands,
  cli::{EnableCommands, GenerateCommands, GetCommands, GitopsCommands, SetCommands, UnsetCommands},
};

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_log::LogTracer::init()?;
  let subscriber = tracing_subscriber::fmt()
    .with_max_level(cli.verbose.tracing_level_filter())
    .without_time()
    .finish();
  tracing::subscriber::set_global_default(subscriber)?;

  let result = match &cli.commands {
    Commands::Get(GetCommands::Labels(args)) => eksctl::get_labels(args).await,
    Commands::Get(GetCommands::Addon(args)) => eksctl::get_addon(args).await,
    Commands::Set(SetCommands::Labels(args)) => eksctl::set_labels(args).await,
    Commands::Unset(UnsetCommands::Labels(args)) => eksctl::unset_labels(args).await,
    Commands::Enable(EnableCommands::Profile(args)) => eksctl::enable_profile(args).await,
    Commands::Enable(EnableCommands::Repo(args)) => eksctl::enable_repo(args).await,
    Commands::Generate(GenerateCommands::Profile(args)) => eksctl::generate_profile(args).await,
    Commands::Generate(GenerateCommands::NodegroupStack(args)) => eksctl::generate_nodegroup_stack(args),
    Commands::Gitops(GitopsCommands::Apply(args)) => eksctl::gitops_apply(args).await,
  };

  if let Err(err) = result {
    tracing::error!("{err:#}");
    process::exit(1);
  }

  Ok(())
}
