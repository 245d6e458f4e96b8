//! Turns command line flags, or a cluster config file, into the `ClusterConfig` a GitOps command runs with

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::{
  cli::{ClusterArgs, EnableProfile, EnableRepo, GenerateProfile, GitArgs, OperatorArgs, ProfileArgs},
  config::{self, ClusterConfig},
  git,
  gitops::profile,
};

fn must_be_set(what: &str) -> anyhow::Error {
  anyhow::anyhow!("{what} must be set")
}

/// Loads the cluster name and region from flags, or from the config file given with `-f`
pub fn load_cluster(args: &ClusterArgs) -> Result<ClusterConfig> {
  let Some(config_file) = &args.config_file else {
    let name = args.cluster.clone().unwrap_or_default();
    let region = args.region.clone().unwrap_or_default();
    if name.is_empty() {
      return Err(must_be_set("--cluster"));
    }
    if region.is_empty() {
      return Err(must_be_set("--region"));
    }
    return Ok(ClusterConfig::new(&name, &region));
  };

  for (flag, value) in [("--cluster", &args.cluster), ("--region", &args.region)] {
    if value.is_some() {
      bail!("cannot use {flag} when --config-file/-f is set");
    }
  }

  let cluster_config = config::load_from_file(config_file)?;
  if cluster_config.metadata.name.is_empty() {
    return Err(must_be_set("metadata.name"));
  }
  if cluster_config.metadata.region.is_empty() {
    return Err(must_be_set("metadata.region"));
  }

  Ok(cluster_config)
}

/// The profile source, given either with `--profile-source` or as the positional argument
fn profile_source(flag: &Option<String>, argument: &Option<String>) -> Result<Option<String>> {
  match (flag.as_deref(), argument.as_deref()) {
    (Some(flag), Some(argument)) => {
      bail!("--profile-source={flag} and argument {argument} cannot be used at the same time")
    }
    (Some(source), None) | (None, Some(source)) => Ok(Some(source.to_string())),
    (None, None) => Ok(None),
  }
}

/// Where a profile is generated when no path is given: `./<name>` for Quick Starts, `./<repo-name>` for URLs
pub fn default_profile_output_path(source: &str) -> Result<String> {
  let name = if git::is_git_url(source) {
    git::repo_name(source)?
  } else {
    source.to_string()
  };

  Ok(format!("./{name}"))
}

fn bootstrap_profile(source: String, args: &ProfileArgs, output_path: Option<&str>) -> Result<config::Profile> {
  let output_path = match output_path {
    Some(path) => path.to_string(),
    None => default_profile_output_path(&source)?,
  };

  Ok(config::Profile {
    source,
    revision: args.profile_revision.clone(),
    output_path,
  })
}

/// Validates the repository options given on the command line
pub fn validate_git_options(repo: &config::Repo) -> Result<()> {
  git::validate_url(&repo.url).context("please supply a valid --git-url argument")?;
  if git::validate_email(&repo.email).is_err() {
    bail!("please supply a valid --git-email argument");
  }
  git::validate_private_ssh_key_path(&repo.private_ssh_key_path)
    .context("please supply a valid --git-private-ssh-key-path argument")?;
  Ok(())
}

/// Validates the repository of a cluster config file
fn validate_config_file_repo(git_config: &config::Git) -> Result<()> {
  let Some(repo) = &git_config.repo else {
    return Err(must_be_set("git.repo.url"));
  };
  if repo.url.is_empty() {
    return Err(must_be_set("git.repo.url"));
  }
  if repo.email.is_empty() {
    return Err(must_be_set("git.repo.email"));
  }
  git::validate_url(&repo.url).context("please supply a valid git.repo.url")?;
  git::validate_private_ssh_key_path(&repo.private_ssh_key_path)
    .context("please supply a valid file for git.repo.privateSSHKeyPath")?;
  Ok(())
}

/// `git.repo` built from the command line, failing on missing required flags
fn repo_from_flags(args: &GitArgs, flux_path: &str, paths: &[String]) -> Result<config::Repo> {
  let url = args.git_url.clone().unwrap_or_default();
  if url.is_empty() {
    return Err(must_be_set("--git-url"));
  }
  let email = args.git_email.clone().unwrap_or_default();
  if email.is_empty() {
    return Err(must_be_set("--git-email"));
  }

  Ok(config::Repo {
    url,
    branch: args.git_branch.clone(),
    paths: paths.to_vec(),
    flux_path: flux_path.to_string(),
    user: args.git_user.clone(),
    email,
    private_ssh_key_path: args.git_private_ssh_key_path.clone(),
  })
}

fn operator_from_flags(args: &OperatorArgs) -> config::Operator {
  config::Operator {
    commit_operator_manifests: args.commit_operator_manifests,
    label: args.git_label.clone(),
    namespace: args.namespace.clone(),
    with_helm: args.with_helm,
    read_only: args.read_only,
    additional_flux_args: args.additional_flux_args.clone(),
    additional_helm_operator_args: args.additional_helm_operator_args.clone(),
  }
}

/// Fills in a missing profile output path, failing when the profile has no source
fn complete_bootstrap_profile(git_config: &mut config::Git) -> Result<()> {
  let Some(profile) = git_config.bootstrap_profile.as_mut().filter(|p| !p.source.is_empty()) else {
    return Err(must_be_set("git.bootstrapProfile.Source"));
  };
  if profile.output_path.is_empty() {
    profile.output_path = default_profile_output_path(&profile.source)?;
  }
  Ok(())
}

pub fn load_enable_profile(args: &EnableProfile) -> Result<ClusterConfig> {
  let source = profile_source(&args.profile.profile_source, &args.name)?;

  if args.cluster.config_file.is_some() {
    if let Some(source) = source {
      bail!("cannot use {source} as profile source when --config-file/-f is set");
    }
    let mut cluster_config = load_cluster(&args.cluster)?;
    let git_config = cluster_config.git.get_or_insert_with(Default::default);
    validate_config_file_repo(git_config)?;
    complete_bootstrap_profile(git_config)?;
    return Ok(cluster_config);
  }

  let repo = repo_from_flags(&args.git, config::DEFAULT_FLUX_PATH, &[])?;
  let mut cluster_config = load_cluster(&args.cluster)?;
  let Some(source) = source else {
    return Err(must_be_set("--profile-source"));
  };
  validate_git_options(&repo)?;

  cluster_config.git = Some(config::Git {
    repo: Some(repo),
    operator: config::Operator::default(),
    bootstrap_profile: Some(bootstrap_profile(source, &args.profile, None)?),
  });

  Ok(cluster_config)
}

pub fn load_enable_repo(args: &EnableRepo) -> Result<ClusterConfig> {
  if args.cluster.config_file.is_some() {
    let mut cluster_config = load_cluster(&args.cluster)?;
    let git_config = cluster_config.git.get_or_insert_with(Default::default);
    validate_config_file_repo(git_config)?;
    return Ok(cluster_config);
  }

  let repo = repo_from_flags(&args.git, &args.operator.git_flux_subdir, &args.operator.git_paths)?;
  let mut cluster_config = load_cluster(&args.cluster)?;
  validate_git_options(&repo)?;

  cluster_config.git = Some(config::Git {
    repo: Some(repo),
    operator: operator_from_flags(&args.operator),
    bootstrap_profile: None,
  });

  Ok(cluster_config)
}

pub fn load_generate_profile(args: &GenerateProfile) -> Result<ClusterConfig> {
  let source = profile_source(&args.profile.profile_source, &args.name)?;

  if args.cluster.config_file.is_some() {
    if let Some(source) = source {
      bail!("cannot use {source} as profile source when --config-file/-f is set");
    }
    let mut cluster_config = load_cluster(&args.cluster)?;
    let git_config = cluster_config.git.get_or_insert_with(Default::default);
    complete_bootstrap_profile(git_config)?;
    if let (Some(path), Some(profile)) = (&args.profile_path, git_config.bootstrap_profile.as_mut()) {
      profile.output_path = path.clone();
    }
    return Ok(cluster_config);
  }

  let mut cluster_config = load_cluster(&args.cluster)?;
  let Some(source) = source else {
    return Err(must_be_set("--profile-source"));
  };

  cluster_config.git = Some(config::Git {
    bootstrap_profile: Some(bootstrap_profile(source, &args.profile, args.profile_path.as_deref())?),
    ..Default::default()
  });

  Ok(cluster_config)
}

/// Checks the `gitops apply` arguments that do not need the cluster
pub fn validate_gitops_apply(quickstart: &str, repo: &config::Repo) -> Result<String> {
  if quickstart.is_empty() {
    bail!("please supply a valid gitops Quick Start URL or name in --quickstart-profile");
  }
  git::validate_url(&repo.url).context("please supply a valid --git-url argument")?;
  if !repo.private_ssh_key_path.is_empty() && !Path::new(&repo.private_ssh_key_path).is_file() {
    bail!("please supply a valid --git-private-ssh-key-path argument");
  }

  profile::repository_url(quickstart).context("please supply a valid Quick Start name or URL")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn output_path_defaults() {
    assert_eq!(default_profile_output_path("app-dev").unwrap(), "./app-dev");
    assert_eq!(
      default_profile_output_path("git@github.com:weaveworks/eks-quickstart-app-dev.git").unwrap(),
      "./eks-quickstart-app-dev"
    );
  }

  #[test]
  fn profile_source_from_flag_or_argument() {
    let source = Some("app-dev".to_string());
    assert_eq!(profile_source(&source, &None).unwrap(), source);
    assert_eq!(profile_source(&None, &source).unwrap(), source);
    assert_eq!(profile_source(&None, &None).unwrap(), None);
    assert_eq!(
      profile_source(&source, &source).unwrap_err().to_string(),
      "--profile-source=app-dev and argument app-dev cannot be used at the same time"
    );
  }

  #[test]
  fn git_option_errors() {
    let repo = config::Repo {
      url: "https://github.com/org/repo.git".into(),
      email: "user@example.com".into(),
      ..Default::default()
    };
    let err = validate_git_options(&repo).unwrap_err();
    assert_eq!(
      format!("{err:#}"),
      "please supply a valid --git-url argument: got a HTTP(S) Git URL, but eksctl currently only supports SSH Git URLs"
    );

    let repo = config::Repo {
      url: "git@github.com:org/repo.git".into(),
      email: "user".into(),
      ..Default::default()
    };
    assert_eq!(
      validate_git_options(&repo).unwrap_err().to_string(),
      "please supply a valid --git-email argument"
    );
  }

  #[test]
  fn gitops_apply_arguments() {
    let repo = config::Repo {
      url: "git@github.com:org/repo.git".into(),
      ..Default::default()
    };

    assert_eq!(
      validate_gitops_apply("app-dev", &repo).unwrap(),
      "https://github.com/weaveworks/eks-quickstart-app-dev"
    );
    assert_eq!(
      validate_gitops_apply("", &repo).unwrap_err().to_string(),
      "please supply a valid gitops Quick Start URL or name in --quickstart-profile"
    );
    assert_eq!(
      validate_gitops_apply("nope", &repo).unwrap_err().to_string(),
      "please supply a valid Quick Start name or URL"
    );
  }
}
