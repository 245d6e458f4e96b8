use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use super::{flux::Installer, profile::Profile};
use crate::{
  config,
  git::{CloneOptions, Executor},
  k8s::KubeApi,
};

/// Installs Flux, then applies a Quick Start profile to the user's repository
pub struct Applier<'a, E, K> {
  user_repo_path: PathBuf,
  repo: config::Repo,
  quickstart: config::Profile,
  flux_installer: Installer<'a, E, K>,
  profile: Profile<E>,
}

impl<'a, E: Executor, K: KubeApi> Applier<'a, E, K> {
  pub fn new(
    user_repo_path: PathBuf,
    repo: config::Repo,
    quickstart: config::Profile,
    flux_installer: Installer<'a, E, K>,
    profile: Profile<E>,
  ) -> Self {
    Self {
      user_repo_path,
      repo,
      quickstart,
      flux_installer,
      profile,
    }
  }

  pub fn flux_installer(&self) -> &Installer<'a, E, K> {
    &self.flux_installer
  }

  pub fn profile(&self) -> &Profile<E> {
    &self.profile
  }

  /// Returns Flux's instructions for granting it access to the repository, if Flux was installed
  pub async fn run(&mut self) -> Result<Option<String>> {
    let instructions = self.flux_installer.run().await?;

    info!("cloning {} into {}", self.repo.url, self.user_repo_path.display());
    let options = CloneOptions {
      url: self.repo.url.clone(),
      branch: self.repo.branch.clone(),
      bootstrap: true,
    };
    self
      .profile
      .user_repo_mut()
      .clone_repo_in_path(&self.user_repo_path, &options)
      .await
      .with_context(|| format!("cannot clone repository {}", self.repo.url))?;

    self
      .profile
      .commit_profile(&self.user_repo_path, &self.repo, &self.quickstart)
      .await?;
    info!(
      "Quick Start profile {} applied to {}",
      self.quickstart.source, self.repo.url
    );

    Ok(instructions)
  }
}
