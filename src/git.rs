use std::{
  future::Future,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{debug, info};

/// Runs external commands on behalf of the Git client
pub trait Executor {
  fn exec_in_dir(&self, command: &str, dir: &Path, args: &[String]) -> impl Future<Output = Result<()>> + Send;
}

/// Executes commands as child processes
#[derive(Clone, Debug, Default)]
pub struct ShellExecutor {
  private_ssh_key_path: Option<String>,
}

impl ShellExecutor {
  pub fn new(private_ssh_key_path: &str) -> Self {
    Self {
      private_ssh_key_path: (!private_ssh_key_path.is_empty()).then(|| private_ssh_key_path.to_string()),
    }
  }
}

impl Executor for ShellExecutor {
  async fn exec_in_dir(&self, command: &str, dir: &Path, args: &[String]) -> Result<()> {
    debug!("running {command} {} in {}", args.join(" "), dir.display());

    let mut cmd = Command::new(command);
    cmd.args(args).current_dir(dir);
    if let Some(key) = &self.private_ssh_key_path {
      cmd.env("GIT_SSH_COMMAND", format!("ssh -i {key}"));
    }

    let output = cmd
      .output()
      .await
      .with_context(|| format!("failed to run {command} {}", args.join(" ")))?;

    if !output.status.success() {
      bail!(
        "{command} {} failed with {}: {}",
        args.join(" "),
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
      );
    }

    Ok(())
  }
}

/// What to clone and how
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloneOptions {
  pub url: String,
  pub branch: String,
  /// Create the branch locally when it does not exist on the remote yet
  pub bootstrap: bool,
}

/// Drives the `git` CLI against one local clone
pub struct Client<E> {
  executor: E,
  dir: Option<PathBuf>,
}

fn args(raw: &[&str]) -> Vec<String> {
  raw.iter().map(|arg| arg.to_string()).collect()
}

impl<E: Executor> Client<E> {
  pub fn new(executor: E) -> Self {
    Self { executor, dir: None }
  }

  pub fn executor(&self) -> &E {
    &self.executor
  }

  /// The directory of the current clone
  pub fn dir(&self) -> Option<&Path> {
    self.dir.as_deref()
  }

  fn clone_dir(&self) -> Result<&Path> {
    self.dir.as_deref().context("no repository has been cloned")
  }

  async fn git(&self, dir: &Path, raw: &[&str]) -> Result<()> {
    self.executor.exec_in_dir("git", dir, &args(raw)).await
  }

  /// Clones into a new temporary directory whose name starts with `prefix`
  pub async fn clone_repo_in_tmp_dir(&mut self, prefix: &str, options: &CloneOptions) -> Result<PathBuf> {
    let dir = tempfile::Builder::new()
      .prefix(prefix)
      .tempdir()
      .context("failed to create a temporary directory")?;

    self.clone_repo_in_path(dir.path(), options).await?;
    Ok(dir.keep())
  }

  pub async fn clone_repo_in_path(&mut self, dir: &Path, options: &CloneOptions) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("unable to create directory {}", dir.display()))?;

    let target = dir.to_string_lossy();
    self
      .git(dir, &["clone", options.url.as_str(), &*target])
      .await
      .with_context(|| format!("unable to clone repository {}", options.url))?;
    self.dir = Some(dir.to_path_buf());

    if options.branch.is_empty() {
      return Ok(());
    }

    let remote_branch = format!("origin/{}", options.branch);
    if options.bootstrap
      && self
        .git(dir, &["rev-parse", "--verify", "--quiet", remote_branch.as_str()])
        .await
        .is_err()
    {
      info!("branch {} does not exist on the remote, creating it", options.branch);
      return self
        .git(dir, &["checkout", "-b", options.branch.as_str()])
        .await
        .with_context(|| format!("unable to create branch {}", options.branch));
    }

    self
      .git(dir, &["checkout", options.branch.as_str()])
      .await
      .with_context(|| format!("unable to checkout branch {}", options.branch))
  }

  /// Stages the given paths
  pub async fn add(&self, paths: &[&str]) -> Result<()> {
    let dir = self.clone_dir()?;
    let mut raw = vec!["add", "--"];
    raw.extend_from_slice(paths);
    self.git(dir, &raw).await
  }

  /// Commits staged changes, doing nothing when nothing is staged
  pub async fn commit(&self, message: &str, user: &str, email: &str) -> Result<()> {
    let dir = self.clone_dir()?;

    if self.git(dir, &["diff", "--cached", "--quiet"]).await.is_ok() {
      info!("nothing to commit");
      return Ok(());
    }

    self.git(dir, &["config", "user.email", email]).await?;
    self.git(dir, &["config", "user.name", user]).await?;
    let author = format!("--author={user} <{email}>");
    self.git(dir, &["commit", "-m", message, author.as_str()]).await
  }

  pub async fn push(&self) -> Result<()> {
    let dir = self.clone_dir()?;
    self.git(dir, &["config", "push.default", "current"]).await?;
    self.git(dir, &["push"]).await
  }

  /// Removes the local clone
  pub fn delete_local_repo(&mut self) -> Result<()> {
    if let Some(dir) = self.dir.take() {
      std::fs::remove_dir_all(&dir).with_context(|| format!("unable to delete {}", dir.display()))?;
    }
    Ok(())
  }
}

/// The repository name, the last path segment of the URL without `.git`
pub fn repo_name(url: &str) -> Result<String> {
  let path = url.trim_end_matches('/');
  let last = path
    .rsplit(['/', ':'])
    .next()
    .filter(|segment| !segment.is_empty())
    .with_context(|| format!("unable to parse repository name from {url}"))?;

  Ok(last.strip_suffix(".git").unwrap_or(last).to_string())
}

/// Whether the string looks like a Git URL, either `scheme://host/path` or `user@host:path`
pub fn is_git_url(raw: &str) -> bool {
  if let Some((scheme, rest)) = raw.split_once("://") {
    let valid_scheme =
      !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let authority = rest.split('/').next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    return valid_scheme && !host.is_empty();
  }

  match raw.split_once('@') {
    Some((user, rest)) => match rest.split_once(':') {
      Some((host, path)) => !user.is_empty() && !host.is_empty() && !host.contains('/') && !path.is_empty(),
      None => false,
    },
    None => false,
  }
}

pub fn validate_url(url: &str) -> Result<()> {
  if url.is_empty() {
    bail!("empty Git URL");
  }
  if !is_git_url(url) {
    bail!("invalid Git URL");
  }
  if url.starts_with("http://") || url.starts_with("https://") {
    bail!("got a HTTP(S) Git URL, but eksctl currently only supports SSH Git URLs");
  }
  Ok(())
}

/// An empty path is valid and means no key is used
pub fn validate_private_ssh_key_path(path: &str) -> Result<()> {
  if !path.is_empty() && !Path::new(path).is_file() {
    bail!("invalid path to private SSH key: {path}");
  }
  Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
  if email.is_empty() {
    bail!("empty Git email");
  }
  if !email.contains('@') {
    bail!("invalid Git email {email}");
  }
  Ok(())
}
