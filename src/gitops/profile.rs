use std::{
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use super::processor::{File, TemplateProcessor};
use crate::{
  config::{self, ClusterConfig},
  git::{self, CloneOptions, Executor},
};

const CLONE_DIR_PREFIX: &str = "quickstart-";
const IGNORE_FILE: &str = ".eksctlignore";

const QUICK_STARTS: [(&str, &str); 2] = [
  ("app-dev", "https://github.com/weaveworks/eks-quickstart-app-dev"),
  ("appmesh", "https://github.com/weaveworks/eks-appmesh-profile"),
];

/// Resolves a Quick Start name to its repository, Git URLs are returned as given
pub fn repository_url(name_or_url: &str) -> Result<String> {
  if git::is_git_url(name_or_url) {
    return Ok(name_or_url.to_string());
  }

  match QUICK_STARTS.iter().find(|(name, _)| *name == name_or_url) {
    Some((_, url)) => Ok(url.to_string()),
    None => bail!("invalid URL or unknown Quick Start {name_or_url}"),
  }
}

/// Paths listed in an ignore file, one per line, `#` starting a comment
pub fn parse_ignore_file(contents: &str) -> Vec<String> {
  contents
    .lines()
    .filter_map(|line| {
      let token = line.trim_start().split(|c: char| c.is_whitespace() || c == '#').next()?;
      (!token.is_empty()).then(|| token.to_string())
    })
    .collect()
}

/// Removes the paths listed in `.eksctlignore`, then the ignore file itself
pub fn ignore_files(base_dir: &Path) -> Result<()> {
  let ignore_file = base_dir.join(IGNORE_FILE);
  if !ignore_file.exists() {
    return Ok(());
  }

  info!("ignoring files declared in {IGNORE_FILE}");
  let contents =
    fs::read_to_string(&ignore_file).with_context(|| format!("cannot read {}", ignore_file.display()))?;

  for ignored in parse_ignore_file(&contents) {
    let path = base_dir.join(&ignored);
    if path.is_dir() {
      fs::remove_dir_all(&path)?;
    } else if path.exists() {
      fs::remove_file(&path)?;
    }
    info!("ignored {ignored:?}");
  }

  fs::remove_file(&ignore_file).with_context(|| format!("cannot remove {}", ignore_file.display()))
}

/// Every file below `dir` except the `.git` directory
pub fn load_files(dir: &Path) -> Result<Vec<File>> {
  let mut files = Vec::new();
  walk(dir, &dir.join(".git"), &mut files)
    .with_context(|| format!("unable to load files from directory {}", dir.display()))?;
  Ok(files)
}

fn walk(dir: &Path, git_dir: &Path, files: &mut Vec<File>) -> Result<()> {
  let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
  entries.sort_by_key(|entry| entry.path());

  for entry in entries {
    let path = entry.path();
    if path.starts_with(git_dir) {
      continue;
    }
    if path.is_dir() {
      walk(&path, git_dir, files)?;
      continue;
    }

    debug!("found file {}", path.display());
    let data = fs::read(&path).with_context(|| format!("cannot read file {}", path.display()))?;
    files.push(File { path, data });
  }

  Ok(())
}

/// Writes the files below `output_path`, creating directories as needed
pub fn write_files(files: &[File], output_path: &Path) -> Result<()> {
  for file in files {
    let path = output_path.join(&file.path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("error creating output manifests dir {}", output_path.display()))?;
    }

    debug!("writing file {}", path.display());
    fs::write(&path, &file.data).with_context(|| format!("error writing manifest {}", path.display()))?;
  }

  Ok(())
}

/// Generates Quick Start profiles and installs them into a user's repository
pub struct Profile<E> {
  processor: TemplateProcessor,
  profile_cloner: git::Client<E>,
  user_repo: git::Client<E>,
}

impl<E: Executor> Profile<E> {
  pub fn new(processor: TemplateProcessor, profile_cloner: git::Client<E>, user_repo: git::Client<E>) -> Self {
    Self {
      processor,
      profile_cloner,
      user_repo,
    }
  }

  pub fn user_repo(&self) -> &git::Client<E> {
    &self.user_repo
  }

  pub fn user_repo_mut(&mut self) -> &mut git::Client<E> {
    &mut self.user_repo
  }

  pub fn profile_cloner(&self) -> &git::Client<E> {
    &self.profile_cloner
  }

  /// Renders the profile's repository into `profile.output_path`
  pub async fn generate(&mut self, profile: &config::Profile) -> Result<()> {
    let source = repository_url(&profile.source).context("please supply a valid Quick Start name or URL")?;

    if profile.revision.is_empty() {
      info!("cloning repository {source}");
    } else {
      info!("cloning repository {source}:{}", profile.revision);
    }
    let options = CloneOptions {
      url: source.clone(),
      branch: profile.revision.clone(),
      bootstrap: false,
    };
    let cloned_dir = self
      .profile_cloner
      .clone_repo_in_tmp_dir(CLONE_DIR_PREFIX, &options)
      .await
      .with_context(|| format!("error cloning repository {source}"))?;

    ignore_files(&cloned_dir).with_context(|| format!("error ignoring files of repository {source}"))?;
    let files = load_files(&cloned_dir).with_context(|| format!("error loading files from repository {source}"))?;

    info!("processing template files in repository");
    let output_files = self
      .process_files(files, &cloned_dir)
      .with_context(|| format!("error processing manifests from repository {source}"))?;

    if output_files.is_empty() {
      info!("no template files found, nothing to write");
      return Ok(());
    }

    let output_path = Path::new(&profile.output_path);
    info!("writing new manifests to {}", output_path.display());
    write_files(&output_files, output_path)
      .with_context(|| format!("error writing manifests to dir {}", output_path.display()))?;

    debug!("deleting cloned directory {}", cloned_dir.display());
    if let Err(err) = self.profile_cloner.delete_local_repo() {
      warn!("unable to delete cloned directory {}: {err:#}", cloned_dir.display());
    }

    Ok(())
  }

  /// Renders every file and rewrites its path relative to `base_dir`
  pub fn process_files(&self, files: Vec<File>, base_dir: &Path) -> Result<Vec<File>> {
    files
      .into_iter()
      .map(|file| {
        let original = file.path.clone();
        let mut processed = self
          .processor
          .process(file)
          .with_context(|| format!("error processing file {}", original.display()))?;
        processed.path = processed
          .path
          .strip_prefix(base_dir)
          .map(PathBuf::from)
          .with_context(|| format!("cannot get relative path for file {}", original.display()))?;
        Ok(processed)
      })
      .collect()
  }

  /// Adds the bootstrap profile's components to the user's repository
  pub async fn install(&mut self, cluster_config: &ClusterConfig) -> Result<()> {
    let Some(git_config) = &cluster_config.git else {
      return Ok(());
    };
    let (Some(repo), Some(bootstrap_profile)) = (&git_config.repo, &git_config.bootstrap_profile) else {
      return Ok(());
    };

    let repo_name = git::repo_name(&repo.url)?;
    let options = CloneOptions {
      url: repo.url.clone(),
      branch: repo.branch.clone(),
      bootstrap: true,
    };
    let repo_dir = self
      .user_repo
      .clone_repo_in_tmp_dir(&format!("{repo_name}-"), &options)
      .await?;
    debug!(
      "directory {} will be used to clone the configuration repository and install the profile",
      repo_dir.display()
    );

    self.commit_profile(&repo_dir, repo, bootstrap_profile).await?;

    debug!("deleting cloned directory {}", repo_dir.display());
    if let Err(err) = self.user_repo.delete_local_repo() {
      warn!("unable to delete cloned directory {}: {err:#}", repo_dir.display());
    }

    Ok(())
  }

  /// Generates the profile into `<repo_dir>/base` of the cloned user repository, then commits and pushes it
  pub async fn commit_profile(
    &mut self,
    repo_dir: &Path,
    repo: &config::Repo,
    bootstrap_profile: &config::Profile,
  ) -> Result<()> {
    let profile = config::Profile {
      output_path: repo_dir.join("base").to_string_lossy().into_owned(),
      ..bootstrap_profile.clone()
    };
    self.generate(&profile).await.context("error generating profile")?;

    self.user_repo.add(&["."]).await?;
    let message = format!("Add {} quickstart components", bootstrap_profile.source);
    self.user_repo.commit(&message, &repo.user, &repo.email).await?;
    self.user_repo.push().await
  }
}
