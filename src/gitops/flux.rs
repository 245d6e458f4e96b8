use std::{
  collections::BTreeMap,
  fs,
  path::Path,
  time::Duration,
};

use anyhow::{Context, Result, bail};
use handlebars::Handlebars;
use indicatif::{ProgressBar, ProgressStyle};
use rust_embed::RustEmbed;
use serde::Serialize;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::{
  config,
  git::{self, CloneOptions, Executor},
  k8s::{self, KubeApi},
};

pub const NAMESPACE_FILE_NAME: &str = "flux-namespace.yaml";
pub const PRIVATE_SSH_KEY_FILE_NAME: &str = "flux-secret.yaml";
pub const PRIVATE_SSH_KEY_SECRET_NAME: &str = "flux-git-deploy";

const CLONE_DIR_PREFIX: &str = "eksctl-install-flux-clone-";
const HELM_VERSIONS: &str = "v3";
const POLL_INTERVAL: Duration = Duration::from_secs(2);

const FLUX_TEMPLATES: [&str; 5] = [
  "flux-account.yaml",
  "flux-deployment.yaml",
  PRIVATE_SSH_KEY_FILE_NAME,
  "memcache-dep.yaml",
  "memcache-svc.yaml",
];
const HELM_OPERATOR_TEMPLATES: [&str; 3] = [
  "flux-helm-release-crd.yaml",
  "helm-operator-account.yaml",
  "helm-operator-deployment.yaml",
];

#[derive(RustEmbed)]
#[folder = "templates/flux/"]
struct Templates;

/// Values the Flux and Helm Operator manifests are rendered with
#[derive(Clone, Debug, Default, Serialize)]
pub struct ManifestParameters {
  pub namespace: String,
  pub ssh_secret_name: String,
  pub git_url: String,
  pub git_branch: String,
  pub git_paths: String,
  pub git_label: String,
  pub git_user: String,
  pub git_email: String,
  pub git_read_only: bool,
  pub additional_flux_args: Vec<String>,
  pub helm_versions: String,
  pub additional_helm_operator_args: Vec<String>,
}

impl ManifestParameters {
  pub fn new(repo: &config::Repo, operator: &config::Operator) -> Self {
    let mut additional_flux_args = vec!["--sync-garbage-collection".to_string()];
    additional_flux_args.extend(operator.additional_flux_args.iter().cloned());
    if operator.read_only {
      additional_flux_args.push("--registry-disable-scanning".to_string());
    }

    Self {
      namespace: operator.namespace.clone(),
      ssh_secret_name: PRIVATE_SSH_KEY_SECRET_NAME.to_string(),
      git_url: repo.url.clone(),
      git_branch: repo.branch.clone(),
      git_paths: repo.paths.join(","),
      git_label: operator.label.clone(),
      git_user: repo.user.clone(),
      git_email: repo.email.clone(),
      git_read_only: operator.read_only,
      additional_flux_args,
      helm_versions: HELM_VERSIONS.to_string(),
      additional_helm_operator_args: operator.additional_helm_operator_args.clone(),
    }
  }
}

/// Renders the manifests keyed by file name
///
/// The namespace manifest is only included when `create_namespace` is set.
pub fn render_manifests(
  params: &ManifestParameters,
  with_helm: bool,
  create_namespace: bool,
) -> Result<BTreeMap<String, String>> {
  let mut registry = Handlebars::new();
  registry.set_strict_mode(true);
  registry.register_escape_fn(handlebars::no_escape);
  registry.register_embed_templates::<Templates>()?;

  let mut names = FLUX_TEMPLATES.to_vec();
  if with_helm {
    names.extend(HELM_OPERATOR_TEMPLATES);
  }

  let mut manifests = BTreeMap::new();
  if create_namespace {
    manifests.insert(NAMESPACE_FILE_NAME.to_string(), k8s::namespace_manifest(&params.namespace));
  }
  for name in names {
    let rendered = registry
      .render(name, params)
      .with_context(|| format!("failed to render manifest {name}"))?;
    manifests.insert(name.to_string(), rendered);
  }

  Ok(manifests)
}

pub fn write_manifests(dir: &Path, manifests: &BTreeMap<String, String>) -> Result<()> {
  fs::create_dir_all(dir).with_context(|| format!("cannot create Flux manifests directory ({})", dir.display()))?;

  for (name, contents) in manifests {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("failed to write Flux manifest file {}", path.display()))?;
  }

  Ok(())
}

/// Extracts the public key Flux logs as `identity.pub="ssh-rsa ..."` on start-up
pub fn parse_public_key(logs: &str) -> Option<String> {
  const MARKER: &str = "identity.pub=\"";

  logs.lines().rev().find_map(|line| {
    let start = line.find(MARKER)? + MARKER.len();
    let rest = &line[start..];
    let key = &rest[..rest.find('"')?];
    (!key.is_empty()).then(|| key.trim().to_string())
  })
}

fn spinner(message: String) -> ProgressBar {
  let spinner = ProgressBar::new_spinner();
  if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
    spinner.set_style(style);
  }
  spinner.set_message(message);
  spinner.enable_steady_tick(Duration::from_millis(120));
  spinner
}

/// Installs Flux and the Helm Operator into the cluster, storing their manifests in the user's repository
pub struct Installer<'a, E, K> {
  repo: config::Repo,
  operator: config::Operator,
  timeout: Duration,
  kube: &'a K,
  git: git::Client<E>,
}

impl<'a, E: Executor, K: KubeApi> Installer<'a, E, K> {
  pub fn new(git_config: &config::Git, timeout: Duration, kube: &'a K, git: git::Client<E>) -> Result<Self> {
    let repo = git_config
      .repo
      .clone()
      .context("expected git.repo in cluster configuration but found none")?;

    Ok(Self {
      repo,
      operator: git_config.operator.clone(),
      timeout,
      kube,
      git,
    })
  }

  pub fn git_client(&self) -> &git::Client<E> {
    &self.git
  }

  /// Installs Flux, returning the instructions for granting it access to the repository
  ///
  /// Returns `None` when Flux is already deployed.
  pub async fn run(&mut self) -> Result<Option<String>> {
    if self.is_flux_installed().await {
      warn!(
        "found existing flux deployment in namespace {:?}. Skipping installation",
        self.operator.namespace
      );
      return Ok(None);
    }

    let instructions = self.install().await.inspect_err(|err| {
      error!("unable to set up gitops repo: {err:#}");
    })?;

    Ok(Some(instructions))
  }

  async fn is_flux_installed(&self) -> bool {
    match self.kube.deployment_exists(&self.operator.namespace, "flux").await {
      Ok(found) => {
        if !found {
          debug!("flux deployment was not found");
        }
        found
      }
      Err(err) => {
        warn!("unable to look for an existing flux deployment: {err:#}");
        false
      }
    }
  }

  /// Manifests to install, the namespace manifest included when the namespace is missing
  pub async fn manifests(&self) -> Result<BTreeMap<String, String>> {
    let namespace = &self.operator.namespace;
    let namespace_exists = self
      .kube
      .namespace_exists(namespace)
      .await
      .with_context(|| format!("cannot check if namespace {namespace} exists"))?;

    let params = ManifestParameters::new(&self.repo, &self.operator);
    render_manifests(&params, self.operator.with_helm, !namespace_exists).context("failed to create Flux manifests")
  }

  async fn install(&mut self) -> Result<String> {
    info!("generating manifests");
    let manifests = self.manifests().await?;

    info!("cloning {}", self.repo.url);
    let options = CloneOptions {
      url: self.repo.url.clone(),
      branch: self.repo.branch.clone(),
      bootstrap: true,
    };
    let clone_dir = self
      .git
      .clone_repo_in_tmp_dir(CLONE_DIR_PREFIX, &options)
      .await
      .with_context(|| format!("cannot clone repository {}", self.repo.url))?;

    let result = self.install_from(&clone_dir, manifests).await;
    match &result {
      Ok(_) => {
        if let Err(err) = self.git.delete_local_repo() {
          warn!("unable to delete cloned directory {}: {err:#}", clone_dir.display());
        }
      }
      Err(_) => error!(
        "You may find the local clone of {} used by eksctl at {}",
        self.repo.url,
        clone_dir.display()
      ),
    }

    result
  }

  async fn install_from(&self, clone_dir: &Path, mut manifests: BTreeMap<String, String>) -> Result<String> {
    info!("writing Flux manifests");
    write_manifests(&clone_dir.join(&self.repo.flux_path), &manifests)?;

    if let Some(namespace) = manifests.remove(NAMESPACE_FILE_NAME) {
      self.kube.apply(&namespace).await?;
    }

    info!("applying manifests");
    self.apply_manifests(manifests).await?;

    if self.operator.with_helm {
      info!("waiting for Helm Operator to start");
      self.wait_for_pods("helm-operator", "Helm Operator").await?;
      info!("Helm Operator started successfully");
      info!("see https://docs.fluxcd.io/projects/helm-operator for details on how to use the Helm Operator");
    }

    info!("waiting for Flux to start");
    self.wait_for_pods("flux", "Flux").await?;
    info!("fetching public SSH key from Flux");
    let key = self.wait_for_public_key().await?;
    info!("Flux started successfully");
    info!("see https://docs.fluxcd.io/projects/flux for details on how to use Flux");

    if self.operator.commit_operator_manifests {
      info!("committing and pushing manifests to {}", self.repo.url);
      self.git.add(&[self.repo.flux_path.as_str()]).await?;
      self
        .git
        .commit("Add Initial Flux configuration", &self.repo.user, &self.repo.email)
        .await?;
      self.git.push().await?;
    }

    info!("Flux will only operate properly once it has write-access to the Git repository");
    Ok(format!(
      "please configure {} so that the following Flux SSH public key has write access to it\n{key}",
      self.repo.url
    ))
  }

  async fn apply_manifests(&self, mut manifests: BTreeMap<String, String>) -> Result<()> {
    let namespace = &self.operator.namespace;

    // The secret holds Flux's private key, re-creating it would invalidate the deploy key
    if manifests.contains_key(PRIVATE_SSH_KEY_FILE_NAME)
      && self.kube.secret_exists(namespace, PRIVATE_SSH_KEY_SECRET_NAME).await?
    {
      debug!("secret {PRIVATE_SSH_KEY_SECRET_NAME} already exists");
      manifests.remove(PRIVATE_SSH_KEY_FILE_NAME);
    }

    let memcache: Vec<String> = manifests.keys().filter(|name| name.contains("memcache")).cloned().collect();
    for name in memcache {
      if self.kube.objects_exist(&manifests[&name]).await? {
        debug!("{name} already exists");
        manifests.remove(&name);
      }
    }

    let manifests: Vec<&String> = manifests.values().collect();
    self.kube.apply(&k8s::concat_manifests(&manifests)).await
  }

  async fn wait_for_pods(&self, name: &str, display_name: &str) -> Result<()> {
    let selector = format!("name={name}");
    let deadline = Instant::now() + self.timeout;
    let spinner = spinner(format!("waiting for {display_name} to start"));

    loop {
      match self.kube.pods_ready(&self.operator.namespace, &selector).await {
        Ok(true) => break,
        Ok(false) => debug!("{display_name} is not ready yet, retrying ..."),
        Err(err) => warn!("{display_name} is not ready yet ({err:#}), retrying ..."),
      }

      if Instant::now() >= deadline {
        spinner.finish_and_clear();
        bail!("timed out waiting for {display_name}'s pod to be ready");
      }
      sleep(POLL_INTERVAL).await;
    }

    spinner.finish_and_clear();
    Ok(())
  }

  async fn wait_for_public_key(&self) -> Result<String> {
    let deadline = Instant::now() + self.timeout;

    loop {
      match self.kube.pod_logs(&self.operator.namespace, "name=flux").await {
        Ok(Some(logs)) => {
          if let Some(key) = parse_public_key(&logs) {
            return Ok(key);
          }
        }
        Ok(None) => debug!("no Flux pod found yet"),
        Err(err) => warn!("unable to read Flux logs ({err:#}), retrying ..."),
      }

      if Instant::now() >= deadline {
        bail!("timed out waiting for Flux's public SSH key");
      }
      sleep(POLL_INTERVAL).await;
    }
  }
}
