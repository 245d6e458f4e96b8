use std::future::Future;

use anyhow::{Context, Result};
use k8s_openapi::api::{
  apps::v1::Deployment,
  core::v1::{Namespace, Pod, Secret},
};
use kube::{
  Client,
  api::{Api, DynamicObject, ListParams, LogParams, Patch, PatchParams},
  core::GroupVersionKind,
  discovery::{self, Scope},
};
use serde::Deserialize;
use tracing::debug;

const FIELD_MANAGER: &str = "eksctl";

/// Trait abstracting the Kubernetes API operations used by eksctl
pub trait KubeApi {
  fn namespace_exists(&self, name: &str) -> impl Future<Output = Result<bool>> + Send;
  fn deployment_exists(&self, namespace: &str, name: &str) -> impl Future<Output = Result<bool>> + Send;
  fn secret_exists(&self, namespace: &str, name: &str) -> impl Future<Output = Result<bool>> + Send;
  /// Whether any object declared in the manifest is already present
  fn objects_exist(&self, manifest: &str) -> impl Future<Output = Result<bool>> + Send;
  /// Creates or updates every object declared in the manifest
  fn apply(&self, manifest: &str) -> impl Future<Output = Result<()>> + Send;
  /// Whether at least one pod matches the selector and every matching pod is ready
  fn pods_ready(&self, namespace: &str, selector: &str) -> impl Future<Output = Result<bool>> + Send;
  /// Logs of the first pod matching the selector, `None` when there is no such pod
  fn pod_logs(&self, namespace: &str, selector: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Splits a multi-document YAML manifest into objects, skipping empty documents
pub fn parse_manifests(manifest: &str) -> Result<Vec<DynamicObject>> {
  let mut objects = Vec::new();

  for document in serde_yaml::Deserializer::from_str(manifest) {
    let value = serde_yaml::Value::deserialize(document).context("Failed to parse manifest")?;
    if value.is_null() {
      continue;
    }
    let object: DynamicObject = serde_yaml::from_value(value).context("Failed to parse Kubernetes object")?;
    objects.push(object);
  }

  Ok(objects)
}

/// Joins manifests into a single multi-document manifest
pub fn concat_manifests<S: AsRef<str>>(manifests: &[S]) -> String {
  manifests
    .iter()
    .map(|manifest| manifest.as_ref().trim_start_matches("---").trim())
    .filter(|manifest| !manifest.is_empty())
    .collect::<Vec<_>>()
    .join("\n---\n")
}

pub fn namespace_manifest(name: &str) -> String {
  format!("---\napiVersion: v1\nkind: Namespace\nmetadata:\n  name: {name}\n")
}

fn is_ready(pod: &Pod) -> bool {
  pod
    .status
    .as_ref()
    .and_then(|status| status.conditions.as_ref())
    .is_some_and(|conditions| {
      conditions
        .iter()
        .any(|condition| condition.type_ == "Ready" && condition.status == "True")
    })
}

/// Real Kubernetes client implementation wrapping kube-rs
pub struct RealKubeApi {
  client: Client,
}

impl RealKubeApi {
  pub async fn new(cluster_name: &str) -> Result<Self> {
    match Client::try_default().await {
      Ok(client) => Ok(Self { client }),
      Err(e) => {
        anyhow::bail!(
          "Unable to connect to cluster: {e}\n\n\
          Ensure kubeconfig file is present and updated to connect to the cluster.\n\
          Try: aws eks update-kubeconfig --name {cluster_name}"
        );
      }
    }
  }

  async fn dynamic_api(&self, object: &DynamicObject) -> Result<Api<DynamicObject>> {
    let types = object.types.as_ref().context("object is missing apiVersion or kind")?;
    let gvk = GroupVersionKind::try_from(types)?;
    let (resource, capabilities) = discovery::pinned_kind(&self.client, &gvk)
      .await
      .with_context(|| format!("unable to find resource {}", gvk.kind))?;

    let api = match capabilities.scope {
      Scope::Namespaced => {
        let namespace = object.metadata.namespace.as_deref().unwrap_or("default");
        Api::namespaced_with(self.client.clone(), namespace, &resource)
      }
      Scope::Cluster => Api::all_with(self.client.clone(), &resource),
    };

    Ok(api)
  }

  async fn pods(&self, namespace: &str, selector: &str) -> Result<(Api<Pod>, Vec<Pod>)> {
    let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
    let pods = api
      .list(&ListParams::default().labels(selector))
      .await
      .with_context(|| format!("error while looking for pods matching {selector} in {namespace}"))?
      .items;

    Ok((api, pods))
  }
}

fn object_name(object: &DynamicObject) -> Result<&str> {
  object.metadata.name.as_deref().context("object is missing metadata.name")
}

impl KubeApi for RealKubeApi {
  async fn namespace_exists(&self, name: &str) -> Result<bool> {
    let api: Api<Namespace> = Api::all(self.client.clone());
    let namespace = api
      .get_opt(name)
      .await
      .with_context(|| format!("cannot check if namespace {name} exists"))?;

    Ok(namespace.is_some())
  }

  async fn deployment_exists(&self, namespace: &str, name: &str) -> Result<bool> {
    let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
    Ok(api.get_opt(name).await?.is_some())
  }

  async fn secret_exists(&self, namespace: &str, name: &str) -> Result<bool> {
    let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
    Ok(api.get_opt(name).await?.is_some())
  }

  async fn objects_exist(&self, manifest: &str) -> Result<bool> {
    for object in parse_manifests(manifest)? {
      let api = self.dynamic_api(&object).await?;
      if api.get_opt(object_name(&object)?).await?.is_some() {
        return Ok(true);
      }
    }

    Ok(false)
  }

  async fn apply(&self, manifest: &str) -> Result<()> {
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for object in parse_manifests(manifest)? {
      let api = self.dynamic_api(&object).await?;
      let name = object_name(&object)?;
      debug!("applying {name}");
      api
        .patch(name, &params, &Patch::Apply(&object))
        .await
        .with_context(|| format!("unable to apply {name}"))?;
    }

    Ok(())
  }

  async fn pods_ready(&self, namespace: &str, selector: &str) -> Result<bool> {
    let (_, pods) = self.pods(namespace, selector).await?;
    Ok(!pods.is_empty() && pods.iter().all(is_ready))
  }

  async fn pod_logs(&self, namespace: &str, selector: &str) -> Result<Option<String>> {
    let (api, pods) = self.pods(namespace, selector).await?;
    let Some(name) = pods.first().and_then(|pod| pod.metadata.name.clone()) else {
      return Ok(None);
    };

    let logs = api
      .logs(&name, &LogParams::default())
      .await
      .with_context(|| format!("unable to read logs of pod {name}"))?;

    Ok(Some(logs))
  }
}
