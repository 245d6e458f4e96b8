use std::sync::Mutex;

use anyhow::{Result, bail};

use eksctl::k8s::KubeApi;

/// Mock Kubernetes API. By default Flux is not installed and comes up ready straight away.
pub struct MockKube {
  pub namespace_exists: bool,
  pub flux_deployed: bool,
  pub deployment_error: bool,
  pub secret_exists: bool,
  pub memcached_exists: bool,
  pub pods_ready: bool,
  pub flux_logs: Option<String>,
  pub applied: Mutex<Vec<String>>,
}

pub const PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQ root@flux-6f8c9b5d4-x2x8k";

impl Default for MockKube {
  fn default() -> Self {
    Self {
      namespace_exists: false,
      flux_deployed: false,
      deployment_error: false,
      secret_exists: false,
      memcached_exists: false,
      pods_ready: true,
      flux_logs: Some(format!(
        "ts=2020-05-12T10:40:26Z caller=main.go:493 component=cluster identity.pub=\"{PUBLIC_KEY}\"\n"
      )),
      applied: Mutex::new(vec![]),
    }
  }
}

impl MockKube {
  pub fn applied(&self) -> Vec<String> {
    self.applied.lock().unwrap().clone()
  }
}

impl KubeApi for MockKube {
  async fn namespace_exists(&self, _name: &str) -> Result<bool> {
    Ok(self.namespace_exists)
  }

  async fn deployment_exists(&self, _namespace: &str, _name: &str) -> Result<bool> {
    if self.deployment_error {
      bail!("mock K8s error: deployment_exists");
    }
    Ok(self.flux_deployed)
  }

  async fn secret_exists(&self, _namespace: &str, _name: &str) -> Result<bool> {
    Ok(self.secret_exists)
  }

  async fn objects_exist(&self, manifest: &str) -> Result<bool> {
    Ok(self.memcached_exists && manifest.contains("memcached"))
  }

  async fn apply(&self, manifest: &str) -> Result<()> {
    self.applied.lock().unwrap().push(manifest.to_string());
    Ok(())
  }

  async fn pods_ready(&self, _namespace: &str, _selector: &str) -> Result<bool> {
    Ok(self.pods_ready)
  }

  async fn pod_logs(&self, _namespace: &str, _selector: &str) -> Result<Option<String>> {
    Ok(self.flux_logs.clone())
  }
}
