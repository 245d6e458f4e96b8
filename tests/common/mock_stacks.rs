use std::{collections::BTreeMap, sync::Mutex};

use anyhow::{Result, bail};

use eksctl::{cfn::StackValidationError, label::NodegroupStackService};

/// How the mock stack service answers
#[derive(Clone, Debug, Default, PartialEq)]
pub enum StackBehaviour {
  /// The nodegroup has a stack carrying these labels
  #[default]
  Found,
  /// The stack does not exist
  Missing,
  /// Any other stack API failure
  Broken,
}

#[derive(Default)]
pub struct MockStacks {
  pub behaviour: StackBehaviour,
  pub labels: Mutex<BTreeMap<String, String>>,
}

impl MockStacks {
  pub fn with_labels(labels: &[(&str, &str)]) -> Self {
    Self {
      behaviour: StackBehaviour::Found,
      labels: Mutex::new(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
    }
  }

  pub fn failing(behaviour: StackBehaviour) -> Self {
    Self {
      behaviour,
      ..Default::default()
    }
  }

  pub fn labels(&self) -> BTreeMap<String, String> {
    self.labels.lock().unwrap().clone()
  }

  fn check(&self, nodegroup: &str) -> Result<()> {
    match self.behaviour {
      StackBehaviour::Found => Ok(()),
      StackBehaviour::Missing => Err(
        anyhow::Error::from(StackValidationError {
          stack: format!("eksctl-test-cluster-nodegroup-{nodegroup}"),
          message: "Stack with id does not exist".into(),
        })
        .context("omg what"),
      ),
      StackBehaviour::Broken => bail!("something-terrible"),
    }
  }
}

impl NodegroupStackService for MockStacks {
  async fn get_labels(&self, nodegroup: &str) -> Result<BTreeMap<String, String>> {
    self.check(nodegroup)?;
    Ok(self.labels())
  }

  async fn update_labels(&self, nodegroup: &str, add: &BTreeMap<String, String>, remove: &[String]) -> Result<()> {
    self.check(nodegroup)?;
    let mut labels = self.labels.lock().unwrap();
    labels.extend(add.iter().map(|(k, v)| (k.clone(), v.clone())));
    for key in remove {
      labels.remove(key);
    }
    Ok(())
  }
}
