use serde::{Deserialize, Serialize};

/// What happens to the physical resource when its logical resource is removed from the stack
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
  Delete,
  Retain,
  Snapshot,
}

/// What happens to the old physical resource when an update replaces it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateReplacePolicy {
  Delete,
  Retain,
  Snapshot,
}
