//! Configurable rules that are product decisions rather than tree invariants.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Whether an inactive node may be chosen as the parent of a *new* child.
///
/// Existing children of an inactive node are never affected: deactivation
/// does not cascade, and the node stays a valid parent for them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InactiveParentPolicy {
  #[default]
  Reject,
  Allow,
}

impl InactiveParentPolicy {
  pub fn admits(self, parent: &Entity) -> bool {
    match self {
      Self::Reject => parent.is_active(),
      Self::Allow => true,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
  #[serde(default)]
  pub inactive_parents: InactiveParentPolicy,
}
