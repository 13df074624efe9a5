//! [`EntityLifecycleManager`]: validated create / update / toggle / delete.
//!
//! Local checks (attribute shape, required ancestor, school cross-link,
//! inactive-parent policy) run before any mutation request is sent. Remote
//! failures come back as typed [`Error`]s and are never retried here.

use tracing::{debug, warn};

use crate::{
  Error, Result,
  backend::TaxonomyBackend,
  entity::{AncestorChain, Attributes, Entity, EntityBody, Id, Level, ListFilter, ParentLink},
  error::FieldErrors,
  policy::{InactiveParentPolicy, LifecyclePolicy},
  store::TaxonomyStore,
};

// ─── Delete confirmation ─────────────────────────────────────────────────────

/// Explicit caller intent to permanently delete one record.
///
/// There is no default and no way to obtain one except by naming the target,
/// so a hard delete can never be reached through a code path that only meant
/// to deactivate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteConfirmation {
  level: Level,
  id:    Id,
}

impl DeleteConfirmation {
  pub fn new(level: Level, id: Id) -> Self { Self { level, id } }

  pub fn for_entity(entity: &Entity) -> Self { Self::new(entity.level(), entity.id()) }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

pub struct EntityLifecycleManager<'a, B> {
  store:  &'a TaxonomyStore<B>,
  policy: LifecyclePolicy,
}

impl<'a, B: TaxonomyBackend> EntityLifecycleManager<'a, B> {
  pub fn new(store: &'a TaxonomyStore<B>, policy: LifecyclePolicy) -> Self {
    Self { store, policy }
  }

  /// Create a record of `level` under the ancestor `chain` requires for it.
  ///
  /// Only the cache for `level` is invalidated; ancestor caches are left
  /// untouched.
  pub async fn create(
    &self,
    level: Level,
    attrs: Attributes,
    chain: AncestorChain,
  ) -> Result<Entity> {
    attrs.validate(level).map_err(Error::ValidationFailed)?;
    let link = chain.parent_link(level)?;
    self.check_link(level, &link).await?;
    self.check_parent_active(level, &link).await?;

    debug!(%level, parent = link.parent_id(), "creating");
    let created = self
      .store
      .backend()
      .create(level, EntityBody::new(attrs, Some(link)))
      .await?;
    self.store.invalidate(level);
    Ok(created)
  }

  /// Update the leaf attributes of `id`, and re-parent it when `chain` is
  /// given.
  pub async fn update(
    &self,
    level: Level,
    id: Id,
    attrs: Attributes,
    chain: Option<AncestorChain>,
  ) -> Result<Entity> {
    attrs.validate(level).map_err(Error::ValidationFailed)?;
    let link = match chain {
      Some(chain) => {
        let link = chain.parent_link(level)?;
        self.check_link(level, &link).await?;
        let moved = self
          .store
          .cached(level, id)
          .is_none_or(|current| current.parent_link() != link);
        if moved {
          self.check_parent_active(level, &link).await?;
        }
        Some(link)
      }
      None => None,
    };

    debug!(%level, id, reparent = link.is_some(), "updating");
    let updated = self
      .store
      .backend()
      .update(level, id, EntityBody::new(attrs, link))
      .await
      .map_err(|e| self.on_failure(level, id, e.into()))?;
    self.store.patch(&updated);
    if link.is_some() {
      // List membership may have changed.
      self.store.invalidate(level);
    }
    Ok(updated)
  }

  /// Flip `is_active`. Does not cascade to children.
  pub async fn toggle_active(&self, level: Level, id: Id) -> Result<Entity> {
    debug!(%level, id, "toggling");
    let toggled = self
      .store
      .backend()
      .toggle(level, id)
      .await
      .map_err(|e| self.on_failure(level, id, e.into()))?;
    self.store.patch(&toggled);
    Ok(toggled)
  }

  /// Permanently delete `id`. Children are not touched and become orphans.
  pub async fn delete(
    &self,
    level: Level,
    id: Id,
    confirmation: DeleteConfirmation,
  ) -> Result<()> {
    if confirmation != DeleteConfirmation::new(level, id) {
      return Err(Error::ConfirmationMismatch {
        level,
        id,
        confirmed_level: confirmation.level,
        confirmed_id: confirmation.id,
      });
    }
    debug!(%level, id, "deleting");
    self
      .store
      .backend()
      .delete(level, id)
      .await
      .map_err(|e| self.on_failure(level, id, e.into()))?;
    self.store.evict(level, id);
    self.store.invalidate(level);
    Ok(())
  }

  // ── Checks ────────────────────────────────────────────────────────────────

  /// A school's cluster must sit under the school's block.
  async fn check_link(&self, level: Level, link: &ParentLink) -> Result<()> {
    let ParentLink::Block { block_id, cluster_id: Some(cluster_id) } = *link else {
      return Ok(());
    };
    if level != Level::School {
      return Ok(());
    }
    let belongs = match self.store.cached(Level::Cluster, cluster_id) {
      Some(cluster) => cluster.parent_id() == block_id,
      None => self
        .store
        .list(Level::Cluster, ListFilter::parent(Level::Cluster, block_id))
        .await?
        .iter()
        .any(|c| c.id() == cluster_id),
    };
    if belongs {
      Ok(())
    } else {
      Err(Error::ValidationFailed(FieldErrors::single(
        "cluster_id",
        format!("cluster {cluster_id} does not belong to block {block_id}"),
      )))
    }
  }

  /// Applies the inactive-parent policy to the direct parent and, for
  /// schools, the cluster. Parents the cache can't vouch for are fetched;
  /// parents that don't exist are left for the server to reject.
  async fn check_parent_active(&self, level: Level, link: &ParentLink) -> Result<()> {
    let policy = self.policy.inactive_parents;
    if policy == InactiveParentPolicy::Allow {
      return Ok(());
    }
    let mut errors = FieldErrors::new();
    if let Some(parent_level) = level.parent().as_level()
      && let Some(parent) = self.store.lookup(parent_level, link.parent_id()).await?
      && !policy.admits(&parent)
    {
      errors.insert(
        level.parent_field(),
        format!("{parent_level} {} is inactive", parent.id()),
      );
    }
    if let ParentLink::Block { cluster_id: Some(cluster_id), .. } = *link
      && let Some(cluster) = self.store.lookup(Level::Cluster, cluster_id).await?
      && !policy.admits(&cluster)
    {
      errors.insert("cluster_id", format!("cluster {cluster_id} is inactive"));
    }
    if errors.is_empty() { Ok(()) } else { Err(Error::ValidationFailed(errors)) }
  }

  fn on_failure(&self, level: Level, id: Id, err: Error) -> Error {
    if let Error::NotFound { .. } = err {
      warn!(%level, id, "record vanished server-side; evicting");
      self.store.evict(level, id);
    }
    err
  }
}
