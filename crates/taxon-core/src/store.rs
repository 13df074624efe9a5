//! [`TaxonomyStore`]: per-level caches over a [`TaxonomyBackend`].
//!
//! Every [`list`](TaxonomyStore::list) is a full round trip; nothing is
//! memoised across calls. What the store keeps is (a) the last fetched page
//! per level and (b) an id → record index mirroring what the server last
//! said about each record, so ancestor lookups are O(1) once the relevant
//! collection has been read. A fresh page replaces the index entries it
//! covers; an invalidated level is re-fetched before its index is trusted.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

use crate::{
  Error, Result,
  backend::TaxonomyBackend,
  entity::{CascadeLevel, Entity, Id, Level, ListFilter},
};

#[derive(Debug, Default)]
struct LevelCache {
  index:   HashMap<Id, Entity>,
  last:    Option<(ListFilter, Vec<Entity>)>,
  current: bool,
}

/// Per-level record caches in front of a [`TaxonomyBackend`].
pub struct TaxonomyStore<B> {
  backend: B,
  caches:  Mutex<HashMap<Level, LevelCache>>,
}

impl<B: TaxonomyBackend> TaxonomyStore<B> {
  pub fn new(backend: B) -> Self {
    Self { backend, caches: Mutex::new(HashMap::new()) }
  }

  pub fn backend(&self) -> &B { &self.backend }

  fn caches(&self) -> MutexGuard<'_, HashMap<Level, LevelCache>> {
    self.caches.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Fetch `level`, optionally restricted by `filter`.
  ///
  /// Concurrent calls with different filters are independent; each caller
  /// gets its own result.
  pub async fn list(&self, level: Level, filter: ListFilter) -> Result<Vec<Entity>> {
    debug!(%level, ?filter, "fetching list");
    let entities = self
      .backend
      .list(level, filter)
      .await
      .map_err(|source| Error::FetchFailed { level, source })?;

    let mut caches = self.caches();
    let cache = caches.entry(level).or_default();
    // Anything the page should contain but doesn't is gone server-side.
    cache.index.retain(|_, e| !covered_by(e, filter));
    for entity in &entities {
      cache.index.insert(entity.id(), entity.clone());
    }
    cache.last = Some((filter, entities.clone()));
    cache.current = true;
    Ok(entities)
  }

  /// Children of `parent_id` at the level immediately above `level`.
  pub async fn list_children(&self, level: Level, parent_id: Id) -> Result<Vec<Entity>> {
    self.list(level, ListFilter::parent(level, parent_id)).await
  }

  /// Drop any assumption that `level` is current. The next
  /// [`lookup`](Self::lookup) at this level goes to the backend.
  pub fn invalidate(&self, level: Level) {
    debug!(%level, "invalidating cache");
    let mut caches = self.caches();
    let cache = caches.entry(level).or_default();
    cache.last = None;
    cache.current = false;
  }

  /// Whether `level` has been listed since its last invalidation.
  pub fn is_current(&self, level: Level) -> bool {
    self.caches().get(&level).is_some_and(|c| c.current)
  }

  /// The last fetched page for `level` and the filter it was fetched with.
  pub fn last_page(&self, level: Level) -> Option<(ListFilter, Vec<Entity>)> {
    self.caches().get(&level).and_then(|c| c.last.clone())
  }

  /// A previously seen record, without a round trip. May be stale after
  /// [`invalidate`](Self::invalidate).
  pub fn cached(&self, level: Level, id: Id) -> Option<Entity> {
    self.caches().get(&level).and_then(|c| c.index.get(&id).cloned())
  }

  /// Look `id` up in the index while `level` is current, falling back to a
  /// full fetch of `level`. `Ok(None)` means the record does not exist
  /// server-side.
  pub async fn lookup(&self, level: Level, id: Id) -> Result<Option<Entity>> {
    let hit = {
      let caches = self.caches();
      caches
        .get(&level)
        .filter(|c| c.current)
        .and_then(|c| c.index.get(&id).cloned())
    };
    if hit.is_some() {
      return Ok(hit);
    }
    let all = self.list(level, ListFilter::All).await?;
    Ok(all.into_iter().find(|e| e.id() == id))
  }

  /// Replace a record in place after a mutation that kept its identity.
  pub fn patch(&self, entity: &Entity) {
    let mut caches = self.caches();
    let cache = caches.entry(entity.level()).or_default();
    cache.index.insert(entity.id(), entity.clone());
    if let Some((_, page)) = cache.last.as_mut()
      && let Some(slot) = page.iter_mut().find(|e| e.id() == entity.id())
    {
      *slot = entity.clone();
    }
  }

  /// Forget a record that no longer exists.
  pub fn evict(&self, level: Level, id: Id) {
    let mut caches = self.caches();
    if let Some(cache) = caches.get_mut(&level) {
      cache.index.remove(&id);
      if let Some((_, page)) = cache.last.as_mut() {
        page.retain(|e| e.id() != id);
      }
    }
  }
}

/// Whether a page fetched with `filter` would have to contain `entity`.
/// Schools filtered by district can't be judged from the school alone.
fn covered_by(entity: &Entity, filter: ListFilter) -> bool {
  match filter {
    ListFilter::All => true,
    ListFilter::Under(by, id) => match (entity, by) {
      (Entity::School(s), CascadeLevel::Cluster) => s.cluster_id == Some(id),
      (e, by) => e.level().parent() == by && e.parent_id() == id,
    },
  }
}
