//! Behavioural tests for the store, cascade, breadcrumb and lifecycle layers
//! against an in-memory backend.

use std::sync::{
  Arc,
  atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::{
  BackendError, Error,
  backend::TaxonomyBackend,
  breadcrumb::{BreadcrumbResolver, GapCause},
  cascade::{CascadeController, OptionStatus, Phase},
  entity::{
    AncestorChain, Attributes, CascadeLevel, Entity, EntityBody, Id, Level, ListFilter, State,
  },
  form::EntityForm,
  lifecycle::{DeleteConfirmation, EntityLifecycleManager},
  memory::{Fixture, MemoryBackend},
  policy::{InactiveParentPolicy, LifecyclePolicy},
  store::TaxonomyStore,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

const FIXTURE: &str = r#"{
  "states": [
    {"id": 1, "name": "Karnataka"},
    {"id": 2, "name": "Kerala"}
  ],
  "districts": [
    {"id": 5, "name": "Bengaluru Urban", "state_id": 1},
    {"id": 6, "name": "Mysuru", "state_id": 1},
    {"id": 7, "name": "Ernakulam", "state_id": 2}
  ],
  "blocks": [
    {"id": 10, "name": "Anekal", "district_id": 5},
    {"id": 11, "name": "Hoskote", "district_id": 5},
    {"id": 20, "name": "Hunsur", "district_id": 6}
  ],
  "clusters": [
    {"id": 99, "name": "Cluster-7", "block_id": 10},
    {"id": 98, "name": "Cluster-8", "block_id": 11}
  ],
  "schools": [
    {"id": 500, "name": "GHPS Anekal", "block_id": 10, "cluster_id": 99, "teacher_count": 4}
  ]
}"#;

/// Counts calls and can be told to fail list reads.
#[derive(Default)]
struct Counting {
  inner:      MemoryBackend,
  lists:      AtomicUsize,
  mutations:  AtomicUsize,
  fail_lists: AtomicBool,
}

impl Counting {
  fn lists(&self) -> usize { self.lists.load(Ordering::SeqCst) }

  fn mutations(&self) -> usize { self.mutations.load(Ordering::SeqCst) }
}

impl TaxonomyBackend for Counting {
  async fn list(&self, level: Level, filter: ListFilter) -> Result<Vec<Entity>, BackendError> {
    self.lists.fetch_add(1, Ordering::SeqCst);
    if self.fail_lists.load(Ordering::SeqCst) {
      return Err(BackendError::Transport("connection reset".into()));
    }
    self.inner.list(level, filter).await
  }

  async fn create(&self, level: Level, body: EntityBody) -> Result<Entity, BackendError> {
    self.mutations.fetch_add(1, Ordering::SeqCst);
    self.inner.create(level, body).await
  }

  async fn update(&self, level: Level, id: Id, body: EntityBody) -> Result<Entity, BackendError> {
    self.mutations.fetch_add(1, Ordering::SeqCst);
    self.inner.update(level, id, body).await
  }

  async fn toggle(&self, level: Level, id: Id) -> Result<Entity, BackendError> {
    self.mutations.fetch_add(1, Ordering::SeqCst);
    self.inner.toggle(level, id).await
  }

  async fn delete(&self, level: Level, id: Id) -> Result<(), BackendError> {
    self.mutations.fetch_add(1, Ordering::SeqCst);
    self.inner.delete(level, id).await
  }
}

fn backend() -> Arc<Counting> {
  let fixture = Fixture::from_json(FIXTURE).expect("fixture");
  Arc::new(Counting {
    inner: MemoryBackend::from_fixture(fixture),
    ..Counting::default()
  })
}

fn store() -> (Arc<Counting>, TaxonomyStore<Arc<Counting>>) {
  let backend = backend();
  (backend.clone(), TaxonomyStore::new(backend))
}

fn manager(store: &TaxonomyStore<Arc<Counting>>) -> EntityLifecycleManager<'_, Arc<Counting>> {
  EntityLifecycleManager::new(store, LifecyclePolicy::default())
}

fn ids(entities: &[Entity]) -> Vec<Id> { entities.iter().map(Entity::id).collect() }

async fn school_500(store: &TaxonomyStore<Arc<Counting>>) -> Entity {
  store
    .backend()
    .inner
    .list(Level::School, ListFilter::All)
    .await
    .unwrap()
    .into_iter()
    .find(|e| e.id() == 500)
    .expect("school 500")
}

// ─── TaxonomyStore ───────────────────────────────────────────────────────────

#[tokio::test]
async fn list_is_a_round_trip_every_time() {
  let (backend, store) = store();
  store.list(Level::District, ListFilter::All).await.unwrap();
  store.list(Level::District, ListFilter::All).await.unwrap();
  assert_eq!(backend.lists(), 2);
}

#[tokio::test]
async fn list_children_filters_by_parent() {
  let (_, store) = store();
  let blocks = store.list_children(Level::Block, 5).await.unwrap();
  assert_eq!(ids(&blocks), vec![10, 11]);
  assert!(store.is_current(Level::Block));
}

#[tokio::test]
async fn fetch_failure_is_typed() {
  let (backend, store) = store();
  backend.fail_lists.store(true, Ordering::SeqCst);
  let err = store.list(Level::Cluster, ListFilter::All).await.unwrap_err();
  assert!(matches!(err, Error::FetchFailed { level: Level::Cluster, .. }));
}

#[tokio::test]
async fn invalidated_level_is_refetched_on_lookup() {
  let (backend, store) = store();
  store.list(Level::Block, ListFilter::All).await.unwrap();
  store.invalidate(Level::Block);
  assert!(!store.is_current(Level::Block));
  assert!(store.last_page(Level::Block).is_none());

  let before = backend.lists();
  assert!(store.lookup(Level::Block, 10).await.unwrap().is_some());
  assert_eq!(backend.lists(), before + 1);
  assert!(store.is_current(Level::Block));
}

#[tokio::test]
async fn full_page_replaces_the_index() {
  let (backend, store) = store();
  store.list(Level::District, ListFilter::All).await.unwrap();
  backend.inner.delete(Level::District, 5).await.unwrap();
  store.list(Level::District, ListFilter::All).await.unwrap();
  assert!(store.cached(Level::District, 5).is_none());
  assert!(store.cached(Level::District, 6).is_some());
}

#[tokio::test]
async fn filtered_page_forgets_missing_siblings_only() {
  let (backend, store) = store();
  store.list(Level::Block, ListFilter::All).await.unwrap();
  backend.inner.delete(Level::Block, 11).await.unwrap();
  store.list_children(Level::Block, 5).await.unwrap();
  assert!(store.cached(Level::Block, 11).is_none());
  assert!(store.cached(Level::Block, 10).is_some());
  // Block 20 sits under another district and was not covered by the page.
  assert!(store.cached(Level::Block, 20).is_some());
}

#[tokio::test]
async fn lookup_uses_index_before_fetching() {
  let (backend, store) = store();
  store.list(Level::Block, ListFilter::All).await.unwrap();
  let before = backend.lists();
  assert!(store.lookup(Level::Block, 11).await.unwrap().is_some());
  assert_eq!(backend.lists(), before);
  assert!(store.lookup(Level::Block, 404).await.unwrap().is_none());
  assert_eq!(backend.lists(), before + 1);
}

// ─── CascadeController ───────────────────────────────────────────────────────

#[tokio::test]
async fn new_state_clears_all_descendants_and_their_options() {
  let (_, store) = store();
  let mut c = CascadeController::new(InactiveParentPolicy::Reject);

  let t = c.select_state(1);
  assert!(c.loading_districts());
  assert!(c.load(&store, t).await);
  assert!(!c.loading_districts());
  let t = c.select_district(5).unwrap();
  c.load(&store, t).await;
  let t = c.select_block(10).unwrap();
  c.load(&store, t).await;
  c.select_cluster(99).unwrap();
  assert_eq!(c.phase(), Phase::ClusterSelected);
  assert_eq!(ids(c.options(CascadeLevel::Block)), vec![10, 11]);
  assert_eq!(ids(c.options(CascadeLevel::Cluster)), vec![99]);

  let t = c.select_state(2);
  assert_eq!(c.phase(), Phase::StateSelected);
  assert_eq!(c.selected(CascadeLevel::District), None);
  assert_eq!(c.selected(CascadeLevel::Block), None);
  assert_eq!(c.selected(CascadeLevel::Cluster), None);
  assert!(c.options(CascadeLevel::District).is_empty());
  assert!(c.options(CascadeLevel::Block).is_empty());
  assert!(c.options(CascadeLevel::Cluster).is_empty());
  assert!(c.status(CascadeLevel::Block).is_none());

  c.load(&store, t).await;
  assert_eq!(ids(c.options(CascadeLevel::District)), vec![7]);
}

#[test]
fn descendant_before_ancestor_is_rejected() {
  let mut c = CascadeController::default();
  let err = c.select_district(5).unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidTransition { attempted: CascadeLevel::District, missing: CascadeLevel::State }
  ));
  let _ = c.select_state(1);
  assert!(matches!(c.select_block(10), Err(Error::InvalidTransition { .. })));
  assert!(matches!(c.select_cluster(99), Err(Error::InvalidTransition { .. })));
  assert_eq!(c.phase(), Phase::StateSelected);
}

#[tokio::test]
async fn stale_block_options_are_discarded_in_either_order() {
  let (_, store) = store();
  for late_first in [true, false] {
    let mut c = CascadeController::default();
    let t = c.select_state(1);
    c.load(&store, t).await;

    let for_a = c.select_district(5).unwrap();
    let for_b = c.select_district(6).unwrap();
    let a = for_a.run(&store).await;
    let b = for_b.run(&store).await;

    if late_first {
      assert!(!c.settle(a));
      assert!(c.settle(b));
    } else {
      assert!(c.settle(b));
      assert!(!c.settle(a));
    }
    assert_eq!(ids(c.options(CascadeLevel::Block)), vec![20]);
    assert_eq!(c.selected(CascadeLevel::District), Some(6));
  }
}

#[tokio::test]
async fn options_for_a_cleared_selector_are_discarded() {
  let (_, store) = store();
  let mut c = CascadeController::default();
  let t = c.select_state(1);
  c.load(&store, t).await;
  let t = c.select_district(5).unwrap();
  c.load(&store, t).await;
  let clusters = c.select_block(10).unwrap();
  let _ = c.select_state(1);
  assert!(!c.load(&store, clusters).await);
  assert!(c.options(CascadeLevel::Cluster).is_empty());
}

#[tokio::test]
async fn failed_child_fetch_keeps_parent_selection() {
  let (backend, store) = store();
  let mut c = CascadeController::default();
  let t = c.select_state(1);
  c.load(&store, t).await;

  backend.fail_lists.store(true, Ordering::SeqCst);
  let t = c.select_district(5).unwrap();
  assert!(c.load(&store, t).await);
  assert_eq!(c.selected(CascadeLevel::District), Some(5));
  assert!(c.options(CascadeLevel::Block).is_empty());
  assert!(matches!(
    c.status(CascadeLevel::Block),
    Some(OptionStatus::Failed(BackendError::Transport(_)))
  ));
}

#[tokio::test]
async fn clearing_cluster_keeps_cluster_options() {
  let (_, store) = store();
  let (mut c, tickets) = CascadeController::seeded(
    InactiveParentPolicy::Reject,
    AncestorChain {
      state_id:    Some(1),
      district_id: Some(5),
      block_id:    Some(10),
      cluster_id:  Some(99),
    },
  );
  assert_eq!(tickets.len(), 3);
  for t in tickets {
    c.load(&store, t).await;
  }
  c.clear(CascadeLevel::Cluster);
  assert_eq!(c.phase(), Phase::BlockSelected);
  assert_eq!(ids(c.options(CascadeLevel::Cluster)), vec![99]);
}

#[tokio::test]
async fn states_come_from_the_provider() {
  let (backend, _) = store();
  let mut c = CascadeController::default();
  c.load_states(&backend.inner).await.unwrap();
  assert_eq!(c.states(), &[
    State { id: 1, name: "Karnataka".into() },
    State { id: 2, name: "Kerala".into() },
  ]);
}

// ─── BreadcrumbResolver ──────────────────────────────────────────────────────

#[tokio::test]
async fn school_breadcrumb_round_trip() {
  let (_, store) = store();
  let school = school_500(&store).await;
  let chain = BreadcrumbResolver::new(&store).resolve(&school).await;
  assert_eq!(chain, AncestorChain {
    state_id:    Some(1),
    district_id: Some(5),
    block_id:    Some(10),
    cluster_id:  Some(99),
  });
}

#[tokio::test]
async fn breadcrumb_per_level() {
  let (_, store) = store();
  let resolver = BreadcrumbResolver::new(&store);

  let district = store.lookup(Level::District, 6).await.unwrap().unwrap();
  assert_eq!(resolver.resolve(&district).await, AncestorChain {
    state_id: Some(1),
    ..AncestorChain::default()
  });

  let block = store.lookup(Level::Block, 20).await.unwrap().unwrap();
  assert_eq!(resolver.resolve(&block).await, AncestorChain {
    state_id: Some(1),
    district_id: Some(6),
    ..AncestorChain::default()
  });

  let cluster = store.lookup(Level::Cluster, 98).await.unwrap().unwrap();
  assert_eq!(resolver.resolve(&cluster).await, AncestorChain {
    state_id: Some(1),
    district_id: Some(5),
    block_id: Some(11),
    cluster_id: None,
  });
}

#[tokio::test]
async fn breadcrumb_degrades_when_district_is_gone() {
  let (backend, store) = store();
  backend.inner.delete(Level::District, 5).await.unwrap();
  let school = school_500(&store).await;

  let crumb = BreadcrumbResolver::new(&store).trace(&school).await;
  assert_eq!(crumb.chain, AncestorChain {
    state_id:    None,
    district_id: None,
    block_id:    Some(10),
    cluster_id:  Some(99),
  });
  let gap = crumb.gap.expect("gap");
  assert_eq!((gap.level, gap.id, gap.cause), (Level::District, 5, GapCause::Missing));
}

#[tokio::test]
async fn breadcrumb_degrades_when_block_is_gone() {
  let (backend, store) = store();
  backend.inner.delete(Level::Block, 10).await.unwrap();
  let school = school_500(&store).await;
  let crumb = BreadcrumbResolver::new(&store).trace(&school).await;
  assert!(crumb.chain.is_empty());
  assert!(!crumb.is_complete());
}

const ORPHANED_SCHOOL: AncestorChain = AncestorChain {
  state_id:    None,
  district_id: None,
  block_id:    Some(10),
  cluster_id:  Some(99),
};

#[tokio::test]
async fn breadcrumb_degrades_after_the_district_list_was_seen() {
  let (backend, store) = store();
  store.list(Level::District, ListFilter::All).await.unwrap();
  backend.inner.delete(Level::District, 5).await.unwrap();
  store.invalidate(Level::District);
  let fresh = store.list(Level::District, ListFilter::All).await.unwrap();
  assert_eq!(ids(&fresh), vec![6, 7]);

  let school = school_500(&store).await;
  let resolved = BreadcrumbResolver::new(&store).resolve(&school).await;
  assert_eq!(resolved, ORPHANED_SCHOOL);
}

#[tokio::test]
async fn breadcrumb_degrades_after_invalidation_alone() {
  let (backend, store) = store();
  store.list(Level::District, ListFilter::All).await.unwrap();
  backend.inner.delete(Level::District, 5).await.unwrap();
  store.invalidate(Level::District);

  let school = school_500(&store).await;
  let resolved = BreadcrumbResolver::new(&store).resolve(&school).await;
  assert_eq!(resolved, ORPHANED_SCHOOL);
}

#[tokio::test]
async fn breadcrumb_degrades_after_children_of_the_state_were_listed() {
  let (backend, store) = store();
  assert_eq!(ids(&store.list_children(Level::District, 1).await.unwrap()), vec![5, 6]);
  backend.inner.delete(Level::District, 5).await.unwrap();
  store.invalidate(Level::District);
  assert_eq!(ids(&store.list_children(Level::District, 1).await.unwrap()), vec![6]);

  let school = school_500(&store).await;
  let crumb = BreadcrumbResolver::new(&store).trace(&school).await;
  assert_eq!(crumb.chain, ORPHANED_SCHOOL);
  let gap = crumb.gap.expect("gap");
  assert_eq!((gap.level, gap.id, gap.cause), (Level::District, 5, GapCause::Missing));

  let form = EntityForm::edit(&store, school, InactiveParentPolicy::Reject).await;
  assert_eq!(form.cascade.phase(), Phase::Empty);
}

#[tokio::test]
async fn breadcrumb_reports_fetch_failures_as_gaps() {
  let (backend, store) = store();
  backend.fail_lists.store(true, Ordering::SeqCst);
  let school = school_500(&store).await;
  let crumb = BreadcrumbResolver::new(&store).trace(&school).await;
  assert!(crumb.chain.is_empty());
  assert!(matches!(crumb.gap.map(|g| g.cause), Some(GapCause::FetchFailed(_))));
}

// ─── EntityLifecycleManager ──────────────────────────────────────────────────

#[tokio::test]
async fn create_requires_the_direct_parent() {
  let (backend, store) = store();
  let m = manager(&store);

  let err = m
    .create(
      Level::Block,
      Attributes::named("Sarjapur"),
      AncestorChain { state_id: Some(1), ..AncestorChain::default() },
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::IncompleteChain { level: Level::Block, missing: "district_id" }));
  assert_eq!(backend.mutations(), 0);

  let block = m
    .create(
      Level::Block,
      Attributes::named("Sarjapur"),
      AncestorChain { state_id: Some(1), district_id: Some(5), ..AncestorChain::default() },
    )
    .await
    .unwrap();
  assert_eq!(block.parent_id(), 5);
}

#[tokio::test]
async fn create_invalidates_only_its_own_level() {
  let (_, store) = store();
  store.list(Level::District, ListFilter::All).await.unwrap();
  store.list(Level::Block, ListFilter::All).await.unwrap();

  manager(&store)
    .create(
      Level::Block,
      Attributes::named("Sarjapur"),
      AncestorChain { district_id: Some(5), ..AncestorChain::default() },
    )
    .await
    .unwrap();
  assert!(!store.is_current(Level::Block));
  assert!(store.is_current(Level::District));
}

#[tokio::test]
async fn cross_linked_cluster_is_rejected_before_any_request() {
  let (backend, store) = store();
  store.list(Level::Cluster, ListFilter::All).await.unwrap();
  let lists = backend.lists();

  let err = manager(&store)
    .update(
      Level::School,
      500,
      Attributes::named("GHPS Anekal"),
      Some(AncestorChain { block_id: Some(10), cluster_id: Some(98), ..AncestorChain::default() }),
    )
    .await
    .unwrap_err();
  match err {
    Error::ValidationFailed(fields) => assert!(fields.get("cluster_id").is_some()),
    other => panic!("unexpected {other:?}"),
  }
  assert_eq!(backend.lists(), lists);
  assert_eq!(backend.mutations(), 0);
}

#[tokio::test]
async fn uncached_cluster_is_checked_against_the_block() {
  let (backend, store) = store();
  let err = manager(&store)
    .create(
      Level::School,
      Attributes::named("GLPS Hoskote"),
      AncestorChain { block_id: Some(11), cluster_id: Some(99), ..AncestorChain::default() },
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ValidationFailed(_)));
  assert_eq!(backend.mutations(), 0);
}

#[tokio::test]
async fn update_without_chain_keeps_the_parent() {
  let (_, store) = store();
  let updated = manager(&store)
    .update(Level::Block, 10, Attributes::named("Anekal Taluk"), None)
    .await
    .unwrap();
  assert_eq!(updated.name(), "Anekal Taluk");
  assert_eq!(updated.parent_id(), 5);
}

#[tokio::test]
async fn toggle_twice_restores_the_original_state() {
  let (_, store) = store();
  let m = manager(&store);
  let once = m.toggle_active(Level::District, 6).await.unwrap();
  assert!(!once.is_active());
  let twice = m.toggle_active(Level::District, 6).await.unwrap();
  assert!(twice.is_active());
  assert_eq!(store.cached(Level::District, 6).map(|d| d.is_active()), Some(true));
}

#[tokio::test]
async fn toggle_does_not_cascade() {
  let (_, store) = store();
  let m = manager(&store);
  m.toggle_active(Level::District, 5).await.unwrap();
  let blocks = store.list_children(Level::Block, 5).await.unwrap();
  assert!(blocks.iter().all(Entity::is_active));
}

#[tokio::test]
async fn toggle_patches_the_last_page_in_place() {
  let (_, store) = store();
  store.list_children(Level::Block, 5).await.unwrap();
  manager(&store).toggle_active(Level::Block, 11).await.unwrap();
  let (_, page) = store.last_page(Level::Block).expect("page");
  assert_eq!(page.iter().find(|b| b.id() == 11).map(Entity::is_active), Some(false));
  assert!(store.is_current(Level::Block));
}

#[tokio::test]
async fn delete_requires_a_matching_confirmation() {
  let (backend, store) = store();
  let m = manager(&store);
  let err = m
    .delete(Level::Block, 11, DeleteConfirmation::new(Level::Block, 10))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ConfirmationMismatch { .. }));
  assert_eq!(backend.mutations(), 0);

  m.delete(Level::Block, 11, DeleteConfirmation::new(Level::Block, 11))
    .await
    .unwrap();
  assert_eq!(backend.inner.len(Level::Block), 2);
}

#[tokio::test]
async fn vanished_record_is_not_found_and_evicted() {
  let (backend, store) = store();
  store.list(Level::Cluster, ListFilter::All).await.unwrap();
  backend.inner.delete(Level::Cluster, 98).await.unwrap();

  let err = manager(&store).toggle_active(Level::Cluster, 98).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { level: Level::Cluster, id: 98 }));
  assert!(store.cached(Level::Cluster, 98).is_none());
}

#[tokio::test]
async fn inactive_parent_is_not_a_target_for_new_children() {
  let (_, store) = store();
  store.list(Level::Block, ListFilter::All).await.unwrap();
  manager(&store).toggle_active(Level::Block, 10).await.unwrap();
  let chain = AncestorChain { block_id: Some(10), ..AncestorChain::default() };

  let err = manager(&store)
    .create(Level::Cluster, Attributes::named("Cluster-9"), chain)
    .await
    .unwrap_err();
  match err {
    Error::ValidationFailed(fields) => assert!(fields.get("block_id").is_some()),
    other => panic!("unexpected {other:?}"),
  }

  let lenient = LifecyclePolicy { inactive_parents: InactiveParentPolicy::Allow };
  EntityLifecycleManager::new(&store, lenient)
    .create(Level::Cluster, Attributes::named("Cluster-9"), chain)
    .await
    .unwrap();

  // Existing children of the inactive block stay editable.
  manager(&store)
    .update(Level::Cluster, 99, Attributes::named("Cluster-7A"), None)
    .await
    .unwrap();
}

#[tokio::test]
async fn inactive_parent_is_rejected_with_a_cold_cache() {
  let (backend, store) = store();
  backend.inner.toggle(Level::District, 5).await.unwrap();

  let err = manager(&store)
    .create(
      Level::Block,
      Attributes::named("Sarjapur"),
      AncestorChain { state_id: Some(1), district_id: Some(5), ..AncestorChain::default() },
    )
    .await
    .unwrap_err();
  match err {
    Error::ValidationFailed(fields) => assert!(fields.get("district_id").is_some()),
    other => panic!("unexpected {other:?}"),
  }
  assert_eq!(backend.mutations(), 0);
}

#[tokio::test]
async fn inactive_cluster_is_rejected_with_a_cold_cache() {
  let (backend, store) = store();
  backend.inner.toggle(Level::Cluster, 99).await.unwrap();

  let err = manager(&store)
    .create(
      Level::School,
      Attributes::named("GPS Rampur"),
      AncestorChain { block_id: Some(10), cluster_id: Some(99), ..AncestorChain::default() },
    )
    .await
    .unwrap_err();
  match err {
    Error::ValidationFailed(fields) => {
      assert!(fields.get("cluster_id").is_some());
      assert!(fields.get("block_id").is_none());
    }
    other => panic!("unexpected {other:?}"),
  }
  assert_eq!(backend.mutations(), 0);
}

#[tokio::test]
async fn selectable_hides_inactive_options() {
  let (_, store) = store();
  manager(&store).toggle_active(Level::Block, 11).await.unwrap();

  let mut strict = CascadeController::new(InactiveParentPolicy::Reject);
  let mut lenient = CascadeController::new(InactiveParentPolicy::Allow);
  for c in [&mut strict, &mut lenient] {
    let t = c.select_state(1);
    c.load(&store, t).await;
    let t = c.select_district(5).unwrap();
    c.load(&store, t).await;
  }
  assert_eq!(strict.options(CascadeLevel::Block).len(), 2);
  assert_eq!(strict.selectable(CascadeLevel::Block).len(), 1);
  assert_eq!(lenient.selectable(CascadeLevel::Block).len(), 2);
}

// ─── Forms ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_school_through_the_cascade() {
  let (_, store) = store();
  let m = manager(&store);
  let mut form = EntityForm::create(Level::School, InactiveParentPolicy::Reject);
  assert_eq!(form.selectors(), vec![
    CascadeLevel::State,
    CascadeLevel::District,
    CascadeLevel::Block,
    CascadeLevel::Cluster,
  ]);

  for (level, id) in [
    (CascadeLevel::State, 1),
    (CascadeLevel::District, 5),
    (CascadeLevel::Block, 10),
    (CascadeLevel::Cluster, 99),
  ] {
    if let Some(t) = form.select(level, id).unwrap() {
      form.cascade.load(&store, t).await;
    }
  }
  form.attrs = Attributes::named("GPS Rampur").with_code("29290104901");
  let school = form.submit(&m).await.unwrap();

  let listed = store.list_children(Level::School, 10).await.unwrap();
  let found = listed
    .iter()
    .filter_map(Entity::as_school)
    .find(|s| s.id == school.id())
    .expect("new school listed");
  assert_eq!(found.name, "GPS Rampur");
  assert_eq!(found.code.as_deref(), Some("29290104901"));
  assert_eq!(found.cluster_id, Some(99));
  assert_eq!(found.teacher_count, 0);
}

#[tokio::test]
async fn edit_form_is_seeded_from_the_breadcrumb() {
  let (_, store) = store();
  let school = school_500(&store).await;
  let form = EntityForm::edit(&store, school, InactiveParentPolicy::Reject).await;

  assert_eq!(form.cascade.phase(), Phase::ClusterSelected);
  assert_eq!(ids(form.cascade.options(CascadeLevel::District)), vec![5, 6]);
  assert_eq!(ids(form.cascade.options(CascadeLevel::Block)), vec![10, 11]);
  assert_eq!(ids(form.cascade.options(CascadeLevel::Cluster)), vec![99]);
  assert_eq!(form.attrs.name, "GHPS Anekal");
  assert_eq!(form.chain_to_submit(), None);
}

#[tokio::test]
async fn edit_form_moves_a_school_to_another_block() {
  let (_, store) = store();
  let m = manager(&store);
  let school = school_500(&store).await;
  let mut form = EntityForm::edit(&store, school, InactiveParentPolicy::Reject).await;

  let t = form.select(CascadeLevel::Block, 11).unwrap().expect("ticket");
  form.cascade.load(&store, t).await;
  assert_eq!(form.cascade.selected(CascadeLevel::Cluster), None);
  form.select(CascadeLevel::Cluster, 98).unwrap();
  assert!(form.reparented());

  let moved = form.submit(&m).await.unwrap();
  let moved = moved.as_school().expect("school");
  assert_eq!((moved.block_id, moved.cluster_id), (11, Some(98)));
}

#[tokio::test]
async fn orphan_stays_editable() {
  let (backend, store) = store();
  backend.inner.delete(Level::District, 5).await.unwrap();
  let m = manager(&store);
  let school = school_500(&store).await;

  let mut form = EntityForm::edit(&store, school, InactiveParentPolicy::Reject).await;
  assert_eq!(form.cascade.phase(), Phase::Empty);
  assert!(form.cascade.options(CascadeLevel::Block).is_empty());

  form.attrs.name = "GHPS Anekal (renamed)".into();
  assert_eq!(form.chain_to_submit(), None);
  let renamed = form.submit(&m).await.unwrap();
  assert_eq!(renamed.name(), "GHPS Anekal (renamed)");
  assert_eq!(renamed.parent_id(), 10);

  let toggled = m.toggle_active(Level::School, 500).await.unwrap();
  assert!(!toggled.is_active());
}
