//! [`MemoryBackend`]: an in-process [`TaxonomyBackend`].
//!
//! Mirrors the remote store's observed rules: a parent must exist when a
//! record is created or re-parented, a school's cluster must sit under the
//! school's block, school codes are unique, and deletes never cascade (so
//! children of a deleted node are left orphaned).

use std::{
  collections::{BTreeMap, HashMap},
  sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
  backend::{StateProvider, TaxonomyBackend},
  entity::{
    Block, CascadeLevel, Cluster, District, Entity, EntityBody, Id, Level,
    ListFilter, ParentLink, School, State,
  },
  error::{BackendError, FieldErrors},
};

// ─── Fixture ─────────────────────────────────────────────────────────────────

/// Seed data, loaded as-is (orphans included) without validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
  #[serde(default)]
  pub states:    Vec<State>,
  #[serde(default)]
  pub districts: Vec<District>,
  #[serde(default)]
  pub blocks:    Vec<Block>,
  #[serde(default)]
  pub clusters:  Vec<Cluster>,
  #[serde(default)]
  pub schools:   Vec<School>,
}

impl Fixture {
  pub fn from_json(raw: &str) -> serde_json::Result<Self> { serde_json::from_str(raw) }
}

// ─── Backend ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Tables {
  states:  Vec<State>,
  rows:    HashMap<Level, BTreeMap<Id, Entity>>,
  next_id: HashMap<Level, Id>,
}

impl Tables {
  fn table(&self, level: Level) -> Option<&BTreeMap<Id, Entity>> { self.rows.get(&level) }

  fn table_mut(&mut self, level: Level) -> &mut BTreeMap<Id, Entity> {
    self.rows.entry(level).or_default()
  }

  fn get(&self, level: Level, id: Id) -> Option<&Entity> {
    self.table(level).and_then(|t| t.get(&id))
  }

  fn insert(&mut self, entity: Entity) {
    let level = entity.level();
    let id = entity.id();
    let next = self.next_id.entry(level).or_insert(1);
    if *next <= id {
      *next = id + 1;
    }
    self.table_mut(level).insert(id, entity);
  }

  fn allocate(&mut self, level: Level) -> Id {
    let next = self.next_id.entry(level).or_insert(1);
    let id = *next;
    *next += 1;
    id
  }

  /// Checks a parent link against the current rows.
  fn check_parent(&self, level: Level, link: &ParentLink) -> Result<(), FieldErrors> {
    let missing = |field: &str, id: Id| FieldErrors::single(field, format!("{id} does not exist"));
    match (*link, level) {
      (ParentLink::State { state_id }, Level::District) => {
        if !self.states.iter().any(|s| s.id == state_id) {
          return Err(missing("state_id", state_id));
        }
      }
      (ParentLink::District { district_id }, Level::Block) => {
        if self.get(Level::District, district_id).is_none() {
          return Err(missing("district_id", district_id));
        }
      }
      (ParentLink::Block { block_id, cluster_id }, Level::Cluster | Level::School) => {
        if self.get(Level::Block, block_id).is_none() {
          return Err(missing("block_id", block_id));
        }
        if let Some(cluster_id) = cluster_id {
          match self.get(Level::Cluster, cluster_id).and_then(Entity::as_cluster) {
            None => return Err(missing("cluster_id", cluster_id)),
            Some(c) if c.block_id != block_id => {
              return Err(FieldErrors::single(
                "cluster_id",
                format!("cluster {cluster_id} does not belong to block {block_id}"),
              ));
            }
            Some(_) => {}
          }
        }
      }
      _ => {
        return Err(FieldErrors::single(
          level.parent_field(),
          format!("a {level} must reference a {}", level.parent()),
        ));
      }
    }
    Ok(())
  }

  fn check_body(
    &self,
    level: Level,
    body: &EntityBody,
    updating: Option<Id>,
  ) -> Result<(), BackendError> {
    let mut errors = FieldErrors::new();
    if body.name.trim().is_empty() {
      errors.insert("name", "must not be blank");
    }
    if level != Level::School {
      if body.code.is_some() {
        errors.insert("code", format!("not applicable to a {level}"));
      }
      if body.address.is_some() {
        errors.insert("address", format!("not applicable to a {level}"));
      }
    }
    if let Some(code) = body.code.as_deref() {
      let taken = self
        .table(Level::School)
        .into_iter()
        .flat_map(|t| t.values())
        .filter_map(Entity::as_school)
        .any(|s| Some(s.id) != updating && s.code.as_deref() == Some(code));
      if taken {
        errors.insert("code", format!("school code {code} is already in use"));
      }
    }
    if let Some(link) = &body.parent
      && let Err(parent_errors) = self.check_parent(level, link)
    {
      for (field, message) in parent_errors.iter() {
        errors.insert(field, message);
      }
    }
    if errors.is_empty() { Ok(()) } else { Err(BackendError::Validation(errors)) }
  }

  fn matches(&self, entity: &Entity, filter: ListFilter) -> bool {
    let (by, id) = match filter {
      ListFilter::All => return true,
      ListFilter::Under(by, id) => (by, id),
    };
    match (entity, by) {
      (Entity::School(s), CascadeLevel::Cluster) => s.cluster_id == Some(id),
      (Entity::School(s), CascadeLevel::District) => self
        .get(Level::Block, s.block_id)
        .is_some_and(|b| b.parent_id() == id),
      (e, by) => e.level().parent() == by && e.parent_id() == id,
    }
  }
}

/// An in-memory taxonomy store. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
  tables: Mutex<Tables>,
}

impl MemoryBackend {
  /// An empty store that knows the given states.
  pub fn new(states: Vec<State>) -> Self {
    Self {
      tables: Mutex::new(Tables { states, ..Tables::default() }),
    }
  }

  pub fn from_fixture(fixture: Fixture) -> Self {
    let backend = Self::new(fixture.states);
    {
      let mut tables = backend.lock();
      let rows = fixture
        .districts
        .into_iter()
        .map(Entity::District)
        .chain(fixture.blocks.into_iter().map(Entity::Block))
        .chain(fixture.clusters.into_iter().map(Entity::Cluster))
        .chain(fixture.schools.into_iter().map(Entity::School));
      for entity in rows {
        tables.insert(entity);
      }
    }
    backend
  }

  /// Insert or replace a record verbatim.
  pub fn insert(&self, entity: Entity) { self.lock().insert(entity); }

  /// Number of records currently stored at `level`.
  pub fn len(&self, level: Level) -> usize {
    self.lock().table(level).map_or(0, BTreeMap::len)
  }

  pub fn is_empty(&self) -> bool { Level::iter().all(|level| self.len(level) == 0) }

  fn lock(&self) -> MutexGuard<'_, Tables> {
    self.tables.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

fn build(level: Level, id: Id, body: EntityBody, link: ParentLink) -> Entity {
  let now = Some(Utc::now());
  match (level, link) {
    (Level::District, link) => Entity::District(District {
      id,
      name: body.name,
      state_id: link.parent_id(),
      is_active: true,
      created_at: now,
      updated_at: now,
    }),
    (Level::Block, link) => Entity::Block(Block {
      id,
      name: body.name,
      district_id: link.parent_id(),
      is_active: true,
      created_at: now,
      updated_at: now,
    }),
    (Level::Cluster, link) => Entity::Cluster(Cluster {
      id,
      name: body.name,
      block_id: link.parent_id(),
      is_active: true,
      created_at: now,
      updated_at: now,
    }),
    (Level::School, link) => Entity::School(School {
      id,
      name: body.name,
      code: body.code,
      address: body.address,
      block_id: link.parent_id(),
      cluster_id: match link {
        ParentLink::Block { cluster_id, .. } => cluster_id,
        _ => None,
      },
      is_active: true,
      teacher_count: 0,
      student_count: 0,
      created_at: now,
      updated_at: now,
    }),
  }
}

fn apply(entity: &mut Entity, body: EntityBody) {
  let now = Some(Utc::now());
  match entity {
    Entity::District(d) => {
      d.name = body.name;
      if let Some(link) = body.parent {
        d.state_id = link.parent_id();
      }
      d.updated_at = now;
    }
    Entity::Block(b) => {
      b.name = body.name;
      if let Some(link) = body.parent {
        b.district_id = link.parent_id();
      }
      b.updated_at = now;
    }
    Entity::Cluster(c) => {
      c.name = body.name;
      if let Some(link) = body.parent {
        c.block_id = link.parent_id();
      }
      c.updated_at = now;
    }
    Entity::School(s) => {
      s.name = body.name;
      s.code = body.code;
      s.address = body.address;
      if let Some(ParentLink::Block { block_id, cluster_id }) = body.parent {
        s.block_id = block_id;
        s.cluster_id = cluster_id;
      }
      s.updated_at = now;
    }
  }
}

impl TaxonomyBackend for MemoryBackend {
  async fn list(&self, level: Level, filter: ListFilter) -> Result<Vec<Entity>, BackendError> {
    if let ListFilter::Under(by, _) = filter
      && !level.accepts_filter(by)
    {
      return Err(BackendError::Validation(FieldErrors::single(
        by.id_field(),
        format!("cannot filter {} by {by}", level.collection()),
      )));
    }
    let tables = self.lock();
    Ok(
      tables
        .table(level)
        .into_iter()
        .flat_map(|t| t.values())
        .filter(|e| tables.matches(e, filter))
        .cloned()
        .collect(),
    )
  }

  async fn create(&self, level: Level, body: EntityBody) -> Result<Entity, BackendError> {
    let mut tables = self.lock();
    let Some(link) = body.parent else {
      return Err(BackendError::Validation(FieldErrors::single(
        level.parent_field(),
        "is required",
      )));
    };
    tables.check_body(level, &body, None)?;
    let id = tables.allocate(level);
    let entity = build(level, id, body, link);
    tables.insert(entity.clone());
    Ok(entity)
  }

  async fn update(&self, level: Level, id: Id, body: EntityBody) -> Result<Entity, BackendError> {
    let mut tables = self.lock();
    if tables.get(level, id).is_none() {
      return Err(BackendError::NotFound { level, id });
    }
    tables.check_body(level, &body, Some(id))?;
    let entity = tables
      .table_mut(level)
      .get_mut(&id)
      .ok_or(BackendError::NotFound { level, id })?;
    apply(entity, body);
    Ok(entity.clone())
  }

  async fn toggle(&self, level: Level, id: Id) -> Result<Entity, BackendError> {
    let mut tables = self.lock();
    let entity = tables
      .table_mut(level)
      .get_mut(&id)
      .ok_or(BackendError::NotFound { level, id })?;
    let flipped = !entity.is_active();
    entity.set_active(flipped);
    Ok(entity.clone())
  }

  async fn delete(&self, level: Level, id: Id) -> Result<(), BackendError> {
    self
      .lock()
      .table_mut(level)
      .remove(&id)
      .map(|_| ())
      .ok_or(BackendError::NotFound { level, id })
  }
}

impl StateProvider for MemoryBackend {
  async fn states(&self) -> Result<Vec<State>, BackendError> { Ok(self.lock().states.clone()) }
}
