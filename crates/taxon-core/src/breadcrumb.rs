//! [`BreadcrumbResolver`]: recovers an entity's full ancestor chain from the
//! single parent id it stores, so an edit form can be pre-populated.
//!
//! The walk is strictly sequential: each lookup's input is the previous
//! lookup's output. A lookup that misses does not fail the walk; the chain
//! comes back partial and the [`Gap`] says where it broke. Orphans stay
//! editable for their own attributes.
//!
//! Resolution is cancelled by dropping the future.

use tracing::{debug, warn};

use crate::{
  Error,
  backend::TaxonomyBackend,
  entity::{AncestorChain, Entity, Id, Level},
  error::BackendError,
  store::TaxonomyStore,
};

/// Why an upward walk stopped early.
#[derive(Debug, Clone, PartialEq)]
pub enum GapCause {
  /// The parent id refers to a record that no longer exists.
  Missing,
  FetchFailed(BackendError),
}

/// The first ancestor that could not be looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct Gap {
  pub level: Level,
  pub id:    Id,
  pub cause: GapCause,
}

/// The result of a walk: whatever resolved, plus the break point if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Breadcrumb {
  pub chain: AncestorChain,
  pub gap:   Option<Gap>,
}

impl Breadcrumb {
  pub fn is_complete(&self) -> bool { self.gap.is_none() }
}

pub struct BreadcrumbResolver<'a, B> {
  store: &'a TaxonomyStore<B>,
}

impl<'a, B: TaxonomyBackend> BreadcrumbResolver<'a, B> {
  pub fn new(store: &'a TaxonomyStore<B>) -> Self { Self { store } }

  /// The ancestor chain of `entity`, partial if the walk broke.
  pub async fn resolve(&self, entity: &Entity) -> AncestorChain {
    self.trace(entity).await.chain
  }

  /// Like [`resolve`](Self::resolve), but also reports where the walk broke.
  pub async fn trace(&self, entity: &Entity) -> Breadcrumb {
    debug!(level = %entity.level(), id = entity.id(), "resolving ancestors");
    let crumb = match entity {
      Entity::District(d) => Breadcrumb {
        chain: AncestorChain { state_id: Some(d.state_id), ..AncestorChain::default() },
        gap:   None,
      },
      Entity::Block(b) => self.from_district(b.district_id, AncestorChain::default()).await,
      Entity::Cluster(c) => self.from_block(c.block_id, None).await,
      Entity::School(s) => self.from_block(s.block_id, s.cluster_id).await,
    };
    if let Some(gap) = &crumb.gap {
      warn!(
        level = %entity.level(),
        id = entity.id(),
        missing_level = %gap.level,
        missing_id = gap.id,
        cause = ?gap.cause,
        "ancestor chain is partial"
      );
    }
    crumb
  }

  /// Walk from a block upward. `cluster_id` is carried through for schools.
  async fn from_block(&self, block_id: Id, cluster_id: Option<Id>) -> Breadcrumb {
    let block = match self.step(Level::Block, block_id).await {
      Ok(entity) => entity,
      Err(gap) => return Breadcrumb { chain: AncestorChain::default(), gap: Some(gap) },
    };
    let below = AncestorChain {
      block_id: Some(block.id()),
      cluster_id,
      ..AncestorChain::default()
    };
    self.from_district(block.parent_id(), below).await
  }

  /// Look up a district and prepend it (and its state) to `below`.
  async fn from_district(&self, district_id: Id, below: AncestorChain) -> Breadcrumb {
    match self.step(Level::District, district_id).await {
      Ok(district) => Breadcrumb {
        chain: AncestorChain {
          state_id: Some(district.parent_id()),
          district_id: Some(district.id()),
          ..below
        },
        gap:   None,
      },
      Err(gap) => Breadcrumb { chain: below, gap: Some(gap) },
    }
  }

  async fn step(&self, level: Level, id: Id) -> Result<Entity, Gap> {
    match self.store.lookup(level, id).await {
      Ok(Some(entity)) => Ok(entity),
      Ok(None) => Err(Gap { level, id, cause: GapCause::Missing }),
      Err(Error::FetchFailed { source, .. }) => {
        Err(Gap { level, id, cause: GapCause::FetchFailed(source) })
      }
      Err(other) => Err(Gap {
        level,
        id,
        cause: GapCause::FetchFailed(BackendError::Transport(other.to_string())),
      }),
    }
  }
}
