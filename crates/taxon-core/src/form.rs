//! [`EntityForm`], one create or edit dialog: its attributes plus its own
//! [`CascadeController`].
//!
//! An edit form only exists once the breadcrumb walk has finished (or broken
//! off), so the selector is never observable half-resolved. The pending
//! [`EntityForm::edit`] future is the "resolving ancestors" state.

use crate::{
  Result,
  backend::TaxonomyBackend,
  breadcrumb::{Breadcrumb, BreadcrumbResolver},
  cascade::{CascadeController, FetchTicket},
  entity::{AncestorChain, Attributes, CascadeLevel, Entity, Id, Level},
  lifecycle::EntityLifecycleManager,
  policy::InactiveParentPolicy,
  store::TaxonomyStore,
};

#[derive(Debug, Clone)]
pub enum FormMode {
  Create { level: Level },
  Edit {
    entity:     Entity,
    breadcrumb: Breadcrumb,
    /// The selection the cascade was seeded with.
    seeded:     AncestorChain,
  },
}

#[derive(Debug, Clone)]
pub struct EntityForm {
  mode:        FormMode,
  pub attrs:   Attributes,
  pub cascade: CascadeController,
}

impl EntityForm {
  pub fn create(level: Level, policy: InactiveParentPolicy) -> Self {
    Self {
      mode:    FormMode::Create { level },
      attrs:   Attributes::default(),
      cascade: CascadeController::new(policy),
    }
  }

  /// Resolve `entity`'s ancestors, seed the cascade with them and load the
  /// seeded selectors' options, in that order.
  pub async fn edit<B: TaxonomyBackend>(
    store: &TaxonomyStore<B>,
    entity: Entity,
    policy: InactiveParentPolicy,
  ) -> Self {
    let breadcrumb = BreadcrumbResolver::new(store).trace(&entity).await;
    let (mut cascade, tickets) = CascadeController::seeded(policy, breadcrumb.chain);
    for ticket in tickets {
      cascade.load(store, ticket).await;
    }
    let seeded = cascade.selection();
    Self {
      attrs: Attributes::of(&entity),
      mode: FormMode::Edit { entity, breadcrumb, seeded },
      cascade,
    }
  }

  pub fn mode(&self) -> &FormMode { &self.mode }

  pub fn level(&self) -> Level {
    match &self.mode {
      FormMode::Create { level } => *level,
      FormMode::Edit { entity, .. } => entity.level(),
    }
  }

  /// Selectors this form shows. School forms stop at Cluster, other levels at
  /// their direct parent.
  pub fn selectors(&self) -> Vec<CascadeLevel> {
    let deepest = match self.level() {
      Level::School => CascadeLevel::Cluster,
      level => level.parent(),
    };
    let mut out = Vec::new();
    let mut next = Some(CascadeLevel::State);
    while let Some(l) = next {
      out.push(l);
      if l == deepest {
        break;
      }
      next = l.child();
    }
    out
  }

  pub fn select(&mut self, level: CascadeLevel, id: Id) -> Result<Option<FetchTicket>> {
    self.cascade.select(level, id)
  }

  /// Whether the user moved the record to a different parent.
  pub fn reparented(&self) -> bool {
    match &self.mode {
      FormMode::Create { .. } => false,
      FormMode::Edit { seeded, .. } => *seeded != self.cascade.selection(),
    }
  }

  /// The chain to send: always on create, on edit only when re-parented.
  pub fn chain_to_submit(&self) -> Option<AncestorChain> {
    match &self.mode {
      FormMode::Create { .. } => Some(self.cascade.selection()),
      FormMode::Edit { .. } => self.reparented().then(|| self.cascade.selection()),
    }
  }

  pub async fn submit<B: TaxonomyBackend>(
    &self,
    manager: &EntityLifecycleManager<'_, B>,
  ) -> Result<Entity> {
    match &self.mode {
      FormMode::Create { level } => {
        manager
          .create(*level, self.attrs.clone(), self.cascade.selection())
          .await
      }
      FormMode::Edit { entity, .. } => {
        manager
          .update(entity.level(), entity.id(), self.attrs.clone(), self.chain_to_submit())
          .await
      }
    }
  }
}
