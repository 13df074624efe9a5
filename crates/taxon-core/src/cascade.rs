//! [`CascadeController`]: the dependent State → District → Block → Cluster
//! selector behind create and edit forms.
//!
//! Transitions are synchronous: they update the selection, clear every
//! descendant selection together with its option list, and hand back a
//! [`FetchTicket`] for the next level's options. The caller runs the ticket
//! (possibly overlapping with other tickets) and feeds the outcome back via
//! [`CascadeController::settle`]. Each ticket carries a sequence number; an
//! outcome whose ticket is no longer the latest for its level is discarded,
//! so a slow response can never repopulate a selector that now belongs to a
//! different ancestor.
//!
//! One controller belongs to one form. There is no shared selection state.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{
  Error, Result,
  backend::{StateProvider, TaxonomyBackend},
  entity::{AncestorChain, CascadeLevel, Entity, Id, ListFilter, State},
  error::BackendError,
  policy::InactiveParentPolicy,
  store::TaxonomyStore,
};

// ─── Tickets ─────────────────────────────────────────────────────────────────

/// A pending option fetch for one selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a ticket does nothing until it is run and settled"]
pub struct FetchTicket {
  /// The selector whose options this fetch fills.
  pub level:  CascadeLevel,
  pub parent: Id,
  pub seq:    u64,
}

impl FetchTicket {
  pub fn filter(&self) -> ListFilter {
    match self.level.parent() {
      Some(by) => ListFilter::Under(by, self.parent),
      None => ListFilter::All,
    }
  }

  /// Perform the fetch. The outcome must be handed to
  /// [`CascadeController::settle`].
  pub async fn run<B: TaxonomyBackend>(self, store: &TaxonomyStore<B>) -> FetchOutcome {
    let result = match self.level.as_level() {
      Some(level) => store.list(level, self.filter()).await,
      None => Ok(Vec::new()),
    };
    FetchOutcome { ticket: self, result }
  }
}

#[derive(Debug)]
pub struct FetchOutcome {
  pub ticket: FetchTicket,
  pub result: Result<Vec<Entity>>,
}

// ─── Option lists ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OptionStatus {
  Loading,
  Ready,
  /// The fetch failed; the list stays empty and the parent selection stays
  /// valid.
  Failed(BackendError),
}

#[derive(Debug, Clone)]
struct OptionList {
  seq:     u64,
  status:  OptionStatus,
  entries: Vec<Entity>,
}

// ─── Phase ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Empty,
  StateSelected,
  DistrictSelected,
  BlockSelected,
  ClusterSelected,
}

// ─── Controller ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CascadeController {
  policy:    InactiveParentPolicy,
  selection: AncestorChain,
  states:    Vec<State>,
  options:   HashMap<CascadeLevel, OptionList>,
  next_seq:  u64,
}

impl CascadeController {
  pub fn new(policy: InactiveParentPolicy) -> Self {
    Self { policy, ..Self::default() }
  }

  /// A controller pre-selected with the longest consecutive top-down prefix
  /// of `chain`, plus the tickets that load each seeded selector's children.
  pub fn seeded(
    policy: InactiveParentPolicy,
    chain: AncestorChain,
  ) -> (Self, Vec<FetchTicket>) {
    let mut controller = Self::new(policy);
    let mut tickets = Vec::new();
    let mut level = Some(CascadeLevel::State);
    let prefix = chain.prefix();
    while let Some(l) = level
      && let Some(id) = prefix.get(l)
    {
      // Ancestors are set in order, so no transition can fail here.
      if let Ok(Some(ticket)) = controller.select(l, id) {
        tickets.push(ticket);
      }
      level = l.child();
    }
    (controller, tickets)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub fn selection(&self) -> AncestorChain { self.selection }

  pub fn selected(&self, level: CascadeLevel) -> Option<Id> { self.selection.get(level) }

  pub fn phase(&self) -> Phase {
    let s = &self.selection;
    match (s.state_id, s.district_id, s.block_id, s.cluster_id) {
      (None, ..) => Phase::Empty,
      (Some(_), None, ..) => Phase::StateSelected,
      (Some(_), Some(_), None, _) => Phase::DistrictSelected,
      (Some(_), Some(_), Some(_), None) => Phase::BlockSelected,
      (Some(_), Some(_), Some(_), Some(_)) => Phase::ClusterSelected,
    }
  }

  pub fn states(&self) -> &[State] { &self.states }

  /// Every fetched option for `level`, inactive ones included.
  pub fn options(&self, level: CascadeLevel) -> &[Entity] {
    self.options.get(&level).map_or(&[], |o| o.entries.as_slice())
  }

  /// The options a *new* child may be attached to under the current policy.
  pub fn selectable(&self, level: CascadeLevel) -> Vec<&Entity> {
    self
      .options(level)
      .iter()
      .filter(|e| self.policy.admits(e))
      .collect()
  }

  pub fn status(&self, level: CascadeLevel) -> Option<&OptionStatus> {
    self.options.get(&level).map(|o| &o.status)
  }

  pub fn is_loading(&self, level: CascadeLevel) -> bool {
    matches!(self.status(level), Some(OptionStatus::Loading))
  }

  pub fn loading_districts(&self) -> bool { self.is_loading(CascadeLevel::District) }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Fill the root selector from the external State list.
  pub async fn load_states<P: StateProvider>(&mut self, provider: &P) -> Result<()> {
    self.states = provider.states().await.map_err(Error::StatesUnavailable)?;
    Ok(())
  }

  pub fn select_state(&mut self, id: Id) -> FetchTicket {
    self.clear_below(CascadeLevel::State);
    self.selection.state_id = Some(id);
    self.issue(CascadeLevel::District, id)
  }

  pub fn select_district(&mut self, id: Id) -> Result<FetchTicket> {
    self.require(CascadeLevel::District)?;
    self.clear_below(CascadeLevel::District);
    self.selection.district_id = Some(id);
    Ok(self.issue(CascadeLevel::Block, id))
  }

  pub fn select_block(&mut self, id: Id) -> Result<FetchTicket> {
    self.require(CascadeLevel::Block)?;
    self.clear_below(CascadeLevel::Block);
    self.selection.block_id = Some(id);
    Ok(self.issue(CascadeLevel::Cluster, id))
  }

  pub fn select_cluster(&mut self, id: Id) -> Result<()> {
    self.require(CascadeLevel::Cluster)?;
    self.selection.cluster_id = Some(id);
    Ok(())
  }

  /// Level-generic form of the `select_*` transitions.
  pub fn select(&mut self, level: CascadeLevel, id: Id) -> Result<Option<FetchTicket>> {
    match level {
      CascadeLevel::State => Ok(Some(self.select_state(id))),
      CascadeLevel::District => self.select_district(id).map(Some),
      CascadeLevel::Block => self.select_block(id).map(Some),
      CascadeLevel::Cluster => self.select_cluster(id).map(|()| None),
    }
  }

  /// Reset `level` and everything below it to the unselected state. The
  /// options for `level` itself stay, since its parent is unchanged.
  pub fn clear(&mut self, level: CascadeLevel) {
    self.clear_below(level);
    self.selection.set(level, None);
  }

  /// Apply a fetch outcome. Returns `false` when it was stale and discarded.
  pub fn settle(&mut self, outcome: FetchOutcome) -> bool {
    let FetchOutcome { ticket, result } = outcome;
    let Some(list) = self.options.get_mut(&ticket.level) else {
      warn!(level = %ticket.level, seq = ticket.seq, "discarding options for a cleared selector");
      return false;
    };
    if list.seq != ticket.seq {
      warn!(
        level = %ticket.level,
        seq = ticket.seq,
        latest = list.seq,
        "discarding stale options"
      );
      return false;
    }
    match result {
      Ok(entries) => {
        debug!(level = %ticket.level, count = entries.len(), "options loaded");
        list.entries = entries;
        list.status = OptionStatus::Ready;
      }
      Err(err) => {
        warn!(level = %ticket.level, error = %err, "options fetch failed");
        list.entries.clear();
        list.status = OptionStatus::Failed(match err {
          Error::FetchFailed { source, .. } => source,
          other => BackendError::Transport(other.to_string()),
        });
      }
    }
    true
  }

  /// Run `ticket` against `store` and settle it immediately.
  pub async fn load<B: TaxonomyBackend>(
    &mut self,
    store: &TaxonomyStore<B>,
    ticket: FetchTicket,
  ) -> bool {
    let outcome = ticket.run(store).await;
    self.settle(outcome)
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  fn require(&self, level: CascadeLevel) -> Result<()> {
    match level.parent() {
      Some(parent) if self.selection.get(parent).is_none() => {
        Err(Error::InvalidTransition { attempted: level, missing: parent })
      }
      _ => Ok(()),
    }
  }

  /// Clear every selection and option list strictly below `level`.
  fn clear_below(&mut self, level: CascadeLevel) {
    let mut next = level.child();
    while let Some(l) = next {
      self.selection.set(l, None);
      self.options.remove(&l);
      next = l.child();
    }
  }

  fn issue(&mut self, level: CascadeLevel, parent: Id) -> FetchTicket {
    self.next_seq += 1;
    let seq = self.next_seq;
    self.options.insert(level, OptionList {
      seq,
      status: OptionStatus::Loading,
      entries: Vec::new(),
    });
    debug!(%level, parent, seq, "options requested");
    FetchTicket { level, parent, seq }
  }
}
