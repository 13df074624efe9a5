//! Entity types for the administrative taxonomy.
//!
//! The tree is rooted under an externally owned [`State`] list:
//! District → Block → Cluster, with School hanging off a Block (and optionally
//! a Cluster of that same Block). No tree links are trusted beyond each
//! entity's own parent id field(s).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{Error, Result, error::FieldErrors};

/// Primary key of every taxonomy record.
pub type Id = i64;

fn active() -> bool { true }

// ─── Levels ──────────────────────────────────────────────────────────────────

/// The four entity kinds managed by this crate.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Level {
  District,
  Block,
  Cluster,
  School,
}

impl Level {
  /// REST collection segment, e.g. `districts` in `/config/districts`.
  pub fn collection(self) -> &'static str {
    match self {
      Self::District => "districts",
      Self::Block => "blocks",
      Self::Cluster => "clusters",
      Self::School => "schools",
    }
  }

  pub fn from_collection(segment: &str) -> Option<Self> {
    match segment {
      "districts" => Some(Self::District),
      "blocks" => Some(Self::Block),
      "clusters" => Some(Self::Cluster),
      "schools" => Some(Self::School),
      _ => None,
    }
  }

  /// The level exactly above this one.
  pub fn parent(self) -> CascadeLevel {
    match self {
      Self::District => CascadeLevel::State,
      Self::Block => CascadeLevel::District,
      Self::Cluster | Self::School => CascadeLevel::Block,
    }
  }

  /// Name of the required parent id field.
  pub fn parent_field(self) -> &'static str { self.parent().id_field() }

  /// Whether a list of this level may be filtered by an ancestor at `by`.
  pub fn accepts_filter(self, by: CascadeLevel) -> bool {
    match self {
      Self::School => matches!(
        by,
        CascadeLevel::District | CascadeLevel::Block | CascadeLevel::Cluster
      ),
      level => level.parent() == by,
    }
  }
}

/// Levels of the cascading selector, ordered root first.
///
/// School is a leaf: it consumes Block and optionally Cluster, but is never
/// itself a selection.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CascadeLevel {
  State,
  District,
  Block,
  Cluster,
}

impl CascadeLevel {
  pub fn id_field(self) -> &'static str {
    match self {
      Self::State => "state_id",
      Self::District => "district_id",
      Self::Block => "block_id",
      Self::Cluster => "cluster_id",
    }
  }

  /// The entity level backing this selector; `None` for the external State.
  pub fn as_level(self) -> Option<Level> {
    match self {
      Self::State => None,
      Self::District => Some(Level::District),
      Self::Block => Some(Level::Block),
      Self::Cluster => Some(Level::Cluster),
    }
  }

  /// The selector directly below this one.
  pub fn child(self) -> Option<CascadeLevel> {
    match self {
      Self::State => Some(Self::District),
      Self::District => Some(Self::Block),
      Self::Block => Some(Self::Cluster),
      Self::Cluster => None,
    }
  }

  /// The selector directly above this one.
  pub fn parent(self) -> Option<CascadeLevel> {
    match self {
      Self::State => None,
      Self::District => Some(Self::State),
      Self::Block => Some(Self::District),
      Self::Cluster => Some(Self::Block),
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// An entry of the external State master list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
  pub id:   Id,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
  pub id:         Id,
  pub name:       String,
  pub state_id:   Id,
  #[serde(default = "active")]
  pub is_active:  bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
  pub id:          Id,
  pub name:        String,
  pub district_id: Id,
  #[serde(default = "active")]
  pub is_active:   bool,
  #[serde(default)]
  pub created_at:  Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at:  Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
  pub id:         Id,
  pub name:       String,
  pub block_id:   Id,
  #[serde(default = "active")]
  pub is_active:  bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
  pub id:            Id,
  pub name:          String,
  #[serde(default)]
  pub code:          Option<String>,
  #[serde(default)]
  pub address:       Option<String>,
  pub block_id:      Id,
  /// Must sit under `block_id` when present.
  #[serde(default)]
  pub cluster_id:    Option<Id>,
  #[serde(default = "active")]
  pub is_active:     bool,
  /// Server-computed; never sent on create/update.
  #[serde(default)]
  pub teacher_count: u32,
  /// Server-computed; never sent on create/update.
  #[serde(default)]
  pub student_count: u32,
  #[serde(default)]
  pub created_at:    Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at:    Option<DateTime<Utc>>,
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// Any record of the four managed levels.
///
/// Serialises as the bare inner record. Decoding needs the level, which is
/// always known from the collection being read, see [`Entity::decode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
  District(District),
  Block(Block),
  Cluster(Cluster),
  School(School),
}

impl Entity {
  /// Decode a JSON record known to belong to `level`.
  pub fn decode(level: Level, value: serde_json::Value) -> serde_json::Result<Self> {
    Ok(match level {
      Level::District => Self::District(serde_json::from_value(value)?),
      Level::Block => Self::Block(serde_json::from_value(value)?),
      Level::Cluster => Self::Cluster(serde_json::from_value(value)?),
      Level::School => Self::School(serde_json::from_value(value)?),
    })
  }

  pub fn level(&self) -> Level {
    match self {
      Self::District(_) => Level::District,
      Self::Block(_) => Level::Block,
      Self::Cluster(_) => Level::Cluster,
      Self::School(_) => Level::School,
    }
  }

  pub fn id(&self) -> Id {
    match self {
      Self::District(d) => d.id,
      Self::Block(b) => b.id,
      Self::Cluster(c) => c.id,
      Self::School(s) => s.id,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::District(d) => &d.name,
      Self::Block(b) => &b.name,
      Self::Cluster(c) => &c.name,
      Self::School(s) => &s.name,
    }
  }

  pub fn is_active(&self) -> bool {
    match self {
      Self::District(d) => d.is_active,
      Self::Block(b) => b.is_active,
      Self::Cluster(c) => c.is_active,
      Self::School(s) => s.is_active,
    }
  }

  pub fn set_active(&mut self, active: bool) {
    match self {
      Self::District(d) => d.is_active = active,
      Self::Block(b) => b.is_active = active,
      Self::Cluster(c) => c.is_active = active,
      Self::School(s) => s.is_active = active,
    }
  }

  /// The direct parent id (`state_id`, `district_id` or `block_id`).
  pub fn parent_id(&self) -> Id {
    match self {
      Self::District(d) => d.state_id,
      Self::Block(b) => b.district_id,
      Self::Cluster(c) => c.block_id,
      Self::School(s) => s.block_id,
    }
  }

  /// The stored parent reference(s) in wire form.
  pub fn parent_link(&self) -> ParentLink {
    match self {
      Self::District(d) => ParentLink::State { state_id: d.state_id },
      Self::Block(b) => ParentLink::District { district_id: b.district_id },
      Self::Cluster(c) => ParentLink::Block { block_id: c.block_id, cluster_id: None },
      Self::School(s) => ParentLink::Block {
        block_id:   s.block_id,
        cluster_id: s.cluster_id,
      },
    }
  }

  pub fn as_district(&self) -> Option<&District> {
    if let Self::District(d) = self { Some(d) } else { None }
  }

  pub fn as_block(&self) -> Option<&Block> {
    if let Self::Block(b) = self { Some(b) } else { None }
  }

  pub fn as_cluster(&self) -> Option<&Cluster> {
    if let Self::Cluster(c) = self { Some(c) } else { None }
  }

  pub fn as_school(&self) -> Option<&School> {
    if let Self::School(s) = self { Some(s) } else { None }
  }
}

// ─── Wire bodies ─────────────────────────────────────────────────────────────

/// Parent reference(s) carried by a create/update body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentLink {
  State { state_id: Id },
  District { district_id: Id },
  Block {
    block_id:   Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cluster_id: Option<Id>,
  },
}

impl ParentLink {
  /// Whether this link has the shape `level` requires.
  pub fn fits(&self, level: Level) -> bool {
    match (self, level) {
      (Self::State { .. }, Level::District) | (Self::District { .. }, Level::Block) => true,
      (Self::Block { cluster_id, .. }, Level::Cluster) => cluster_id.is_none(),
      (Self::Block { .. }, Level::School) => true,
      _ => false,
    }
  }

  pub fn parent_id(&self) -> Id {
    match *self {
      Self::State { state_id } => state_id,
      Self::District { district_id } => district_id,
      Self::Block { block_id, .. } => block_id,
    }
  }
}

/// Body of `POST /config/{L}s` and `PUT /config/{L}s/{id}`.
///
/// On `PUT`, an absent `parent` leaves the stored parent untouched; a present
/// one replaces the whole link (so a school without `cluster_id` leaves its
/// cluster).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBody {
  pub name:    String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,
  #[serde(flatten)]
  pub parent:  Option<ParentLink>,
}

impl EntityBody {
  pub fn new(attrs: Attributes, parent: Option<ParentLink>) -> Self {
    Self {
      name: attrs.name,
      code: attrs.code,
      address: attrs.address,
      parent,
    }
  }
}

// ─── Attributes ──────────────────────────────────────────────────────────────

/// Caller-editable leaf attributes. Parent references travel separately in an
/// [`AncestorChain`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
  pub name:    String,
  /// School only.
  pub code:    Option<String>,
  /// School only.
  pub address: Option<String>,
}

impl Attributes {
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Self::default() }
  }

  pub fn with_code(mut self, code: impl Into<String>) -> Self {
    self.code = Some(code.into());
    self
  }

  pub fn with_address(mut self, address: impl Into<String>) -> Self {
    self.address = Some(address.into());
    self
  }

  /// Attributes of an existing record, for pre-filling an edit form.
  pub fn of(entity: &Entity) -> Self {
    match entity {
      Entity::School(s) => Self {
        name:    s.name.clone(),
        code:    s.code.clone(),
        address: s.address.clone(),
      },
      other => Self::named(other.name()),
    }
  }

  /// Local checks that need no round trip.
  pub fn validate(&self, level: Level) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if self.name.trim().is_empty() {
      errors.insert("name", "must not be blank");
    }
    if level != Level::School {
      if self.code.is_some() {
        errors.insert("code", format!("not applicable to a {level}"));
      }
      if self.address.is_some() {
        errors.insert("address", format!("not applicable to a {level}"));
      }
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
  }
}

// ─── Ancestor chain ──────────────────────────────────────────────────────────

/// The ordered tuple of parent ids identifying a node's position in the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorChain {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub state_id:    Option<Id>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub district_id: Option<Id>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub block_id:    Option<Id>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cluster_id:  Option<Id>,
}

impl AncestorChain {
  pub fn get(&self, level: CascadeLevel) -> Option<Id> {
    match level {
      CascadeLevel::State => self.state_id,
      CascadeLevel::District => self.district_id,
      CascadeLevel::Block => self.block_id,
      CascadeLevel::Cluster => self.cluster_id,
    }
  }

  pub fn set(&mut self, level: CascadeLevel, id: Option<Id>) {
    match level {
      CascadeLevel::State => self.state_id = id,
      CascadeLevel::District => self.district_id = id,
      CascadeLevel::Block => self.block_id = id,
      CascadeLevel::Cluster => self.cluster_id = id,
    }
  }

  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// The longest consecutive run of set ids starting from the State.
  pub fn prefix(&self) -> AncestorChain {
    let mut out = AncestorChain::default();
    let mut level = Some(CascadeLevel::State);
    while let Some(l) = level {
      match self.get(l) {
        Some(id) => out.set(l, Some(id)),
        None => break,
      }
      level = l.child();
    }
    out
  }

  /// Build the parent link for a record of `level`, failing with
  /// [`Error::IncompleteChain`] when the required ancestor is missing.
  pub fn parent_link(&self, level: Level) -> Result<ParentLink> {
    let missing = || Error::IncompleteChain { level, missing: level.parent_field() };
    Ok(match level {
      Level::District => ParentLink::State { state_id: self.state_id.ok_or_else(missing)? },
      Level::Block => ParentLink::District {
        district_id: self.district_id.ok_or_else(missing)?,
      },
      Level::Cluster => ParentLink::Block {
        block_id:   self.block_id.ok_or_else(missing)?,
        cluster_id: None,
      },
      Level::School => ParentLink::Block {
        block_id:   self.block_id.ok_or_else(missing)?,
        cluster_id: self.cluster_id,
      },
    })
  }
}

// ─── List filter ─────────────────────────────────────────────────────────────

/// Restricts a list read to the children of one ancestor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ListFilter {
  #[default]
  All,
  Under(CascadeLevel, Id),
}

impl ListFilter {
  /// Children of `id` at the level immediately above `level`.
  pub fn parent(level: Level, id: Id) -> Self { Self::Under(level.parent(), id) }

  /// `(field, id)` query pair, if any.
  pub fn query_pair(&self) -> Option<(&'static str, Id)> {
    match *self {
      Self::All => None,
      Self::Under(by, id) => Some((by.id_field(), id)),
    }
  }
}
