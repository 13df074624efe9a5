//! Subcommands and their execution against a [`TaxonomyStore`].

use std::io::Write;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use taxon_core::{
  Error,
  backend::{StateProvider, TaxonomyBackend},
  breadcrumb::{BreadcrumbResolver, GapCause},
  entity::{AncestorChain, Attributes, CascadeLevel, Entity, Id, Level, ListFilter},
  lifecycle::{DeleteConfirmation, EntityLifecycleManager},
  policy::LifecyclePolicy,
  store::TaxonomyStore,
};

/// Accepts `school` as well as the collection name `schools`.
fn parse_level(raw: &str) -> Result<Level, String> {
  raw
    .parse()
    .ok()
    .or_else(|| Level::from_collection(raw))
    .ok_or_else(|| format!("unknown level `{raw}` (district, block, cluster, school)"))
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List the configured states.
  States,
  /// List records of a level, optionally under one parent.
  List {
    #[arg(value_parser = parse_level)]
    level:    Level,
    /// Id of the direct parent.
    #[arg(long, conflicts_with = "district")]
    parent:   Option<Id>,
    /// Schools only: every school in a district.
    #[arg(long)]
    district: Option<Id>,
  },
  /// Create a record under the given ancestors.
  Create {
    #[arg(value_parser = parse_level)]
    level: Level,
    #[arg(long)]
    name:  String,
    #[command(flatten)]
    leaf:  LeafArgs,
    #[command(flatten)]
    chain: ChainArgs,
  },
  /// Rename, re-code or move a record. Unset fields keep their value.
  Update {
    #[arg(value_parser = parse_level)]
    level: Level,
    id:    Id,
    #[arg(long)]
    name:  Option<String>,
    #[command(flatten)]
    leaf:  LeafArgs,
    /// New ancestors; leave all unset to keep the current parent.
    #[command(flatten)]
    chain: ChainArgs,
  },
  /// Flip a record between active and inactive.
  Toggle {
    #[arg(value_parser = parse_level)]
    level: Level,
    id:    Id,
  },
  /// Permanently delete a record. Its children are left in place.
  Delete {
    #[arg(value_parser = parse_level)]
    level: Level,
    id:    Id,
    /// Confirm the deletion.
    #[arg(long)]
    yes:   bool,
  },
  /// Print the ancestors of a record.
  Resolve {
    #[arg(value_parser = parse_level)]
    level: Level,
    id:    Id,
  },
}

/// School-only attributes.
#[derive(Args, Debug, Default)]
pub struct LeafArgs {
  #[arg(long)]
  code:    Option<String>,
  #[arg(long)]
  address: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ChainArgs {
  #[arg(long)]
  state:    Option<Id>,
  #[arg(long)]
  district: Option<Id>,
  #[arg(long)]
  block:    Option<Id>,
  #[arg(long)]
  cluster:  Option<Id>,
}

impl ChainArgs {
  fn chain(&self) -> AncestorChain {
    AncestorChain {
      state_id:    self.state,
      district_id: self.district,
      block_id:    self.block,
      cluster_id:  self.cluster,
    }
  }
}

impl LeafArgs {
  fn apply(self, mut attrs: Attributes) -> Attributes {
    if let Some(code) = self.code {
      attrs.code = Some(code);
    }
    if let Some(address) = self.address {
      attrs.address = Some(address);
    }
    attrs
  }
}

/// Execute `command`, writing human-readable (or JSON) output to `out`.
pub async fn run<B, W>(
  command: Command,
  store: &TaxonomyStore<B>,
  policy: LifecyclePolicy,
  json: bool,
  out: &mut W,
) -> Result<()>
where
  B: TaxonomyBackend + StateProvider,
  W: Write,
{
  let manager = EntityLifecycleManager::new(store, policy);
  match command {
    Command::States => {
      let states = store.backend().states().await.context("listing states")?;
      if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&states)?)?;
      } else {
        for state in states {
          writeln!(out, "{:>6}  {}", state.id, state.name)?;
        }
      }
    }
    Command::List { level, parent, district } => {
      let filter = match (parent, district) {
        (Some(id), _) => ListFilter::parent(level, id),
        (None, Some(id)) => ListFilter::Under(CascadeLevel::District, id),
        (None, None) => ListFilter::All,
      };
      let rows = store.list(level, filter).await?;
      print_entities(out, &rows, json)?;
    }
    Command::Create { level, name, leaf, chain } => {
      let attrs = leaf.apply(Attributes::named(name));
      let created = manager.create(level, attrs, chain.chain()).await?;
      print_entities(out, std::slice::from_ref(&created), json)?;
    }
    Command::Update { level, id, name, leaf, chain } => {
      let current = require(store, level, id).await?;
      let mut attrs = leaf.apply(Attributes::of(&current));
      if let Some(name) = name {
        attrs.name = name;
      }
      let chain = chain.chain();
      let chain = (!chain.is_empty()).then_some(chain);
      let updated = manager.update(level, id, attrs, chain).await?;
      print_entities(out, std::slice::from_ref(&updated), json)?;
    }
    Command::Toggle { level, id } => {
      let toggled = manager.toggle_active(level, id).await?;
      print_entities(out, std::slice::from_ref(&toggled), json)?;
    }
    Command::Delete { level, id, yes } => {
      if !yes {
        bail!("refusing to delete {level} {id} without --yes");
      }
      manager.delete(level, id, DeleteConfirmation::new(level, id)).await?;
      writeln!(out, "deleted {level} {id}")?;
    }
    Command::Resolve { level, id } => {
      let entity = require(store, level, id).await?;
      let crumb = BreadcrumbResolver::new(store).trace(&entity).await;
      if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&crumb.chain)?)?;
      } else {
        let states = store.backend().states().await.unwrap_or_default();
        let mut level = Some(CascadeLevel::State);
        while let Some(l) = level {
          if let Some(ancestor) = crumb.chain.get(l) {
            let name = match l.as_level() {
              None => states.iter().find(|s| s.id == ancestor).map(|s| s.name.clone()),
              Some(lv) => store
                .lookup(lv, ancestor)
                .await
                .ok()
                .flatten()
                .map(|e| e.name().to_string()),
            };
            writeln!(out, "{l:<9} {ancestor:>6}  {}", name.unwrap_or_default())?;
          }
          level = l.child().filter(|c| c.as_level() != Some(entity.level()));
        }
        writeln!(out, "{:<9} {:>6}  {}", entity.level(), entity.id(), entity.name())?;
      }
      if let Some(gap) = crumb.gap {
        let cause = match gap.cause {
          GapCause::Missing => "no longer exists".to_string(),
          GapCause::FetchFailed(e) => format!("could not be fetched: {e}"),
        };
        tracing::warn!("{} {} {cause}; breadcrumb is partial", gap.level, gap.id);
      }
    }
  }
  Ok(())
}

/// Fetch `id`, failing if the server has no such record.
async fn require<B: TaxonomyBackend>(
  store: &TaxonomyStore<B>,
  level: Level,
  id: Id,
) -> Result<Entity> {
  store
    .lookup(level, id)
    .await?
    .ok_or_else(|| Error::NotFound { level, id }.into())
}

fn print_entities<W: Write>(out: &mut W, rows: &[Entity], json: bool) -> Result<()> {
  if json {
    writeln!(out, "{}", serde_json::to_string_pretty(rows)?)?;
    return Ok(());
  }
  for entity in rows {
    let status = if entity.is_active() { "active" } else { "inactive" };
    let code = entity.as_school().and_then(|s| s.code.as_deref()).unwrap_or("");
    writeln!(
      out,
      "{:>6}  {:<32} {:<8} {}={} {code}",
      entity.id(),
      entity.name(),
      status,
      entity.level().parent_field(),
      entity.parent_id(),
    )?;
  }
  Ok(())
}
