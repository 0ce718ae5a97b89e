use crate::entry::{Entry, EntryHandle, Selection, Tree, join_path};
use crate::error::{AppError, Result};
use crate::overrides::OverrideSet;
use crate::reader::DirectoryReader;
use crate::rules::ActiveRules;
use crate::selection::rederive_directory;
use serde::Serialize;

/// Identifies one in-flight directory read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LoadToken(pub u64);

/// Everything needed to finish a load that was started with [`begin_load`].
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub id: String,
    pub handle: EntryHandle,
    pub generation: u64,
    pub token: LoadToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded,
    AlreadyLoading,
    AlreadyLoaded,
    /// The root changed while the read was in flight.
    Discarded,
}

#[derive(Debug)]
pub enum LoadStart {
    Started { tree: Tree, ticket: LoadTicket },
    AlreadyLoading,
    AlreadyLoaded,
}

/// Marks `id` as loading (and open) and hands out the ticket for its read.
pub fn begin_load(tree: &Tree, id: &str, generation: u64, token: LoadToken) -> Result<LoadStart> {
    let entry = tree.require(id)?;
    if !entry.is_dir() {
        return Err(AppError::NotADirectory(id.to_string()));
    }
    if entry.is_materialized() {
        log::trace!("{} is already loaded", id);
        return Ok(LoadStart::AlreadyLoaded);
    }
    if entry.is_loading_children() {
        log::debug!("{} is already loading, not reading it again", id);
        return Ok(LoadStart::AlreadyLoading);
    }
    let ticket = LoadTicket {
        id: id.to_string(),
        handle: entry.handle().clone(),
        generation,
        token,
    };
    Ok(LoadStart::Started {
        tree: tree.with_loading(id, true)?,
        ticket,
    })
}

/// Reads the immediate children of `parent_id`. New entries are provisionally
/// selected and unmaterialized. A failed read gives an empty level.
pub async fn read_level(
    reader: &dyn DirectoryReader,
    parent_id: &str,
    handle: &EntryHandle,
) -> Vec<Entry> {
    match reader.read_dir(handle).await {
        Ok(raw) => raw
            .into_iter()
            .map(|child| Entry::new(join_path(parent_id, &child.name), child.kind, child.handle))
            .collect(),
        Err(e) => {
            let shown = if parent_id.is_empty() { "<root>" } else { parent_id };
            log::warn!("Failed to read directory {}: {}", shown, e);
            Vec::new()
        }
    }
}

/// Initial selection of a newly discovered child.
pub(crate) fn initial_selection(
    child: &Entry,
    parent: Selection,
    active: &ActiveRules,
    overrides: &OverrideSet,
) -> Selection {
    if overrides.contains(child.id()) {
        return Selection::Selected;
    }
    Selection::from_bool(parent.is_active() && !active.is_filtered(child.path()))
}

/// Materializes `children` under `id` in the current tree, clears the
/// loading flag and re-derives the directory and its ancestors.
pub fn merge_children(
    tree: &Tree,
    id: &str,
    children: Vec<Entry>,
    active: &ActiveRules,
    overrides: &OverrideSet,
) -> Result<Tree> {
    let route = tree
        .route_to(id)
        .ok_or_else(|| AppError::EntryNotFound(id.to_string()))?;
    log::debug!("Merging {} child(ren) into {}", children.len(), id);
    Ok(tree.rewrite_route(
        &route,
        |entry| {
            let mut updated = entry.clone();
            updated.is_loading_children = false;
            if entry.is_materialized() {
                return updated;
            }
            let parent = entry.selection();
            let children = children
                .into_iter()
                .map(|child| {
                    let selection = initial_selection(&child, parent, active, overrides);
                    child.with_selection(selection)
                })
                .collect();
            updated = updated.with_children(children);
            updated.selection = rederive_directory(&updated, active, overrides);
            updated
        },
        |mut ancestor| {
            ancestor.selection = rederive_directory(&ancestor, active, overrides);
            ancestor
        },
    ))
}

/// Loads one directory level in a single step. Does nothing if `id` is
/// already loaded or loading.
pub async fn load_children(
    tree: &Tree,
    id: &str,
    reader: &dyn DirectoryReader,
    active: &ActiveRules,
    overrides: &OverrideSet,
) -> Result<Tree> {
    let (loading, ticket) = match begin_load(tree, id, 0, LoadToken(0))? {
        LoadStart::Started { tree, ticket } => (tree, ticket),
        LoadStart::AlreadyLoading | LoadStart::AlreadyLoaded => return Ok(tree.clone()),
    };
    let children = read_level(reader, &ticket.id, &ticket.handle).await;
    merge_children(&loading, id, children, active, overrides)
}
