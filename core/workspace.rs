use crate::builder::{build_annotated_tree, build_complete_tree};
use crate::entry::{Entry, EntryHandle, EntryKind, Tree, join_path};
use crate::error::{AppError, Result};
use crate::explain::{InclusionRecord, inclusion_report};
use crate::export::{ExportArtifact, ExportOptions, assemble, collect};
use crate::file_types::FileClassifier;
use crate::filter::apply_filters;
use crate::loader::{self, LoadOutcome, LoadStart, LoadTicket, LoadToken};
use crate::overrides::OverrideSet;
use crate::reader::{DirectoryReader, FileReader};
use crate::rules::{ActiveRules, RuleRegistry};
use crate::selection::update_selection;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// What the directory picker produced.
#[derive(Debug, Clone)]
pub enum RootSelection {
    Chosen {
        name: String,
        handle: EntryHandle,
        kind: EntryKind,
    },
    Cancelled,
}

impl RootSelection {
    pub fn directory(name: impl Into<String>, handle: EntryHandle) -> Self {
        RootSelection::Chosen {
            name: name.into(),
            handle,
            kind: EntryKind::Directory,
        }
    }

    /// Root chosen from a local path. Symlinks are followed.
    pub fn from_local_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|source| AppError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(RootSelection::Chosen {
            name,
            handle: EntryHandle::new(path),
            kind: if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
        })
    }
}

/// Next step of a load started through [`Workspace::begin_load`].
#[derive(Debug)]
pub enum LoadStep {
    /// Read the directory, then hand the children to
    /// [`Workspace::complete_load`].
    Read(LoadTicket),
    Done(LoadOutcome),
}

#[derive(Debug, Default)]
struct State {
    generation: u64,
    root_name: Option<String>,
    tree: Tree,
    active_names: BTreeSet<String>,
    active: ActiveRules,
    overrides: OverrideSet,
    in_flight: HashMap<String, LoadToken>,
    next_token: u64,
}

/// One browsing session over a chosen root.
///
/// Synchronous transitions (toggles, rule changes) are applied under the
/// state lock and are therefore ordered before any later load completion.
/// Loads are merged into whatever tree is current when they finish, and
/// loads started for a previous root are discarded.
pub struct Workspace {
    reader: Arc<dyn DirectoryReader>,
    registry: RuleRegistry,
    state: Mutex<State>,
}

impl Workspace {
    pub fn new(reader: Arc<dyn DirectoryReader>, registry: RuleRegistry) -> Self {
        Self {
            reader,
            registry,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Opens a new root. Returns `Ok(false)` when the picker was cancelled.
    ///
    /// An unsupported root or a failed root read leaves the session as it
    /// was. On success every load still in flight for the old root becomes
    /// stale and the overrides are cleared.
    pub async fn open(&self, selection: RootSelection) -> Result<bool> {
        let (name, handle) = match selection {
            RootSelection::Cancelled => {
                log::debug!("Root selection cancelled");
                return Ok(false);
            }
            RootSelection::Chosen { name, kind, .. } if kind != EntryKind::Directory => {
                return Err(AppError::UnsupportedRoot(name));
            }
            RootSelection::Chosen { name, handle, .. } => (name, handle),
        };

        log::info!("Opening root '{}'", name);
        let raw = self
            .reader
            .read_dir(&handle)
            .await
            .map_err(|source| AppError::DirRead {
                path: name.clone(),
                source,
            })?;
        let entries = raw
            .into_iter()
            .map(|child| Entry::new(join_path("", &child.name), child.kind, child.handle))
            .collect();

        let mut state = self.lock();
        state.generation += 1;
        state.overrides.clear();
        state.in_flight.clear();
        state.tree = apply_filters(&Tree::new(entries), &state.active, &state.overrides);
        state.root_name = Some(name);
        log::debug!(
            "Root opened with {} top-level entries (generation {})",
            state.tree.entries().len(),
            state.generation
        );
        Ok(true)
    }

    pub fn toggle_selection(&self, id: &str, selected: bool) -> Result<()> {
        let mut state = self.lock();
        let tree = update_selection(&state.tree, id, selected)?;
        if let Some(entry) = tree.find(id).cloned() {
            state.overrides.record_toggle(&entry, selected);
        }
        state.tree = tree;
        Ok(())
    }

    /// Replaces the active rule set. Filters are re-applied only when the
    /// set actually changes; returns whether it did.
    pub fn set_active_rules<I, S>(&self, names: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .collect();
        let active = self.registry.activate(names.iter().map(String::as_str))?;

        let mut state = self.lock();
        if state.active_names == names {
            return Ok(false);
        }
        log::info!(
            "Active rules: {}",
            active.names().collect::<Vec<_>>().join(", ")
        );
        state.tree = apply_filters(&state.tree, &active, &state.overrides);
        state.active = active;
        state.active_names = names;
        Ok(true)
    }

    /// Flips one rule. Returns whether it is active afterwards.
    pub fn toggle_rule(&self, name: &str) -> Result<bool> {
        if !self.registry.contains(name) {
            return Err(AppError::UnknownRule(name.to_string()));
        }
        let mut names = self.lock().active_names.clone();
        let enabled = if names.remove(name) {
            false
        } else {
            names.insert(name.to_string());
            true
        };
        self.set_active_rules(names)?;
        Ok(enabled)
    }

    pub fn activate_all_rules(&self) -> Result<bool> {
        let all: Vec<String> = self.registry.names().map(str::to_string).collect();
        self.set_active_rules(all)
    }

    pub fn clear_rules(&self) -> Result<bool> {
        self.set_active_rules(Vec::<String>::new())
    }

    /// Opens or closes a directory, loading it first if needed.
    pub async fn toggle_open(&self, id: &str) -> Result<()> {
        let needs_load = {
            let mut state = self.lock();
            let entry = state.tree.require(id)?;
            if entry.is_dir() && !entry.is_materialized() && !entry.is_open() {
                true
            } else {
                state.tree = state.tree.toggle_open(id)?;
                false
            }
        };
        if needs_load {
            self.load_children(id).await?;
        }
        Ok(())
    }

    pub fn set_all_open(&self, open: bool) {
        let mut state = self.lock();
        state.tree = state.tree.with_all_open(open);
    }

    /// Marks `id` as loading and returns the read to perform, unless it is
    /// already loaded or a load for it is already in flight.
    pub fn begin_load(&self, id: &str) -> Result<LoadStep> {
        let mut state = self.lock();
        if state.in_flight.contains_key(id) {
            log::debug!("Load of {} already in flight", id);
            return Ok(LoadStep::Done(LoadOutcome::AlreadyLoading));
        }
        let token = LoadToken(state.next_token);
        match loader::begin_load(&state.tree, id, state.generation, token)? {
            LoadStart::Started { tree, ticket } => {
                state.next_token += 1;
                state.tree = tree;
                state.in_flight.insert(id.to_string(), token);
                Ok(LoadStep::Read(ticket))
            }
            LoadStart::AlreadyLoading => Ok(LoadStep::Done(LoadOutcome::AlreadyLoading)),
            LoadStart::AlreadyLoaded => Ok(LoadStep::Done(LoadOutcome::AlreadyLoaded)),
        }
    }

    /// Merges a finished read into the current tree. Reads that belong to a
    /// previous root, or whose token is no longer in flight, are dropped.
    pub fn complete_load(&self, ticket: LoadTicket, children: Vec<Entry>) -> Result<LoadOutcome> {
        let mut state = self.lock();
        if ticket.generation != state.generation {
            log::debug!(
                "Discarding load of {} from generation {} (now {})",
                ticket.id,
                ticket.generation,
                state.generation
            );
            return Ok(LoadOutcome::Discarded);
        }
        if state.in_flight.get(&ticket.id) != Some(&ticket.token) {
            log::debug!("Discarding load of {} with stale token", ticket.id);
            return Ok(LoadOutcome::Discarded);
        }
        state.in_flight.remove(&ticket.id);
        state.tree = loader::merge_children(
            &state.tree,
            &ticket.id,
            children,
            &state.active,
            &state.overrides,
        )?;
        Ok(LoadOutcome::Loaded)
    }

    pub async fn load_children(&self, id: &str) -> Result<LoadOutcome> {
        let ticket = match self.begin_load(id)? {
            LoadStep::Read(ticket) => ticket,
            LoadStep::Done(outcome) => return Ok(outcome),
        };
        let children = loader::read_level(self.reader.as_ref(), &ticket.id, &ticket.handle).await;
        self.complete_load(ticket, children)
    }

    /// Loads and opens every ancestor of `id` so that it becomes visible.
    pub async fn reveal(&self, id: &str) -> Result<()> {
        let segments: Vec<&str> = id.split('/').collect();
        for depth in 1..segments.len() {
            let ancestor = segments[..depth].join("/");
            self.load_children(&ancestor).await?;
            self.set_open(&ancestor, true)?;
        }
        self.lock().tree.require(id)?;
        Ok(())
    }

    /// Reveals `id` and applies a checkbox toggle to it.
    pub async fn select_path(&self, id: &str, selected: bool) -> Result<()> {
        self.reveal(id).await?;
        self.toggle_selection(id, selected)
    }

    /// Loads and opens directories down to `depth` levels below the root.
    /// Rule-matched directories without overrides are left closed.
    pub async fn expand_to_depth(&self, depth: usize) -> Result<()> {
        let mut frontier = self.directory_ids(None);
        for _ in 0..depth {
            let mut next = Vec::new();
            for id in frontier {
                self.load_children(&id).await?;
                self.set_open(&id, true)?;
                next.extend(self.directory_ids(Some(&id)));
            }
            frontier = next;
        }
        Ok(())
    }

    fn directory_ids(&self, parent: Option<&str>) -> Vec<String> {
        let state = self.lock();
        let level = match parent {
            None => Some(state.tree.entries()),
            Some(id) => state.tree.find(id).and_then(|e| e.children()),
        };
        level
            .unwrap_or(&[])
            .iter()
            .filter(|e| e.is_dir())
            .filter(|e| {
                !state.active.is_filtered(e.path()) || state.overrides.has_override_under(e.path())
            })
            .map(|e| e.id().to_string())
            .collect()
    }

    fn set_open(&self, id: &str, open: bool) -> Result<()> {
        let mut state = self.lock();
        if state.tree.require(id)?.is_open() != open {
            state.tree = state.tree.toggle_open(id)?;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Tree {
        self.lock().tree.clone()
    }

    pub fn active_rules(&self) -> ActiveRules {
        self.lock().active.clone()
    }

    pub fn active_rule_names(&self) -> Vec<String> {
        self.lock().active.names().map(str::to_string).collect()
    }

    pub fn overrides(&self) -> OverrideSet {
        self.lock().overrides.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn root_name(&self) -> Option<String> {
        self.lock().root_name.clone()
    }

    fn inputs(&self) -> Result<(Tree, ActiveRules, OverrideSet)> {
        let state = self.lock();
        if state.root_name.is_none() {
            return Err(AppError::NoRoot);
        }
        Ok((
            state.tree.clone(),
            state.active.clone(),
            state.overrides.clone(),
        ))
    }

    /// Materializes everything the current selection needs.
    pub async fn complete_tree(&self) -> Result<Tree> {
        let (tree, active, overrides) = self.inputs()?;
        Ok(build_complete_tree(&tree, self.reader.as_ref(), &active, &overrides).await)
    }

    pub async fn export(
        &self,
        files: &dyn FileReader,
        classifier: &FileClassifier,
        options: ExportOptions,
    ) -> Result<ExportArtifact> {
        let complete = self.complete_tree().await?;
        let items = collect(&complete, classifier);
        Ok(assemble(&items, files, options).await)
    }

    pub async fn explain(&self, classifier: &FileClassifier) -> Result<Vec<InclusionRecord>> {
        let (tree, active, overrides) = self.inputs()?;
        let annotated = build_annotated_tree(&tree, self.reader.as_ref(), &active, &overrides).await;
        Ok(inclusion_report(&annotated, &active, &overrides, classifier))
    }
}
