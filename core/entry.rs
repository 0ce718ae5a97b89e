use crate::error::{AppError, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// Checkbox state of an entry.
///
/// `Indeterminate { retained: true }` means the entry still carries a
/// selection intent that cannot be confirmed right now, either because its
/// subtree is unexplored or because every visible child is filtered out.
/// `Indeterminate { retained: false }` is the plain "some but not all" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum Selection {
    Selected,
    Deselected,
    Indeterminate { retained: bool },
}

impl Selection {
    pub const PARTIAL: Selection = Selection::Indeterminate { retained: false };
    pub const RETAINED: Selection = Selection::Indeterminate { retained: true };

    pub fn from_bool(selected: bool) -> Self {
        if selected {
            Selection::Selected
        } else {
            Selection::Deselected
        }
    }

    /// The remembered "checked" intent of the entry.
    pub fn is_selected(self) -> bool {
        matches!(
            self,
            Selection::Selected | Selection::Indeterminate { retained: true }
        )
    }

    pub fn is_indeterminate(self) -> bool {
        matches!(self, Selection::Indeterminate { .. })
    }

    pub fn is_fully_selected(self) -> bool {
        self == Selection::Selected
    }

    /// Selected or indeterminate: the entry may contribute to an export.
    pub fn is_active(self) -> bool {
        self != Selection::Deselected
    }
}

/// Opaque capability pointing at the resource behind an entry.
///
/// Handles are only ever passed back to a reader; they are deliberately not
/// comparable.
#[derive(Clone)]
pub struct EntryHandle {
    location: Arc<PathBuf>,
}

impl EntryHandle {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: Arc::new(location.into()),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl fmt::Debug for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryHandle")
            .field(&self.location.display())
            .finish()
    }
}

/// A file or directory node of the selection tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) kind: EntryKind,
    #[serde(skip)]
    pub(crate) handle: EntryHandle,
    pub(crate) selection: Selection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) children: Option<Vec<Arc<Entry>>>,
    pub(crate) is_open: bool,
    pub(crate) is_loading_children: bool,
}

impl Entry {
    /// Creates an unmaterialized, closed entry. New entries start `Selected`.
    pub fn new(path: impl Into<String>, kind: EntryKind, handle: EntryHandle) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            path,
            name,
            kind,
            handle,
            selection: Selection::Selected,
            children: None,
            is_open: false,
            is_loading_children: false,
        }
    }

    pub fn file(path: impl Into<String>, handle: EntryHandle) -> Self {
        Self::new(path, EntryKind::File, handle)
    }

    pub fn directory(path: impl Into<String>, handle: EntryHandle) -> Self {
        Self::new(path, EntryKind::Directory, handle)
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Materializes the entry with the given children, sorted in listing order.
    pub fn with_children(mut self, children: Vec<Entry>) -> Self {
        self.children = Some(sorted_arcs(children));
        self
    }

    pub fn with_open(mut self, open: bool) -> Self {
        self.is_open = open;
        self
    }

    pub fn id(&self) -> &str {
        &self.path
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn handle(&self) -> &EntryHandle {
        &self.handle
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn children(&self) -> Option<&[Arc<Entry>]> {
        self.children.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_loading_children(&self) -> bool {
        self.is_loading_children
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_materialized(&self) -> bool {
        self.children.is_some()
    }
}

// Handles are never compared; two entries are equal when everything else is.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.name == other.name
            && self.kind == other.kind
            && self.selection == other.selection
            && self.children == other.children
            && self.is_open == other.is_open
            && self.is_loading_children == other.is_loading_children
    }
}

/// Joins a parent id and a child name into the child's id.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Directories before files, then case-insensitive name order with the raw
/// name as tie-break.
pub fn compare_listing(a: (EntryKind, &str), b: (EntryKind, &str)) -> Ordering {
    match (a.0, b.0) {
        (EntryKind::Directory, EntryKind::File) => Ordering::Less,
        (EntryKind::File, EntryKind::Directory) => Ordering::Greater,
        _ => compare_names(a.1, b.1),
    }
}

pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub(crate) fn sorted_arcs(mut entries: Vec<Entry>) -> Vec<Arc<Entry>> {
    entries.sort_by(|a, b| compare_listing((a.kind, &a.name), (b.kind, &b.name)));
    entries.into_iter().map(Arc::new).collect()
}

/// Immutable snapshot of the top level of the chosen root.
///
/// Every transition returns a new `Tree`; subtrees that a transition does not
/// touch are shared between the old and the new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Tree {
    entries: Vec<Arc<Entry>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub directories: usize,
    pub loaded_directories: usize,
    pub files: usize,
    pub selected_files: usize,
}

impl Tree {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries: sorted_arcs(entries),
        }
    }

    pub(crate) fn from_arcs(entries: Vec<Arc<Entry>>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Arc<Entry>] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index path from the top level down to the entry with `id`.
    pub fn route_to(&self, id: &str) -> Option<Vec<usize>> {
        let mut route = Vec::new();
        let mut level: &[Arc<Entry>] = &self.entries;
        let mut segments = id.split('/').peekable();
        while let Some(segment) = segments.next() {
            let index = level.iter().position(|e| e.name == segment)?;
            route.push(index);
            if segments.peek().is_some() {
                level = level[index].children.as_deref()?;
            }
        }
        Some(route)
    }

    pub fn find(&self, id: &str) -> Option<&Arc<Entry>> {
        let route = self.route_to(id)?;
        let mut level: &[Arc<Entry>] = &self.entries;
        let mut found = None;
        for index in route {
            let entry = level.get(index)?;
            found = Some(entry);
            level = entry.children.as_deref().unwrap_or(&[]);
        }
        found
    }

    pub(crate) fn require(&self, id: &str) -> Result<&Arc<Entry>> {
        self.find(id)
            .ok_or_else(|| AppError::EntryNotFound(id.to_string()))
    }

    /// Pre-order traversal over every materialized entry.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: self.entries.iter().rev().collect(),
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        for entry in self.walk() {
            if entry.is_dir() {
                stats.directories += 1;
                if entry.is_materialized() {
                    stats.loaded_directories += 1;
                }
            } else {
                stats.files += 1;
                if entry.selection.is_fully_selected() {
                    stats.selected_files += 1;
                }
            }
        }
        stats
    }

    /// Case-insensitive name search. Matching entries are kept whole; other
    /// directories are kept only with the subset of children that match.
    pub fn search(&self, text: &str) -> Tree {
        if text.is_empty() {
            return self.clone();
        }
        let needle = text.to_lowercase();
        Tree::from_arcs(search_level(&self.entries, &needle))
    }

    pub fn toggle_open(&self, id: &str) -> Result<Tree> {
        let route = self
            .route_to(id)
            .ok_or_else(|| AppError::EntryNotFound(id.to_string()))?;
        Ok(self.rewrite_route(
            &route,
            |entry| {
                let mut updated = entry.clone();
                updated.is_open = !entry.is_open;
                updated
            },
            |ancestor| ancestor,
        ))
    }

    /// Expands or collapses every directory, leaving materialization alone.
    pub fn with_all_open(&self, open: bool) -> Tree {
        Tree::from_arcs(set_open_level(&self.entries, open))
    }

    pub(crate) fn with_loading(&self, id: &str, loading: bool) -> Result<Tree> {
        let route = self
            .route_to(id)
            .ok_or_else(|| AppError::EntryNotFound(id.to_string()))?;
        Ok(self.rewrite_route(
            &route,
            |entry| {
                let mut updated = entry.clone();
                updated.is_loading_children = loading;
                if loading {
                    updated.is_open = true;
                }
                updated
            },
            |ancestor| ancestor,
        ))
    }

    /// Copy-on-write along `route`: the target is replaced by `leaf(target)`,
    /// each ancestor (deepest first) by `ancestor(copy with new children)`.
    pub(crate) fn rewrite_route(
        &self,
        route: &[usize],
        leaf: impl FnOnce(&Entry) -> Entry,
        mut ancestor: impl FnMut(Entry) -> Entry,
    ) -> Tree {
        let mut leaf = Some(leaf);
        Tree::from_arcs(rewrite_level(&self.entries, route, &mut leaf, &mut ancestor))
    }
}

fn rewrite_level<L, A>(
    level: &[Arc<Entry>],
    route: &[usize],
    leaf: &mut Option<L>,
    ancestor: &mut A,
) -> Vec<Arc<Entry>>
where
    L: FnOnce(&Entry) -> Entry,
    A: FnMut(Entry) -> Entry,
{
    let mut next = level.to_vec();
    let Some((&index, rest)) = route.split_first() else {
        return next;
    };
    let Some(current) = level.get(index) else {
        return next;
    };
    let replacement = if rest.is_empty() {
        match leaf.take() {
            Some(apply) => apply(current),
            None => return next,
        }
    } else {
        let children = current.children.as_deref().unwrap_or(&[]);
        let mut updated = (**current).clone();
        updated.children = Some(rewrite_level(children, rest, leaf, ancestor));
        ancestor(updated)
    };
    next[index] = Arc::new(replacement);
    next
}

fn search_level(level: &[Arc<Entry>], needle: &str) -> Vec<Arc<Entry>> {
    let mut kept = Vec::new();
    for entry in level {
        if entry.name.to_lowercase().contains(needle) {
            kept.push(Arc::clone(entry));
            continue;
        }
        if let Some(children) = entry.children.as_deref() {
            let matches = search_level(children, needle);
            if !matches.is_empty() {
                let mut narrowed = (**entry).clone();
                narrowed.children = Some(matches);
                kept.push(Arc::new(narrowed));
            }
        }
    }
    kept
}

fn set_open_level(level: &[Arc<Entry>], open: bool) -> Vec<Arc<Entry>> {
    level
        .iter()
        .map(|entry| {
            if !entry.is_dir() {
                return Arc::clone(entry);
            }
            let mut updated = (**entry).clone();
            updated.is_open = open;
            if let Some(children) = entry.children.as_deref() {
                updated.children = Some(set_open_level(children, open));
            }
            Arc::new(updated)
        })
        .collect()
}

pub struct Walk<'a> {
    stack: Vec<&'a Arc<Entry>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Arc<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.stack.pop()?;
        if let Some(children) = entry.children.as_deref() {
            self.stack.extend(children.iter().rev());
        }
        Some(entry)
    }
}
