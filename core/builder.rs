use crate::entry::{Entry, Tree};
use crate::loader::{initial_selection, read_level};
use crate::overrides::OverrideSet;
use crate::reader::DirectoryReader;
use crate::rules::ActiveRules;
use crate::selection::rederive_directory;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type LevelFuture<'a> = Pin<Box<dyn Future<Output = Vec<Arc<Entry>>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filtered {
    Drop,
    /// Keep filtered entries as they are, still without reading them.
    Keep,
}

/// Materializes everything the current selection needs for an export.
///
/// Filtered files without an override are dropped. Filtered directories
/// without an override beneath them are dropped unread. Directories that
/// contribute (active or holding an override) are read if needed; the rest
/// are kept unexpanded. A failed read leaves the directory empty.
pub async fn build_complete_tree(
    tree: &Tree,
    reader: &dyn DirectoryReader,
    active: &ActiveRules,
    overrides: &OverrideSet,
) -> Tree {
    log::info!("Building complete tree for export");
    let entries = build_level(tree.entries(), reader, active, overrides, Filtered::Drop).await;
    let complete = Tree::from_arcs(entries);
    let stats = complete.stats();
    log::debug!(
        "Complete tree: {} directories ({} loaded), {} files, {} selected",
        stats.directories,
        stats.loaded_directories,
        stats.files,
        stats.selected_files
    );
    complete
}

/// Same traversal as [`build_complete_tree`], but rule-matched entries stay
/// in the result (unexpanded) so they can be reported on.
pub async fn build_annotated_tree(
    tree: &Tree,
    reader: &dyn DirectoryReader,
    active: &ActiveRules,
    overrides: &OverrideSet,
) -> Tree {
    let entries = build_level(tree.entries(), reader, active, overrides, Filtered::Keep).await;
    Tree::from_arcs(entries)
}

fn build_level<'a>(
    level: &'a [Arc<Entry>],
    reader: &'a dyn DirectoryReader,
    active: &'a ActiveRules,
    overrides: &'a OverrideSet,
    filtered_mode: Filtered,
) -> LevelFuture<'a> {
    Box::pin(async move {
        let mut kept = Vec::with_capacity(level.len());
        for entry in level {
            let filtered = active.is_filtered(entry.path());
            if entry.is_file() {
                if filtered && !overrides.contains(entry.id()) {
                    log::trace!("Filtered file {}", entry.path());
                    if filtered_mode == Filtered::Keep {
                        kept.push(Arc::clone(entry));
                    }
                } else {
                    kept.push(Arc::clone(entry));
                }
                continue;
            }

            let override_under = overrides.has_override_under(entry.path());
            if filtered && !override_under {
                log::trace!("Filtered directory {}, not reading it", entry.path());
                if filtered_mode == Filtered::Keep {
                    kept.push(Arc::clone(entry));
                }
                continue;
            }

            match entry.children.as_deref() {
                Some(children) => {
                    let mut updated = (**entry).clone();
                    let children =
                        build_level(children, reader, active, overrides, filtered_mode).await;
                    updated.children = Some(children);
                    kept.push(Arc::new(updated));
                }
                None if override_under || entry.selection().is_active() => {
                    log::debug!("Reading {} for export", entry.path());
                    let parent = entry.selection();
                    let fresh: Vec<Entry> = read_level(reader, entry.path(), entry.handle())
                        .await
                        .into_iter()
                        .map(|child| {
                            let selection = initial_selection(&child, parent, active, overrides);
                            child.with_selection(selection)
                        })
                        .collect();
                    let mut updated = Entry::clone(entry).with_children(fresh);
                    let fresh = updated.children.take().unwrap_or_default();
                    let children =
                        build_level(&fresh, reader, active, overrides, filtered_mode).await;
                    updated.children = Some(children);
                    updated.selection = rederive_directory(&updated, active, overrides);
                    kept.push(Arc::new(updated));
                }
                None => kept.push(Arc::clone(entry)),
            }
        }
        kept
    })
}
