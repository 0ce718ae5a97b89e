use crate::entry::{Entry, Selection, Tree};
use crate::error::{AppError, Result};
use crate::overrides::OverrideSet;
use crate::rules::ActiveRules;
use std::sync::Arc;

/// Derives a loaded directory's state from its children.
///
/// Fully selected children count as full, indeterminate ones as partial.
/// No full or partial child gives `Deselected`, all full gives `Selected`,
/// anything else is partial.
pub fn count_children(children: &[Arc<Entry>]) -> Selection {
    let full = children
        .iter()
        .filter(|c| c.selection().is_fully_selected())
        .count();
    let partial = children
        .iter()
        .filter(|c| c.selection().is_indeterminate())
        .count();
    if full + partial == 0 {
        Selection::Deselected
    } else if full == children.len() {
        Selection::Selected
    } else {
        Selection::PARTIAL
    }
}

/// Counting rule used by rule-aware passes: when nothing visible is left but
/// the directory was selected and rules are active, the intent is retained
/// as hidden content instead of being dropped.
pub(crate) fn count_retaining_hidden(
    children: &[Arc<Entry>],
    prior: Selection,
    active: &ActiveRules,
) -> Selection {
    match count_children(children) {
        Selection::Deselected if !active.is_empty() && prior.is_selected() => Selection::RETAINED,
        counted => counted,
    }
}

/// Re-derives a loaded directory after its children changed outside a
/// toggle. A rule-matched directory with no override beneath it stays
/// deselected.
pub(crate) fn rederive_directory(
    entry: &Entry,
    active: &ActiveRules,
    overrides: &OverrideSet,
) -> Selection {
    let Some(children) = entry.children.as_deref() else {
        return entry.selection;
    };
    if active.is_filtered(entry.path()) && !overrides.has_override_under(entry.path()) {
        return Selection::Deselected;
    }
    count_retaining_hidden(children, entry.selection, active)
}

/// Applies a checkbox toggle to `id`.
///
/// The new state is pushed down to every loaded descendant, then loaded
/// directories inside the toggled subtree and on the path above it are
/// recounted bottom-up. Unloaded descendants keep their state and pick up the
/// new intent when they are loaded.
pub fn update_selection(tree: &Tree, id: &str, selected: bool) -> Result<Tree> {
    let route = tree
        .route_to(id)
        .ok_or_else(|| AppError::EntryNotFound(id.to_string()))?;
    log::debug!("Setting selection of {} to {}", id, selected);
    let target = Selection::from_bool(selected);
    Ok(tree.rewrite_route(
        &route,
        |entry| cascade(entry, target),
        |mut ancestor| {
            if let Some(children) = ancestor.children.as_deref() {
                ancestor.selection = count_children(children);
            }
            ancestor
        },
    ))
}

fn cascade(entry: &Entry, target: Selection) -> Entry {
    let mut updated = entry.clone();
    updated.selection = target;
    if let Some(children) = entry.children.as_deref() {
        let children: Vec<Arc<Entry>> = children
            .iter()
            .map(|child| Arc::new(cascade(child, target)))
            .collect();
        // An empty loaded directory has nothing to select.
        updated.selection = count_children(&children);
        updated.children = Some(children);
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryHandle;

    fn file(path: &str) -> Entry {
        Entry::file(path, EntryHandle::new(path))
    }

    fn dir(path: &str, children: Vec<Entry>) -> Entry {
        Entry::directory(path, EntryHandle::new(path)).with_children(children)
    }

    fn sample() -> Tree {
        Tree::new(vec![
            dir(
                "src",
                vec![
                    file("src/a.ts"),
                    file("src/b.ts"),
                    dir("src/lib", vec![file("src/lib/x.ts")]),
                    Entry::directory("src/unloaded", EntryHandle::new("src/unloaded")),
                ],
            ),
            file("README.md"),
        ])
    }

    fn state(tree: &Tree, id: &str) -> Selection {
        tree.find(id).unwrap().selection()
    }

    #[test]
    fn test_count_children() {
        let selected = Arc::new(file("a"));
        let deselected = Arc::new(file("b").with_selection(Selection::Deselected));
        let partial = Arc::new(file("c").with_selection(Selection::PARTIAL));
        assert_eq!(count_children(&[]), Selection::Deselected);
        assert_eq!(count_children(&[selected.clone()]), Selection::Selected);
        assert_eq!(
            count_children(&[selected.clone(), deselected.clone()]),
            Selection::PARTIAL
        );
        assert_eq!(count_children(&[deselected.clone()]), Selection::Deselected);
        assert_eq!(count_children(&[partial, deselected]), Selection::PARTIAL);
    }

    #[test]
    fn test_deselecting_file_marks_parent_partial() {
        let tree = update_selection(&sample(), "src/a.ts", false).unwrap();
        assert_eq!(state(&tree, "src/a.ts"), Selection::Deselected);
        assert_eq!(state(&tree, "src"), Selection::PARTIAL);
        assert_eq!(state(&tree, "README.md"), Selection::Selected);
    }

    #[test]
    fn test_directory_toggle_cascades_to_loaded_descendants_only() {
        let unloaded_before = sample().find("src/unloaded").unwrap().selection();
        let tree = update_selection(&sample(), "src", false).unwrap();
        assert_eq!(state(&tree, "src"), Selection::Deselected);
        assert_eq!(state(&tree, "src/lib"), Selection::Deselected);
        assert_eq!(state(&tree, "src/lib/x.ts"), Selection::Deselected);
        assert_eq!(state(&tree, "src/unloaded"), Selection::Deselected);
        assert_eq!(unloaded_before, Selection::Selected);
        assert!(!tree.find("src/unloaded").unwrap().is_materialized());

        let tree = update_selection(&tree, "src", true).unwrap();
        assert!(tree.walk().all(|e| e.selection() == Selection::Selected));
    }

    #[test]
    fn test_deep_toggle_corrects_every_ancestor() {
        let tree = update_selection(&sample(), "src/lib/x.ts", false).unwrap();
        assert_eq!(state(&tree, "src/lib"), Selection::Deselected);
        assert_eq!(state(&tree, "src"), Selection::PARTIAL);

        let tree = update_selection(&tree, "src/lib/x.ts", true).unwrap();
        assert_eq!(state(&tree, "src/lib"), Selection::Selected);
        assert_eq!(state(&tree, "src"), Selection::Selected);
    }

    #[test]
    fn test_empty_loaded_directory_counts_as_deselected() {
        let tree = Tree::new(vec![dir("empty", vec![]), file("a.rs")]);
        let tree = update_selection(&tree, "empty", true).unwrap();
        assert_eq!(state(&tree, "empty"), Selection::Deselected);
    }

    #[test]
    fn test_untouched_subtrees_are_shared() {
        let before = sample();
        let after = update_selection(&before, "src/a.ts", false).unwrap();
        assert!(Arc::ptr_eq(
            before.find("README.md").unwrap(),
            after.find("README.md").unwrap()
        ));
        assert!(Arc::ptr_eq(
            before.find("src/lib").unwrap(),
            after.find("src/lib").unwrap()
        ));
    }

    #[test]
    fn test_unknown_id_is_an_error() {
        assert!(matches!(
            update_selection(&sample(), "src/zzz.ts", true),
            Err(AppError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_count_retaining_hidden() {
        let registry = crate::rules::RuleRegistry::builtin().unwrap();
        let active = registry.activate(["Markdown"]).unwrap();
        let hidden = [Arc::new(file("a.md").with_selection(Selection::Deselected))];
        assert_eq!(
            count_retaining_hidden(&hidden, Selection::Selected, &active),
            Selection::RETAINED
        );
        assert_eq!(
            count_retaining_hidden(&hidden, Selection::PARTIAL, &active),
            Selection::Deselected
        );
        assert_eq!(
            count_retaining_hidden(&hidden, Selection::Selected, &ActiveRules::none()),
            Selection::Deselected
        );
    }
}
