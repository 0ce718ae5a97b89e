use crate::entry::{Entry, Selection, Tree};
use crate::overrides::OverrideSet;
use crate::rules::ActiveRules;
use crate::selection::count_retaining_hidden;
use std::sync::Arc;

/// Recomputes every entry's selection against `active` and `overrides`.
///
/// Open and loading flags are left alone. Pure and idempotent: applying it
/// twice with the same arguments gives the same tree as applying it once.
pub fn apply_filters(tree: &Tree, active: &ActiveRules, overrides: &OverrideSet) -> Tree {
    log::debug!(
        "Applying {} active rule(s) with {} override(s)",
        active.len(),
        overrides.len()
    );
    Tree::from_arcs(filter_level(tree.entries(), active, overrides))
}

fn filter_level(
    level: &[Arc<Entry>],
    active: &ActiveRules,
    overrides: &OverrideSet,
) -> Vec<Arc<Entry>> {
    level
        .iter()
        .map(|entry| {
            let updated = filter_entry(entry, active, overrides);
            if updated == **entry {
                Arc::clone(entry)
            } else {
                Arc::new(updated)
            }
        })
        .collect()
}

fn filter_entry(entry: &Entry, active: &ActiveRules, overrides: &OverrideSet) -> Entry {
    let mut updated = entry.clone();
    let filtered_here = active.is_filtered(entry.path());

    if entry.is_file() {
        updated.selection = if overrides.contains(entry.id()) {
            Selection::Selected
        } else if filtered_here {
            log::trace!("Filtered out {}", entry.path());
            Selection::Deselected
        } else {
            Selection::Selected
        };
        return updated;
    }

    let prior = entry.selection();
    if filtered_here && !overrides.has_override_under(entry.path()) {
        log::trace!("Filtered out directory {}", entry.path());
        // Children stay consistent for when the rule is lifted.
        if let Some(children) = entry.children.as_deref() {
            updated.children = Some(filter_level(children, active, overrides));
        }
        updated.selection = Selection::Deselected;
        return updated;
    }

    match entry.children.as_deref() {
        Some(children) => {
            let children = filter_level(children, active, overrides);
            updated.selection = count_retaining_hidden(&children, prior, active);
            updated.children = Some(children);
        }
        None => {
            updated.selection = match (prior.is_selected(), active.is_empty()) {
                (true, true) => Selection::Selected,
                (true, false) => Selection::RETAINED,
                (false, _) => Selection::Deselected,
            };
        }
    }
    updated
}
