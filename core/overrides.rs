use crate::entry::Entry;
use serde::Serialize;
use std::collections::BTreeSet;

/// File ids the user explicitly checked. Membership beats every exclusion
/// rule. Only manual file toggles change it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OverrideSet {
    ids: BTreeSet<String>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Records a manual checkbox toggle. Directory toggles are not overrides
    /// of their descendants and leave the set alone. Returns whether the set
    /// changed.
    pub fn record_toggle(&mut self, entry: &Entry, selected: bool) -> bool {
        if !entry.is_file() {
            return false;
        }
        if selected {
            log::trace!("Recording include override for {}", entry.id());
            self.ids.insert(entry.id().to_string())
        } else {
            log::trace!("Dropping include override for {}", entry.id());
            self.ids.remove(entry.id())
        }
    }

    /// True if `dir_path` itself or anything beneath it is overridden.
    pub fn has_override_under(&self, dir_path: &str) -> bool {
        if dir_path.is_empty() {
            return !self.ids.is_empty();
        }
        let prefix = format!("{}/", dir_path);
        // Ids sort lexicographically, so everything under `prefix` is contiguous.
        self.ids.contains(dir_path)
            || self
                .ids
                .range(prefix.clone()..)
                .next()
                .is_some_and(|id| id.starts_with(&prefix))
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

impl<S: Into<String>> FromIterator<S> for OverrideSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
