use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use xbundle_core::entry::Selection;
use xbundle_core::{
    ActiveRules, Entry, EntryHandle, OverrideSet, RuleRegistry, Tree, apply_filters,
    update_selection,
};

const TOP: [&str; 4] = ["src", "node_modules", "build", "lib"];
const MID: [Option<&str>; 3] = [None, Some("util"), Some("assets")];
const FILES: [&str; 4] = ["main.rs", "notes.md", "logo.png", "mod.ts"];
const RULES: [&str; 4] = ["Node Modules", "Dist/Build", "Markdown", "Image Files"];

fn build_level(prefix: &str, paths: &[String], unloaded: &BTreeSet<String>) -> Vec<Entry> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in paths {
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, rest.to_string()),
            None => (path.as_str(), String::new()),
        };
        let entry = groups.entry(head.to_string()).or_default();
        if !rest.is_empty() {
            entry.push(rest);
        }
    }
    groups
        .into_iter()
        .map(|(name, rest)| {
            let id = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            let handle = EntryHandle::new(&id);
            if rest.is_empty() {
                Entry::file(id, handle)
            } else if unloaded.contains(&id) {
                Entry::directory(id, handle)
            } else {
                let children = build_level(&id, &rest, unloaded);
                Entry::directory(id, handle).with_children(children)
            }
        })
        .collect()
}

fn arb_paths() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set((0..TOP.len(), 0..MID.len(), 0..FILES.len()), 1..14).prop_map(
        |picks| {
            picks
                .into_iter()
                .map(|(top, mid, file)| match MID[mid] {
                    Some(mid) => format!("{}/{}/{}", TOP[top], mid, FILES[file]),
                    None => format!("{}/{}", TOP[top], FILES[file]),
                })
                .collect()
        },
    )
}

#[derive(Debug, Clone)]
struct Case {
    tree: Tree,
    files: Vec<String>,
    rules: Vec<&'static str>,
    overrides: OverrideSet,
    toggles: Vec<(usize, bool)>,
}

impl Case {
    fn active(&self) -> ActiveRules {
        RuleRegistry::builtin()
            .unwrap()
            .activate(self.rules.iter().copied())
            .unwrap()
    }
}

fn arb_case() -> impl Strategy<Value = Case> {
    (
        arb_paths(),
        prop::collection::btree_set(0..TOP.len(), 0..2),
        prop::sample::subsequence(RULES.to_vec(), 0..=RULES.len()),
        prop::collection::vec(any::<bool>(), 14),
        prop::collection::vec((any::<usize>(), any::<bool>()), 0..6),
    )
        .prop_map(|(paths, unloaded, rules, mask, toggles)| {
            let unloaded: BTreeSet<String> =
                unloaded.into_iter().map(|i| TOP[i].to_string()).collect();
            let tree = Tree::new(build_level("", &paths, &unloaded));
            let files: Vec<String> = tree
                .walk()
                .filter(|e| e.is_file())
                .map(|e| e.id().to_string())
                .collect();
            let overrides = files
                .iter()
                .zip(mask)
                .filter(|(_, chosen)| *chosen)
                .map(|(id, _)| id.clone())
                .collect();
            Case {
                tree,
                files,
                rules,
                overrides,
                toggles,
            }
        })
}

/// Applies the case's toggles, each aimed at a materialized entry.
fn with_toggles(tree: Tree, toggles: &[(usize, bool)]) -> Tree {
    toggles.iter().fold(tree, |tree, &(pick, selected)| {
        let ids: Vec<String> = tree.walk().map(|e| e.id().to_string()).collect();
        if ids.is_empty() {
            return tree;
        }
        update_selection(&tree, &ids[pick % ids.len()], selected).unwrap()
    })
}

fn selected_directories_are_complete(tree: &Tree) -> bool {
    tree.walk().all(|entry| match entry.children() {
        Some(children) if entry.selection() == Selection::Selected => children
            .iter()
            .all(|c| c.selection() == Selection::Selected),
        _ => true,
    })
}

proptest! {
    #[test]
    fn filtering_is_idempotent(case in arb_case()) {
        let active = case.active();
        let start = with_toggles(case.tree.clone(), &case.toggles);
        let once = apply_filters(&start, &active, &case.overrides);
        let twice = apply_filters(&once, &active, &case.overrides);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn overridden_files_are_selected_after_filtering(case in arb_case()) {
        let active = case.active();
        let filtered = apply_filters(&case.tree, &active, &case.overrides);
        for id in case.overrides.iter() {
            prop_assert_eq!(filtered.find(id).unwrap().selection(), Selection::Selected);
        }
        for id in &case.files {
            let entry = filtered.find(id).unwrap();
            if !case.overrides.contains(id) && active.is_filtered(id) {
                prop_assert_eq!(entry.selection(), Selection::Deselected);
            }
        }
    }

    #[test]
    fn selected_directories_only_hold_selected_children(case in arb_case()) {
        let active = case.active();
        let filtered = apply_filters(&case.tree, &active, &case.overrides);
        prop_assert!(selected_directories_are_complete(&filtered));
        let toggled = with_toggles(filtered, &case.toggles);
        prop_assert!(selected_directories_are_complete(&toggled));
    }

    #[test]
    fn leaf_toggle_round_trip_restores_the_tree(case in arb_case(), pick in any::<usize>()) {
        let active = case.active();
        let filtered = apply_filters(&case.tree, &active, &case.overrides);
        let before = with_toggles(filtered, &case.toggles);
        let selected: Vec<String> = before
            .walk()
            .filter(|e| e.is_file() && e.selection() == Selection::Selected)
            .map(|e| e.id().to_string())
            .collect();
        prop_assume!(!selected.is_empty());
        let leaf = &selected[pick % selected.len()];

        let off = update_selection(&before, leaf, false).unwrap();
        prop_assert_eq!(off.find(leaf).unwrap().selection(), Selection::Deselected);
        let on = update_selection(&off, leaf, true).unwrap();
        prop_assert_eq!(on, before);
    }
}
