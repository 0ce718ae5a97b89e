use crate::entry::{Entry, EntryKind, Tree};
use crate::file_types::{FileCategory, FileClassifier};
use crate::overrides::OverrideSet;
use crate::rules::ActiveRules;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum ExclusionReason {
    FilteredBy(String),
    NotCode(FileCategory),
    Deselected,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::FilteredBy(rule) => write!(f, "Filtered by '{}'", rule),
            ExclusionReason::NotCode(category) => write!(f, "Not a code file ({})", category),
            ExclusionReason::Deselected => write!(f, "Deselected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum InclusionStatus {
    Included,
    /// Directory whose contents are considered.
    Traversed,
    Excluded(ExclusionReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InclusionRecord {
    pub path: String,
    pub kind: EntryKind,
    pub depth: usize,
    pub status: InclusionStatus,
}

/// Why each visited entry is or is not part of the export. Excluded
/// directories are reported but not descended into.
pub fn inclusion_report(
    tree: &Tree,
    active: &ActiveRules,
    overrides: &OverrideSet,
    classifier: &FileClassifier,
) -> Vec<InclusionRecord> {
    let mut records = Vec::new();
    report_level(tree.entries(), 0, active, overrides, classifier, &mut records);
    records
}

fn report_level(
    level: &[Arc<Entry>],
    depth: usize,
    active: &ActiveRules,
    overrides: &OverrideSet,
    classifier: &FileClassifier,
    records: &mut Vec<InclusionRecord>,
) {
    for entry in level {
        let status = status_of(entry, active, overrides, classifier);
        let descend = status == InclusionStatus::Traversed;
        records.push(InclusionRecord {
            path: entry.path().to_string(),
            kind: entry.kind(),
            depth,
            status,
        });
        if descend {
            if let Some(children) = entry.children() {
                report_level(children, depth + 1, active, overrides, classifier, records);
            }
        }
    }
}

fn status_of(
    entry: &Entry,
    active: &ActiveRules,
    overrides: &OverrideSet,
    classifier: &FileClassifier,
) -> InclusionStatus {
    let path = entry.path();
    if entry.is_file() {
        if !overrides.contains(path) {
            if let Some(rule) = active.matching_rule(path) {
                return InclusionStatus::Excluded(ExclusionReason::FilteredBy(
                    rule.name().to_string(),
                ));
            }
        }
        let category = classifier.classify(entry.name());
        if category != FileCategory::Code {
            return InclusionStatus::Excluded(ExclusionReason::NotCode(category));
        }
        if !entry.selection().is_fully_selected() {
            return InclusionStatus::Excluded(ExclusionReason::Deselected);
        }
        return InclusionStatus::Included;
    }

    if !overrides.has_override_under(path) {
        if let Some(rule) = active.matching_rule(path) {
            return InclusionStatus::Excluded(ExclusionReason::FilteredBy(rule.name().to_string()));
        }
    }
    if entry.selection().is_active() {
        InclusionStatus::Traversed
    } else {
        InclusionStatus::Excluded(ExclusionReason::Deselected)
    }
}

/// Counts of a report, for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub included: usize,
    pub filtered: usize,
    pub not_code: usize,
    pub deselected: usize,
}

pub fn summarize(records: &[InclusionRecord]) -> ReportSummary {
    let mut summary = ReportSummary::default();
    for record in records {
        match &record.status {
            InclusionStatus::Included => summary.included += 1,
            InclusionStatus::Traversed => {}
            InclusionStatus::Excluded(ExclusionReason::FilteredBy(_)) => summary.filtered += 1,
            InclusionStatus::Excluded(ExclusionReason::NotCode(_)) => summary.not_code += 1,
            InclusionStatus::Excluded(ExclusionReason::Deselected) => summary.deselected += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryHandle, Selection};
    use crate::rules::RuleRegistry;

    fn file(path: &str) -> Entry {
        Entry::file(path, EntryHandle::new(path))
    }

    fn dir(path: &str, children: Vec<Entry>) -> Entry {
        Entry::directory(path, EntryHandle::new(path)).with_children(children)
    }

    fn status(records: &[InclusionRecord], path: &str) -> InclusionStatus {
        records
            .iter()
            .find(|r| r.path == path)
            .map(|r| r.status.clone())
            .unwrap()
    }

    #[test]
    fn test_reasons() {
        let tree = Tree::new(vec![
            dir(
                "src",
                vec![
                    file("src/a.ts"),
                    file("src/b.png").with_selection(Selection::Deselected),
                    file("src/c.rs").with_selection(Selection::Deselected),
                    file("src/notes.md").with_selection(Selection::Deselected),
                ],
            )
            .with_selection(Selection::PARTIAL),
            dir("node_modules", vec![file("node_modules/x.js")])
                .with_selection(Selection::Deselected),
            dir("off", vec![file("off/y.rs")]).with_selection(Selection::Deselected),
        ]);
        let active = RuleRegistry::builtin()
            .unwrap()
            .activate(["Node Modules", "Markdown"])
            .unwrap();
        let records =
            inclusion_report(&tree, &active, &OverrideSet::new(), &FileClassifier::new());

        assert_eq!(status(&records, "src"), InclusionStatus::Traversed);
        assert_eq!(status(&records, "src/a.ts"), InclusionStatus::Included);
        assert_eq!(
            status(&records, "src/b.png"),
            InclusionStatus::Excluded(ExclusionReason::NotCode(FileCategory::Image))
        );
        assert_eq!(
            status(&records, "src/c.rs"),
            InclusionStatus::Excluded(ExclusionReason::Deselected)
        );
        assert_eq!(
            status(&records, "src/notes.md"),
            InclusionStatus::Excluded(ExclusionReason::FilteredBy("Markdown".into()))
        );
        assert_eq!(
            status(&records, "node_modules"),
            InclusionStatus::Excluded(ExclusionReason::FilteredBy("Node Modules".into()))
        );
        assert!(records.iter().all(|r| r.path != "node_modules/x.js"));
        assert_eq!(
            status(&records, "off"),
            InclusionStatus::Excluded(ExclusionReason::Deselected)
        );
        assert_eq!(records.iter().find(|r| r.path == "src/a.ts").unwrap().depth, 1);

        let summary = summarize(&records);
        assert_eq!(summary.included, 1);
        assert_eq!(summary.filtered, 2);
        assert_eq!(summary.not_code, 1);
        assert_eq!(summary.deselected, 2);
    }

    #[test]
    fn test_override_is_reported_as_included() {
        let tree = Tree::new(vec![dir("docs", vec![file("docs/guide.md")])]);
        let active = RuleRegistry::builtin()
            .unwrap()
            .activate(["Markdown"])
            .unwrap();
        let overrides: OverrideSet = ["docs/guide.md"].into_iter().collect();
        let records = inclusion_report(&tree, &active, &overrides, &FileClassifier::new());
        assert_eq!(status(&records, "docs/guide.md"), InclusionStatus::Included);
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            ExclusionReason::FilteredBy("Lock Files".into()).to_string(),
            "Filtered by 'Lock Files'"
        );
        assert_eq!(
            ExclusionReason::NotCode(FileCategory::Video).to_string(),
            "Not a code file (video)"
        );
    }
}
