use crate::entry::{Entry, EntryHandle, Tree};
use crate::file_types::FileClassifier;
use crate::reader::FileReader;
use serde::Serialize;
use std::sync::Arc;

pub const NOTHING_SELECTED: &str = "// No code files are selected for export.\n";

/// One file to be exported, in traversal order.
#[derive(Debug, Clone)]
pub struct ExportItem {
    pub path: String,
    pub handle: EntryHandle,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Files larger than this are replaced by an error banner.
    pub max_file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RecordOutcome {
    Included { bytes: usize },
    Unreadable { reason: String },
    TooLarge { size: u64, limit: u64 },
}

impl RecordOutcome {
    /// Why the file was left out, `None` when it was included.
    pub fn reason(&self) -> Option<String> {
        match self {
            RecordOutcome::Included { .. } => None,
            RecordOutcome::Unreadable { reason } => Some(reason.clone()),
            RecordOutcome::TooLarge { size, limit } => Some(format!(
                "{} bytes exceeds the {} byte limit",
                size, limit
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    pub path: String,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportArtifact {
    pub text: String,
    pub records: Vec<ExportRecord>,
}

impl ExportArtifact {
    pub fn included(&self) -> impl Iterator<Item = &ExportRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, RecordOutcome::Included { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &ExportRecord> {
        self.records
            .iter()
            .filter(|r| !matches!(r.outcome, RecordOutcome::Included { .. }))
    }
}

/// Selected code files of `tree`, in traversal order, under active
/// directories only.
pub fn collect(tree: &Tree, classifier: &FileClassifier) -> Vec<ExportItem> {
    let mut items = Vec::new();
    collect_level(tree.entries(), classifier, &mut items);
    log::debug!("Collected {} file(s) for export", items.len());
    items
}

fn collect_level(level: &[Arc<Entry>], classifier: &FileClassifier, items: &mut Vec<ExportItem>) {
    for entry in level {
        if entry.is_file() {
            if entry.selection().is_fully_selected() && classifier.is_code(entry.name()) {
                items.push(ExportItem {
                    path: entry.path().to_string(),
                    handle: entry.handle().clone(),
                });
            }
            continue;
        }
        if !entry.selection().is_active() {
            continue;
        }
        if let Some(children) = entry.children() {
            collect_level(children, classifier, items);
        }
    }
}

pub fn record_header(path: &str) -> String {
    format!("//--- File: {} ---\n\n", path)
}

pub fn format_record(path: &str, content: &str) -> String {
    format!("{}{}\n\n", record_header(path), content)
}

pub fn format_error_banner(path: &str, reason: &str) -> String {
    format!(
        "{}--- ERROR: could not read this file ({}) ---\n\n",
        record_header(path),
        reason
    )
}

/// Reads each item in order and concatenates the records. A file that
/// cannot be read becomes an error banner; the batch always completes.
pub async fn assemble(
    items: &[ExportItem],
    reader: &dyn FileReader,
    options: ExportOptions,
) -> ExportArtifact {
    if items.is_empty() {
        return ExportArtifact {
            text: NOTHING_SELECTED.to_string(),
            records: Vec::new(),
        };
    }

    let mut artifact = ExportArtifact::default();
    for item in items {
        let outcome = read_item(item, reader, options).await;
        match &outcome {
            Ok(content) => {
                artifact.text.push_str(&format_record(&item.path, content));
                artifact.records.push(ExportRecord {
                    path: item.path.clone(),
                    outcome: RecordOutcome::Included {
                        bytes: content.len(),
                    },
                });
            }
            Err(outcome) => {
                let reason = outcome.reason().unwrap_or_default();
                log::warn!("Could not export {}: {}", item.path, reason);
                artifact
                    .text
                    .push_str(&format_error_banner(&item.path, &reason));
                artifact.records.push(ExportRecord {
                    path: item.path.clone(),
                    outcome: outcome.clone(),
                });
            }
        }
    }
    log::info!(
        "Assembled {} record(s), {} bytes",
        artifact.records.len(),
        artifact.text.len()
    );
    artifact
}

async fn read_item(
    item: &ExportItem,
    reader: &dyn FileReader,
    options: ExportOptions,
) -> std::result::Result<String, RecordOutcome> {
    if let Some(limit) = options.max_file_size {
        let size = reader
            .file_size(&item.handle)
            .await
            .map_err(|e| RecordOutcome::Unreadable {
                reason: e.to_string(),
            })?;
        if size > limit {
            return Err(RecordOutcome::TooLarge { size, limit });
        }
    }
    reader
        .read_text(&item.handle)
        .await
        .map_err(|e| RecordOutcome::Unreadable {
            reason: e.to_string(),
        })
}

/// Wraps the body with the optional prefix and suffix, each separated from
/// it by a blank line. The body is kept byte for byte.
pub fn compose_prompt(prefix: &str, body: &str, suffix: &str) -> String {
    let mut out = String::new();
    let prefix = prefix.trim_end();
    if !prefix.is_empty() {
        out.push_str(prefix);
        out.push_str("\n\n");
    }
    out.push_str(body);
    let suffix = suffix.trim();
    if !suffix.is_empty() {
        if !out.is_empty() && !out.ends_with("\n\n") {
            out.push_str(if out.ends_with('\n') { "\n" } else { "\n\n" });
        }
        out.push_str(suffix);
        out.push('\n');
    }
    out
}

/// Rough token count: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Selection;
    use crate::reader::MemoryFs;

    fn file(path: &str) -> Entry {
        Entry::file(path, MemoryFs::handle(path))
    }

    fn dir(path: &str, children: Vec<Entry>) -> Entry {
        Entry::directory(path, MemoryFs::handle(path)).with_children(children)
    }

    fn paths(items: &[ExportItem]) -> Vec<&str> {
        items.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn test_collect_selected_code_files_in_order() {
        let tree = Tree::new(vec![
            dir(
                "src",
                vec![
                    file("src/b.ts"),
                    file("src/a.ts"),
                    file("src/logo.png"),
                    file("src/skip.rs").with_selection(Selection::Deselected),
                ],
            )
            .with_selection(Selection::PARTIAL),
            dir("off", vec![file("off/x.rs")]).with_selection(Selection::Deselected),
            file("main.rs"),
            file("Makefile"),
        ]);
        let items = collect(&tree, &FileClassifier::new());
        assert_eq!(paths(&items), vec!["src/a.ts", "src/b.ts", "main.rs"]);
    }

    #[tokio::test]
    async fn test_assemble_formats_records() {
        let fs = MemoryFs::new()
            .with_file("src/a.ts", "let a = 1;")
            .with_file("b.rs", "fn b() {}");
        let items = vec![
            ExportItem {
                path: "src/a.ts".into(),
                handle: MemoryFs::handle("src/a.ts"),
            },
            ExportItem {
                path: "b.rs".into(),
                handle: MemoryFs::handle("b.rs"),
            },
        ];
        let artifact = assemble(&items, &fs, ExportOptions::default()).await;
        assert_eq!(
            artifact.text,
            "//--- File: src/a.ts ---\n\nlet a = 1;\n\n//--- File: b.rs ---\n\nfn b() {}\n\n"
        );
        assert_eq!(artifact.included().count(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_and_oversized_files_become_banners() {
        let fs = MemoryFs::new()
            .with_file("locked.rs", "secret")
            .with_unreadable("locked.rs")
            .with_file("big.txt", "0123456789")
            .with_file("ok.rs", "ok");
        let items: Vec<_> = ["locked.rs", "big.txt", "ok.rs"]
            .into_iter()
            .map(|p| ExportItem {
                path: p.to_string(),
                handle: MemoryFs::handle(p),
            })
            .collect();
        let options = ExportOptions {
            max_file_size: Some(5),
        };
        let artifact = assemble(&items, &fs, options).await;

        assert!(artifact.text.starts_with(
            "//--- File: locked.rs ---\n\n--- ERROR: could not read this file ("
        ));
        assert!(artifact.text.contains(
            "//--- File: big.txt ---\n\n--- ERROR: could not read this file (10 bytes exceeds the 5 byte limit) ---\n\n"
        ));
        assert!(artifact.text.ends_with("//--- File: ok.rs ---\n\nok\n\n"));
        assert_eq!(artifact.failed().count(), 2);
        assert_eq!(
            artifact.records[1].outcome,
            RecordOutcome::TooLarge { size: 10, limit: 5 }
        );
    }

    #[tokio::test]
    async fn test_empty_selection_explains_itself() {
        let artifact = assemble(&[], &MemoryFs::new(), ExportOptions::default()).await;
        assert_eq!(artifact.text, NOTHING_SELECTED);
        assert!(artifact.records.is_empty());
    }

    #[test]
    fn test_compose_prompt() {
        assert_eq!(compose_prompt("", "body", ""), "body");
        assert_eq!(
            compose_prompt("Review:\n", "body\n\n", "Thanks"),
            "Review:\n\nbody\n\nThanks\n"
        );
        assert_eq!(compose_prompt("", "body\n", " Thanks "), "body\n\nThanks\n");
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
