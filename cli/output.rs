use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use xbundle_core::explain::{InclusionRecord, InclusionStatus};
use xbundle_core::{Entry, Selection, Tree};

pub fn write_to_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to file {}", path.display()))?;
    Ok(())
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.is_empty() && !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    write_to_stdout(&content)
}

pub fn selection_marker(selection: Selection) -> &'static str {
    match selection {
        Selection::Selected => "[x]",
        Selection::Deselected => "[ ]",
        Selection::Indeterminate { .. } => "[~]",
    }
}

/// Plain-text rendering of the tree. Closed directories show their
/// marker and name only.
pub fn render_tree(tree: &Tree, root_name: &str) -> String {
    let mut out = format!("{}/\n", root_name);
    render_level(tree.entries(), "", &mut out);
    out
}

fn render_level(level: &[Arc<Entry>], indent: &str, out: &mut String) {
    for (index, entry) in level.iter().enumerate() {
        let last = index + 1 == level.len();
        let branch = if last { "└── " } else { "├── " };
        let suffix = if entry.is_dir() { "/" } else { "" };
        out.push_str(&format!(
            "{}{}{} {}{}\n",
            indent,
            branch,
            selection_marker(entry.selection()),
            entry.name(),
            suffix
        ));
        if entry.is_open() {
            if let Some(children) = entry.children() {
                let nested = format!("{}{}", indent, if last { "    " } else { "│   " });
                render_level(children, &nested, out);
            }
        }
    }
}

pub fn print_inclusion_table(records: &[&InclusionRecord]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Path").fg(Color::Green),
        Cell::new("Status").fg(Color::Green),
        Cell::new("Reason").fg(Color::Green),
    ]);
    for record in records {
        let (status, color, reason) = match &record.status {
            InclusionStatus::Included => ("included", Color::Green, String::new()),
            InclusionStatus::Traversed => ("traversed", Color::DarkGrey, String::new()),
            InclusionStatus::Excluded(reason) => ("excluded", Color::Yellow, reason.to_string()),
        };
        let path = if record.kind == xbundle_core::EntryKind::Directory {
            format!("{}/", record.path)
        } else {
            record.path.clone()
        };
        table.add_row(vec![
            Cell::new(path).fg(Color::Cyan),
            Cell::new(status).fg(color),
            Cell::new(reason),
        ]);
    }
    println!("{table}");
}

pub struct TokenRow {
    pub path: String,
    pub bytes: usize,
    pub tokens: usize,
}

pub fn readable_size(bytes: usize) -> String {
    Byte::from_u128(bytes as u128)
        .unwrap_or_default()
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

pub fn print_token_table(rows: &[TokenRow], total_tokens: usize) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Path").fg(Color::Green),
        Cell::new("Size").fg(Color::Green),
        Cell::new("Tokens").fg(Color::Green),
    ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.path).fg(Color::Cyan),
            Cell::new(readable_size(row.bytes))
                .set_alignment(CellAlignment::Right)
                .fg(Color::DarkGrey),
            Cell::new(row.tokens).set_alignment(CellAlignment::Right),
        ]);
    }
    eprintln!("{table}");
    eprintln!(
        "{:<20} {}",
        "Total Tokens:".green(),
        total_tokens.to_string().cyan()
    );
}
