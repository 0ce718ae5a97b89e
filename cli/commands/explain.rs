use crate::cli_args::ExplainArgs;
use crate::commands::{Session, prepare_workspace};
use crate::output;
use anyhow::{Context, Result};
use colored::*;
use xbundle_core::explain::{InclusionRecord, InclusionStatus, summarize};

pub async fn handle_explain_command(args: ExplainArgs, quiet: bool) -> Result<()> {
    let Session {
        config, workspace, ..
    } = prepare_workspace(&args.project_config, &args.rules, &args.selection).await?;

    let classifier = config.file_classifier();
    let records = workspace
        .explain(&classifier)
        .await
        .context("Failed to build the inclusion report")?;

    if args.format == "json" {
        return output::print_json(&records);
    }

    let shown: Vec<&InclusionRecord> = records
        .iter()
        .filter(|r| args.all || r.status != InclusionStatus::Traversed)
        .collect();
    if shown.is_empty() {
        println!("{}", "(Nothing to report)".yellow());
    } else {
        output::print_inclusion_table(&shown);
    }

    if !quiet {
        let summary = summarize(&records);
        let active = workspace.active_rule_names();
        println!(
            "{:<20} {}",
            "Active Rules:".green(),
            if active.is_empty() {
                "(none)".dimmed().to_string()
            } else {
                active.join(", ").cyan().to_string()
            }
        );
        println!(
            "{:<20} {}",
            "Included:".green(),
            summary.included.to_string().cyan()
        );
        println!(
            "{:<20} {}",
            "Filtered:".green(),
            summary.filtered.to_string().cyan()
        );
        println!(
            "{:<20} {}",
            "Not Code:".green(),
            summary.not_code.to_string().cyan()
        );
        println!(
            "{:<20} {}",
            "Deselected:".green(),
            summary.deselected.to_string().cyan()
        );
    }
    Ok(())
}
