use crate::cli_args::{RulesAction, RulesArgs};
use crate::load_config_for_command;
use crate::output;
use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::path::Path;
use xbundle_core::{AppError, Config, RuleRegistry};

#[derive(Debug, Serialize)]
struct RuleInfo<'a> {
    name: &'a str,
    origin: String,
    active: bool,
}

pub fn handle_rules_command(args: RulesArgs, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    let (mut config, loaded_from) = load_config_for_command(&project_root, &args.project_config)?;
    let registry = config
        .build_rule_registry(&project_root)
        .context("Failed to build the rule registry")?;

    let action = args.action.unwrap_or(RulesAction::List {
        format: "text".to_string(),
    });
    match action {
        RulesAction::List { format } => list_rules(&registry, &config, &format),
        RulesAction::Enable { name } => set_rule(
            &registry,
            &mut config,
            loaded_from.as_deref(),
            &project_root,
            &name,
            true,
            quiet,
        ),
        RulesAction::Disable { name } => set_rule(
            &registry,
            &mut config,
            loaded_from.as_deref(),
            &project_root,
            &name,
            false,
            quiet,
        ),
    }
}

fn list_rules(registry: &RuleRegistry, config: &Config, format: &str) -> Result<()> {
    let infos: Vec<RuleInfo> = registry
        .rules()
        .map(|rule| RuleInfo {
            name: rule.name(),
            origin: rule.origin().to_string(),
            active: config.rules.active.iter().any(|n| n == rule.name()),
        })
        .collect();

    if format == "json" {
        return output::print_json(&infos);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Rule").fg(Color::Green),
        Cell::new("Origin").fg(Color::Green),
        Cell::new("Active").fg(Color::Green),
    ]);
    for info in &infos {
        table.add_row(vec![
            Cell::new(info.name).fg(Color::Cyan),
            Cell::new(&info.origin).fg(Color::DarkGrey),
            if info.active {
                Cell::new("yes").fg(Color::Green)
            } else {
                Cell::new("no")
            },
        ]);
    }
    println!("{table}");
    Ok(())
}

fn set_rule(
    registry: &RuleRegistry,
    config: &mut Config,
    loaded_from: Option<&Path>,
    project_root: &Path,
    name: &str,
    active: bool,
    quiet: bool,
) -> Result<()> {
    if !registry.contains(name) {
        anyhow::bail!(AppError::UnknownRule(name.to_string()));
    }
    let changed = config.set_rule_active(name, active);
    let verb = if active { "enabled" } else { "disabled" };
    if !changed {
        if !quiet {
            println!("Rule '{}' is already {}.", name.cyan(), verb);
        }
        return Ok(());
    }

    let path = loaded_from
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Config::default_path(project_root));
    config
        .save_to_path(&path)
        .with_context(|| format!("Failed to save config to {}", path.display()))?;
    if !quiet {
        println!(
            "{} Rule '{}' {} in: {}",
            "✅".green(),
            name.cyan(),
            verb,
            path.display().to_string().blue()
        );
    }
    Ok(())
}
