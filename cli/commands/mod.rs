pub mod completion;
pub mod explain;
pub mod export;
pub mod rules;
pub mod tree;

use crate::cli_args::{ProjectConfigOpts, RuleOpts, SelectionOpts};
use crate::load_config_for_command;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use xbundle_core::{Config, LocalFs, RootSelection, Workspace};

/// An opened workspace plus the configuration it was built from.
pub struct Session {
    pub project_root: PathBuf,
    pub config: Config,
    pub workspace: Workspace,
}

/// Resolves the project root and config, opens the root and applies the
/// rule and selection flags, in that order.
pub async fn prepare_workspace(
    project_opts: &ProjectConfigOpts,
    rule_opts: &RuleOpts,
    selection: &SelectionOpts,
) -> Result<Session> {
    let project_root = Config::determine_project_root(project_opts.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let (config, _) = load_config_for_command(&project_root, project_opts)
        .context("Failed to load configuration")?;
    let registry = config
        .build_rule_registry(&project_root)
        .context("Failed to build the rule registry")?;

    let reader = config
        .tool_paths(&project_root)
        .into_iter()
        .fold(LocalFs::new(), |reader, path| {
            log::debug!("Hiding tool directory {}", path.display());
            reader.hiding(path)
        });
    let workspace = Workspace::new(Arc::new(reader), registry);
    if rule_opts.all_rules {
        workspace.activate_all_rules()?;
    } else {
        let mut names: Vec<String> = if rule_opts.no_config_rules {
            Vec::new()
        } else {
            config.rules.active.clone()
        };
        names.extend(rule_opts.rules.iter().cloned());
        workspace.set_active_rules(&names)?;
    }

    let root = RootSelection::from_local_path(&project_root)?;
    workspace.open(root).await?;
    apply_selection(&workspace, selection).await?;

    Ok(Session {
        project_root,
        config,
        workspace,
    })
}

async fn apply_selection(workspace: &Workspace, selection: &SelectionOpts) -> Result<()> {
    if !selection.only.is_empty() {
        let top: Vec<String> = workspace
            .snapshot()
            .entries()
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        for id in top {
            workspace.toggle_selection(&id, false)?;
        }
    }
    for path in &selection.only {
        let id = normalize_entry_path(path);
        workspace
            .select_path(&id, true)
            .await
            .with_context(|| format!("Cannot select '{}'", path))?;
    }
    for path in &selection.select {
        let id = normalize_entry_path(path);
        workspace
            .select_path(&id, true)
            .await
            .with_context(|| format!("Cannot select '{}'", path))?;
    }
    for path in &selection.deselect {
        let id = normalize_entry_path(path);
        workspace
            .select_path(&id, false)
            .await
            .with_context(|| format!("Cannot deselect '{}'", path))?;
    }
    Ok(())
}

/// Turns a user-typed relative path into an entry id.
pub fn normalize_entry_path(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
