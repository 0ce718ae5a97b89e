use crate::cli_args::TreeArgs;
use crate::commands::{Session, prepare_workspace};
use crate::output;
use anyhow::{Context, Result};

pub async fn handle_tree_command(args: TreeArgs) -> Result<()> {
    let Session {
        project_root,
        config,
        workspace,
    } = prepare_workspace(&args.project_config, &args.rules, &args.selection).await?;

    let tree = if args.complete {
        log::debug!("Building the complete tree...");
        workspace
            .complete_tree()
            .await
            .context("Failed to build the complete tree")?
            .with_all_open(true)
    } else {
        workspace
            .expand_to_depth(args.depth)
            .await
            .context("Failed to expand the tree")?;
        workspace.snapshot()
    };
    let tree = match args.search.as_deref() {
        Some(text) => tree.search(text).with_all_open(true),
        None => tree,
    };

    if args.format == "json" {
        return output::print_json(&tree);
    }
    let root_name = workspace
        .root_name()
        .unwrap_or_else(|| config.get_effective_project_name(&project_root));
    output::write_to_stdout(&output::render_tree(&tree, &root_name))?;

    let stats = tree.stats();
    log::info!(
        "{} directories ({} loaded), {} files, {} selected",
        stats.directories,
        stats.loaded_directories,
        stats.files,
        stats.selected_files
    );
    Ok(())
}
