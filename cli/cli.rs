mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use std::path::{Path, PathBuf};
use std::process;

use cli_args::{Cli, Commands, ProjectConfigOpts};
use xbundle_core::{AppError, Config};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = match e.downcast_ref::<AppError>() {
                Some(AppError::Config(_)) => 1,
                Some(AppError::TomlParse(_)) => 1,
                Some(AppError::TomlSerialize(_)) => 1,
                Some(AppError::YamlParse(_)) => 1,
                Some(AppError::RuleLoading(_)) => 1,
                Some(AppError::Io(_)) => 2,
                Some(AppError::FileRead { .. }) => 2,
                Some(AppError::FileWrite { .. }) => 2,
                Some(AppError::DirRead { .. }) => 2,
                Some(AppError::Ignore(_)) => 2,
                Some(AppError::Glob(_)) => 2,
                Some(AppError::UnsupportedRoot(_)) => 3,
                Some(AppError::NoRoot) => 3,
                Some(AppError::EntryNotFound(_)) => 4,
                Some(AppError::NotADirectory(_)) => 4,
                Some(AppError::InvalidArgument(_)) => 5,
                Some(AppError::UnknownRule(_)) => 5,
                Some(AppError::SizeParse(_)) => 5,
                Some(_) => 1,
                None => 1,
            };

            // Config and usage errors are shown even when quiet.
            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }

            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if let Commands::Completion(args) = &command {
        log::debug!("Executing 'completion' command...");
        return commands::completion::handle_completion_command(args, quiet);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async move {
        match command {
            Commands::Export(args) => {
                log::debug!("Executing 'export' command...");
                commands::export::handle_export_command(args, quiet).await
            }
            Commands::Tree(args) => {
                log::debug!("Executing 'tree' command...");
                commands::tree::handle_tree_command(args).await
            }
            Commands::Explain(args) => {
                log::debug!("Executing 'explain' command...");
                commands::explain::handle_explain_command(args, quiet).await
            }
            Commands::Rules(args) => {
                log::debug!("Executing 'rules' command...");
                commands::rules::handle_rules_command(args, quiet)
            }
            Commands::Completion(_) => Ok(()),
        }
    })
}

/// Config file for a command, honouring `--config-file` and
/// `--disable-config-file`. Returns the path it was loaded from, if any.
pub fn load_config_for_command(
    project_root: &Path,
    project_opts: &ProjectConfigOpts,
) -> Result<(Config, Option<PathBuf>)> {
    let config_path = Config::resolve_config_path(
        project_root,
        project_opts.config_file.as_ref(),
        project_opts.disable_config_file,
    )
    .context("Failed to resolve configuration path")?;

    let config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    log::trace!("Effective config: {:?}", config);
    Ok((config, config_path))
}
