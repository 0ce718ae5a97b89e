use crate::cli_args::ExportArgs;
use crate::commands::{Session, prepare_workspace};
use crate::output::{self, TokenRow};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tiktoken_rs::cl100k_base;
use xbundle_core::export::record_header;
use xbundle_core::{
    Config, ExportArtifact, ExportOptions, LocalFs, compose_prompt, estimate_tokens,
};

pub async fn handle_export_command(args: ExportArgs, quiet: bool) -> Result<()> {
    let Session {
        project_root,
        mut config,
        workspace,
    } = prepare_workspace(&args.project_config, &args.rules, &args.selection).await?;

    if let Some(limit) = &args.max_file_size {
        config.export.max_file_size = limit.clone();
    }
    let options = ExportOptions {
        max_file_size: config.max_file_size_bytes()?,
    };
    let classifier = config.file_classifier();

    log::info!("Exporting selected files of {}", project_root.display());
    let artifact = workspace
        .export(&LocalFs::new(), &classifier, options)
        .await
        .context("Failed to export the selection")?;

    let prefix = args.prefix.as_deref().unwrap_or(&config.export.prefix);
    let suffix = args.suffix.as_deref().unwrap_or(&config.export.suffix);
    let text = compose_prompt(prefix, &artifact.text, suffix);

    if !quiet {
        for record in artifact.failed() {
            eprintln!(
                "{} {}: {}",
                "Warning:".yellow().bold(),
                record.path,
                record.outcome.reason().unwrap_or_default()
            );
        }
    }

    match &args.save {
        Some(save_dir) => {
            let path = output_path(&config, save_dir.as_deref(), &project_root);
            log::info!("Saving artifact to file: {}", path.display());
            output::write_to_file(&path, &text)?;
            if args.stdout {
                output::write_to_stdout(&text)?;
            }
            if !quiet {
                let message = format!(
                    "{} Bundled {} file(s), ~{} tokens, saved to: {}",
                    "✅".green(),
                    artifact.included().count(),
                    estimate_tokens(&text),
                    path.display().to_string().blue()
                );
                // stdout carries only the artifact under --stdout.
                if args.stdout {
                    eprintln!("{}", message);
                } else {
                    println!("{}", message);
                }
            }
        }
        None => output::write_to_stdout(&text)?,
    }

    if args.count_tokens {
        report_tokens(&artifact, &text)?;
    }
    Ok(())
}

fn output_path(config: &Config, cli_dir: Option<&Path>, project_root: &Path) -> PathBuf {
    let dir = match cli_dir {
        Some(dir) => {
            log::trace!("Save directory explicitly provided via CLI: {}", dir.display());
            dir.to_path_buf()
        }
        None => config.export.output_dir.clone(),
    };
    let dir = if dir.is_absolute() {
        dir
    } else {
        project_root.join(dir)
    };
    let filename = config
        .export
        .filename
        .clone()
        .unwrap_or_else(|| format!("{}.txt", config.get_effective_project_name(project_root)));
    dir.join(filename)
}

fn report_tokens(artifact: &ExportArtifact, text: &str) -> Result<()> {
    let bpe = cl100k_base().map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
    let headers: Vec<String> = artifact
        .records
        .iter()
        .map(|r| record_header(&r.path))
        .collect();
    let body = artifact.text.as_str();
    let mut rows = Vec::with_capacity(headers.len());
    let mut cursor = 0;
    for (index, record) in artifact.records.iter().enumerate() {
        let start = body[cursor..]
            .find(&headers[index])
            .map_or(cursor, |i| cursor + i);
        let after_header = (start + headers[index].len()).min(body.len());
        let end = headers
            .get(index + 1)
            .and_then(|next| body[after_header..].find(next.as_str()))
            .map_or(body.len(), |i| after_header + i);
        let chunk = &body[start..end];
        rows.push(TokenRow {
            path: record.path.clone(),
            bytes: chunk.len(),
            tokens: bpe.encode_ordinary(chunk).len(),
        });
        cursor = end;
    }
    let total = bpe.encode_ordinary(text).len();
    output::print_token_table(&rows, total);
    Ok(())
}
