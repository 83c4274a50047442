use std::path::{Path, PathBuf};

use redraft_core::export::{export_view, render_json_export, render_markdown_export, ExportView};

use crate::cli::ExportFormat;
use crate::commands::common::Workspace;
use crate::error::CliError;

pub async fn run_export(
    id: Option<&str>,
    format: ExportFormat,
    output_path: Option<&Path>,
    workspace: &Workspace,
) -> Result<(), CliError> {
    let draft = workspace.target(id).await?;
    let view = export_view(&draft);
    let rendered = render_export(&view, format)?;

    if let Some(path) = output_path {
        let path = export_destination(path, &view, format);
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

pub fn render_export(view: &ExportView, format: ExportFormat) -> Result<String, CliError> {
    match format {
        ExportFormat::Json => Ok(render_json_export(view)?),
        ExportFormat::Markdown => Ok(render_markdown_export(view)),
    }
}

/// A directory gets a file named after the draft.
pub fn export_destination(path: &Path, view: &ExportView, format: ExportFormat) -> PathBuf {
    if !path.is_dir() {
        return path.to_path_buf();
    }
    let stem = view
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>();
    let stem = stem
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let stem = if stem.is_empty() { "draft".to_string() } else { stem };
    let extension = redraft_core::export::ExportFormat::from(format).extension();
    path.join(format!("{stem}-v{}.{extension}", view.version))
}
