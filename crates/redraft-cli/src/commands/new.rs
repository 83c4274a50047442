use std::path::Path;

use crate::commands::common::{normalize_name_parts, parse_content, read_input, Workspace};
use crate::error::CliError;

pub async fn run_new(
    name_parts: &[String],
    template: Option<&str>,
    workspace: &Workspace,
) -> Result<(), CliError> {
    let name = normalize_name_parts(name_parts)?;
    let draft = workspace.session.create_draft(&name, template).await?;
    println!("{}", draft.id);
    Ok(())
}

pub async fn run_import(
    name_parts: &[String],
    file: Option<&Path>,
    workspace: &Workspace,
) -> Result<(), CliError> {
    let name = normalize_name_parts(name_parts)?;
    let content = parse_content(&read_input(&[], "\n", file)?)?;
    let draft = workspace.session.import_draft(&name, content).await?;
    println!("{}", draft.id);
    Ok(())
}
