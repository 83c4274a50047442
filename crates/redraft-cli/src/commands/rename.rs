use crate::commands::common::{format_change, normalize_name_parts, Workspace};
use crate::error::CliError;

pub async fn run_rename(
    id: &str,
    name_parts: &[String],
    workspace: &Workspace,
) -> Result<(), CliError> {
    let name = normalize_name_parts(name_parts)?;
    let id = workspace.resolve(id, false).await?;
    let change = workspace.session.rename(id, &name).await?;
    println!("{}", format_change(&change));
    Ok(())
}

pub async fn run_job_link(
    id: &str,
    url: Option<&str>,
    workspace: &Workspace,
) -> Result<(), CliError> {
    let id = workspace.resolve(id, false).await?;
    let change = workspace.session.set_job_link(id, url).await?;
    println!("{}", format_change(&change));
    Ok(())
}
