use crate::commands::common::Workspace;
use crate::error::CliError;

pub async fn run_duplicate(id: &str, workspace: &Workspace) -> Result<(), CliError> {
    let id = workspace.resolve(id, false).await?;
    let copy = workspace.session.duplicate(id).await?;
    println!("{}", copy.id);
    Ok(())
}

pub async fn run_delete(id: &str, workspace: &Workspace) -> Result<(), CliError> {
    let id = workspace.resolve(id, false).await?;
    workspace.session.delete_draft(id).await?;
    println!("{id}");
    Ok(())
}

pub async fn run_undelete(id: &str, workspace: &Workspace) -> Result<(), CliError> {
    let id = workspace.resolve(id, true).await?;
    let tip = workspace.session.restore_deleted(id).await?;
    println!("{}", tip.id);
    Ok(())
}

pub async fn run_purge(id: &str, workspace: &Workspace) -> Result<(), CliError> {
    let id = workspace.resolve(id, true).await?;
    workspace.session.permanent_delete(id).await?;
    println!("{id}");
    Ok(())
}
