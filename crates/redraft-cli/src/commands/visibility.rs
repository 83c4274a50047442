use redraft_core::models::SectionKind;

use crate::commands::common::{format_change, Workspace};
use crate::error::CliError;

pub async fn run_visibility(
    kind: SectionKind,
    visible: bool,
    draft: Option<&str>,
    workspace: &Workspace,
) -> Result<(), CliError> {
    workspace.target(draft).await?;
    let change = workspace
        .session
        .toggle_section_visibility(kind, visible)
        .await?;
    println!("{}", format_change(&change));
    Ok(())
}
