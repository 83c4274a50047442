use crate::commands::common::{format_draft_details, Workspace};
use crate::error::CliError;

pub async fn run_show(id: Option<&str>, as_json: bool, workspace: &Workspace) -> Result<(), CliError> {
    let draft = workspace.target(id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
    } else {
        for line in format_draft_details(&draft) {
            println!("{line}");
        }
    }

    Ok(())
}
