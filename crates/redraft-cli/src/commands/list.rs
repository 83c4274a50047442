use crate::commands::common::{
    draft_to_list_item, format_draft_lines, now_ms, DraftListItem, Workspace,
};
use crate::error::CliError;

pub async fn run_list(all: bool, as_json: bool, workspace: &Workspace) -> Result<(), CliError> {
    let now = now_ms();
    let mut items = workspace
        .session
        .drafts()
        .iter()
        .map(|draft| draft_to_list_item(draft, false, now))
        .collect::<Vec<DraftListItem>>();
    if all {
        let deleted = workspace.session.deleted_drafts().await?;
        items.extend(deleted.iter().map(|draft| draft_to_list_item(draft, true, now)));
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_draft_lines(&items) {
            println!("{line}");
        }
    }

    Ok(())
}
