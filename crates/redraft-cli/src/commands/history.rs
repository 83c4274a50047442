use crate::commands::common::{
    draft_to_list_item, format_change, format_diff_lines, format_history_lines, now_ms, Workspace,
};
use crate::error::CliError;

pub async fn run_history(
    id: Option<&str>,
    as_json: bool,
    workspace: &Workspace,
) -> Result<(), CliError> {
    let id = match id {
        Some(query) => workspace.resolve(query, false).await?,
        None => workspace.target(None).await?.id,
    };
    let family = workspace.session.history(id).await?;
    let now = now_ms();

    if as_json {
        let items = family
            .iter()
            .map(|draft| draft_to_list_item(draft, false, now))
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_history_lines(&family, now) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_diff(
    from: &str,
    to: &str,
    as_json: bool,
    workspace: &Workspace,
) -> Result<(), CliError> {
    let from = workspace.resolve(from, false).await?;
    let to = workspace.resolve(to, false).await?;
    let diff = workspace.session.compare(from, to).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
    } else {
        for line in format_diff_lines(&diff) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_restore(id: &str, workspace: &Workspace) -> Result<(), CliError> {
    let id = workspace.resolve(id, false).await?;
    let change = workspace.session.restore_version(id).await?;
    println!("{}", format_change(&change));
    Ok(())
}
