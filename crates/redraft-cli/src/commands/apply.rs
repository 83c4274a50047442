use std::path::Path;

use redraft_core::models::SectionKind;

use crate::commands::common::{
    format_change, parse_content, parse_section, read_input, value_separator, Workspace,
};
use crate::error::CliError;

/// Whether a section change counts as generated content or a hand edit
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SectionSource {
    Generated,
    Manual,
}

pub async fn run_apply(
    kind: SectionKind,
    values: &[String],
    file: Option<&Path>,
    draft: Option<&str>,
    source: SectionSource,
    workspace: &Workspace,
) -> Result<(), CliError> {
    let section = parse_section(kind, &read_input(values, value_separator(kind), file)?)?;
    workspace.target(draft).await?;

    let change = match source {
        SectionSource::Generated => workspace.session.apply_section(section).await?,
        SectionSource::Manual => workspace.session.edit_section(section).await?,
    };
    println!("{}", format_change(&change));
    Ok(())
}

pub async fn run_apply_all(
    file: Option<&Path>,
    draft: Option<&str>,
    workspace: &Workspace,
) -> Result<(), CliError> {
    let content = parse_content(&read_input(&[], "\n", file)?)?;
    workspace.target(draft).await?;

    let change = workspace.session.apply_all(content).await?;
    println!("{}", format_change(&change));
    Ok(())
}
