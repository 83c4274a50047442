//! Redraft CLI - versioned resume drafts from the terminal
//!
//! Every command runs against the local draft store through a draft session,
//! so the cache, retry and versioning rules are the same as in any other
//! client.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::apply::{run_apply, run_apply_all, SectionSource};
use crate::commands::common::{Settings, Workspace};
use crate::commands::export::run_export;
use crate::commands::history::{run_diff, run_history, run_restore};
use crate::commands::lifecycle::{run_delete, run_duplicate, run_purge, run_undelete};
use crate::commands::list::run_list;
use crate::commands::new::{run_import, run_new};
use crate::commands::rename::{run_job_link, run_rename};
use crate::commands::show::run_show;
use crate::commands::visibility::run_visibility;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("redraft=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::resolve(&cli);
    let workspace = Workspace::open(&settings).await?;

    match cli.command {
        Commands::New { name, template } => {
            run_new(&name, template.as_deref(), &workspace).await?;
        }
        Commands::Import { name, file } => run_import(&name, file.as_deref(), &workspace).await?,
        Commands::List { all, json } => run_list(all, json, &workspace).await?,
        Commands::Show { id, json } => run_show(id.as_deref(), json, &workspace).await?,
        Commands::Apply {
            section,
            values,
            file,
            draft,
        } => {
            run_apply(
                section.into(),
                &values,
                file.as_deref(),
                draft.as_deref(),
                SectionSource::Generated,
                &workspace,
            )
            .await?;
        }
        Commands::ApplyAll { file, draft } => {
            run_apply_all(file.as_deref(), draft.as_deref(), &workspace).await?;
        }
        Commands::Edit {
            section,
            values,
            file,
            draft,
        } => {
            run_apply(
                section.into(),
                &values,
                file.as_deref(),
                draft.as_deref(),
                SectionSource::Manual,
                &workspace,
            )
            .await?;
        }
        Commands::Visibility {
            section,
            state,
            draft,
        } => {
            run_visibility(section.into(), state.is_on(), draft.as_deref(), &workspace).await?;
        }
        Commands::Rename { id, name } => run_rename(&id, &name, &workspace).await?,
        Commands::JobLink { id, url } => run_job_link(&id, url.as_deref(), &workspace).await?,
        Commands::Duplicate { id } => run_duplicate(&id, &workspace).await?,
        Commands::Delete { id } => run_delete(&id, &workspace).await?,
        Commands::Undelete { id } => run_undelete(&id, &workspace).await?,
        Commands::Purge { id } => run_purge(&id, &workspace).await?,
        Commands::History { id, json } => run_history(id.as_deref(), json, &workspace).await?,
        Commands::Diff { from, to, json } => run_diff(&from, &to, json, &workspace).await?,
        Commands::Restore { id } => run_restore(&id, &workspace).await?,
        Commands::Export { id, format, output } => {
            run_export(id.as_deref(), format, output.as_deref(), &workspace).await?;
        }
    }

    Ok(())
}
