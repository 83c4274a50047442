use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] redraft_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No input provided; pass values, --file, or pipe content on stdin")]
    EmptyInput,
    #[error("Draft name cannot be empty")]
    EmptyName,
    #[error("Draft ID cannot be empty")]
    EmptyDraftId,
    #[error("Draft not found for id/prefix: {0}")]
    DraftNotFound(String),
    #[error("{0}")]
    AmbiguousDraftId(String),
    #[error("No active draft; pass an id or run `redraft show <id>` first")]
    NoActiveDraft,
    #[error("Owner cannot be empty")]
    InvalidOwner,
    #[error("Could not parse {section} content: {reason}")]
    InvalidSection { section: String, reason: String },
}
