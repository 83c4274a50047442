use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use redraft_core::models::SectionKind;

#[derive(Parser)]
#[command(name = "redraft")]
#[command(about = "Versioned resume drafts from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory holding the local draft cache
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Session config file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Owner whose drafts are used (defaults to "local")
    #[arg(long, global = true, value_name = "NAME")]
    pub owner: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty draft and make it active
    New {
        /// Draft name
        name: Vec<String>,
        /// Template id
        #[arg(long, value_name = "ID")]
        template: Option<String>,
    },
    /// Create a draft from resume content (JSON file or stdin)
    Import {
        /// Draft name
        name: Vec<String>,
        /// JSON file with the draft content
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// List drafts
    List {
        /// Include deleted drafts
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a draft and make it active
    Show {
        /// Draft ID or unique ID prefix (active draft when omitted)
        id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply generated content to one section
    Apply {
        #[arg(value_enum)]
        section: SectionArg,
        /// Section content; skills split on commas, records as JSON
        values: Vec<String>,
        /// Read the section content from a file
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
        /// Target draft instead of the active one
        #[arg(short, long, value_name = "ID")]
        draft: Option<String>,
    },
    /// Apply generated content to every section
    ApplyAll {
        /// JSON file with the full draft content
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
        /// Target draft instead of the active one
        #[arg(short, long, value_name = "ID")]
        draft: Option<String>,
    },
    /// Edit one section by hand
    Edit {
        #[arg(value_enum)]
        section: SectionArg,
        /// Section content; skills split on commas, records as JSON
        values: Vec<String>,
        /// Read the section content from a file
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
        /// Target draft instead of the active one
        #[arg(short, long, value_name = "ID")]
        draft: Option<String>,
    },
    /// Show or hide a section
    Visibility {
        #[arg(value_enum)]
        section: SectionArg,
        #[arg(value_enum)]
        state: Toggle,
        /// Target draft instead of the active one
        #[arg(short, long, value_name = "ID")]
        draft: Option<String>,
    },
    /// Rename a draft
    Rename {
        /// Draft ID or unique ID prefix
        id: String,
        /// New name
        name: Vec<String>,
    },
    /// Set or clear the job posting link of a draft
    JobLink {
        /// Draft ID or unique ID prefix
        id: String,
        /// http(s) link; clears the link when omitted
        url: Option<String>,
    },
    /// Copy a draft into a new one
    Duplicate {
        /// Draft ID or unique ID prefix
        id: String,
    },
    /// Delete a draft (recoverable with `undelete`)
    Delete {
        /// Draft ID or unique ID prefix
        id: String,
    },
    /// Bring back a deleted draft
    Undelete {
        /// Draft ID or unique ID prefix
        id: String,
    },
    /// Permanently remove a draft and all of its versions
    Purge {
        /// Draft ID or unique ID prefix
        id: String,
    },
    /// List every version of a draft
    History {
        /// Draft ID or unique ID prefix (active draft when omitted)
        id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare two versions of one draft
    Diff {
        /// Older version ID or prefix
        from: String,
        /// Newer version ID or prefix
        to: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Make a past version current again
    Restore {
        /// Version ID or unique ID prefix
        id: String,
    },
    /// Export a draft
    Export {
        /// Draft ID or unique ID prefix (active draft when omitted)
        id: Option<String>,
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
        /// Optional output path, file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for redraft_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SectionArg {
    Summary,
    Skills,
    Experience,
    Education,
    Projects,
}

impl From<SectionArg> for SectionKind {
    fn from(section: SectionArg) -> Self {
        match section {
            SectionArg::Summary => Self::Summary,
            SectionArg::Skills => Self::Skills,
            SectionArg::Experience => Self::Experience,
            SectionArg::Education => Self::Education,
            SectionArg::Projects => Self::Projects,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}
