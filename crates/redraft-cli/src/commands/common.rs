use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use chrono::Utc;
use redraft_core::db::{DraftStore, SqliteDraftStore};
use redraft_core::models::{DraftContent, Keyed, SectionContent, SectionKind, SectionState};
use redraft_core::session::Change;
use redraft_core::version::{DraftDiff, RecordDiff};
use redraft_core::{Draft, DraftId, DraftSession, LocalCache, OwnerId, SessionConfig};
use serde::Serialize;

use crate::cli::Cli;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;
const DEFAULT_OWNER: &str = "local";

/// Paths and identity resolved from flags, environment and platform defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub cache_dir: PathBuf,
    pub config_path: Option<PathBuf>,
    pub owner: String,
}

impl Settings {
    pub fn resolve(cli: &Cli) -> Self {
        Self {
            db_path: resolve_db_path(cli.db_path.clone()),
            cache_dir: resolve_cache_dir(cli.cache_dir.clone()),
            config_path: cli
                .config
                .clone()
                .or_else(|| env::var_os("REDRAFT_CONFIG").map(PathBuf::from)),
            owner: resolve_owner(cli.owner.clone(), env::var("REDRAFT_OWNER").ok()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DraftListItem {
    pub id: String,
    pub lineage_id: String,
    pub name: String,
    pub version: u32,
    pub content_hash: String,
    pub job_link: Option<String>,
    pub updated_at: i64,
    pub relative_time: String,
    pub deleted: bool,
}

/// An open session plus the store handle used for id lookups
pub struct Workspace {
    pub session: DraftSession<SqliteDraftStore>,
    store: SqliteDraftStore,
}

impl Workspace {
    /// Open the local store and cache, reconciling when the cache is stale.
    pub async fn open(settings: &Settings) -> Result<Self, CliError> {
        let config = match &settings.config_path {
            Some(path) => SessionConfig::load_from_path(path)?,
            None => SessionConfig::default(),
        };
        let owner = OwnerId::new(settings.owner.clone()).ok_or(CliError::InvalidOwner)?;
        let store = SqliteDraftStore::open_path(&settings.db_path)?;
        let cache = LocalCache::new(&settings.cache_dir, config.cache_ttl);
        let session = DraftSession::open(owner, store.clone(), cache, config)?;
        session.reconcile_if_stale().await?;
        Ok(Self { session, store })
    }

    /// Resolve a full id or unique prefix against every stored version.
    pub async fn resolve(&self, query: &str, include_deleted: bool) -> Result<DraftId, CliError> {
        let query = normalize_draft_identifier(query)?;
        if let Ok(id) = query.parse::<DraftId>() {
            return Ok(id);
        }

        let owner = self.session.owner();
        let mut candidates = self.store.list(owner, false).await?;
        if include_deleted {
            for tip in self.store.list_archived(owner).await? {
                candidates.extend(self.store.list_family(owner, tip.lineage_id).await?);
            }
        }
        match_draft_prefix(&query, &candidates)
    }

    /// The draft a command works on: the one named by `query`, which then
    /// becomes active, or the active draft.
    pub async fn target(&self, query: Option<&str>) -> Result<Draft, CliError> {
        match query {
            Some(query) => {
                let id = self.resolve(query, false).await?;
                Ok(self.session.load_one(id).await?)
            }
            None => self.session.active_draft().ok_or(CliError::NoActiveDraft),
        }
    }
}

pub fn match_draft_prefix(query: &str, candidates: &[Draft]) -> Result<DraftId, CliError> {
    let prefix = query.to_ascii_lowercase();
    let mut matching_ids = candidates
        .iter()
        .map(|draft| draft.id)
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect::<Vec<_>>();
    matching_ids.sort_unstable();
    matching_ids.dedup();

    match matching_ids.as_slice() {
        [] => Err(CliError::DraftNotFound(query.to_string())),
        [id] => Ok(*id),
        _ => {
            let options = matching_ids
                .iter()
                .take(3)
                .map(|id| short_id(*id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousDraftId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: DraftId) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

pub fn draft_to_list_item(draft: &Draft, deleted: bool, now_ms: i64) -> DraftListItem {
    let updated_at = draft.updated_at.timestamp_millis();
    DraftListItem {
        id: draft.id.to_string(),
        lineage_id: draft.lineage_id.to_string(),
        name: draft.name.clone(),
        version: draft.version,
        content_hash: draft.content_hash.to_string(),
        job_link: draft.job_link.clone(),
        updated_at,
        relative_time: format_relative_time(updated_at, now_ms),
        deleted,
    }
}

pub fn format_draft_lines(items: &[DraftListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let short = item.id.chars().take(SHORT_ID_LEN).collect::<String>();
            let name = compact(&item.name, 40);
            let version = format!("v{}", item.version);
            let line = format!(
                "{short:<13}  {name:<40}  {version:<4}  {}",
                item.relative_time
            );
            if item.deleted {
                format!("{line}  (deleted)")
            } else {
                line
            }
        })
        .collect()
}

pub fn format_history_lines(family: &[Draft], now_ms: i64) -> Vec<String> {
    family
        .iter()
        .map(|draft| {
            let marker = if draft.is_active { '*' } else { ' ' };
            let version = format!("v{}", draft.version);
            format!(
                "{marker} {version:<4}  {:<13}  {}  {:<10}  {}",
                short_id(draft.id),
                draft.content_hash.short(),
                draft.origin.as_str(),
                format_relative_time(draft.updated_at.timestamp_millis(), now_ms)
            )
        })
        .collect()
}

pub fn format_draft_details(draft: &Draft) -> Vec<String> {
    let mut lines = vec![
        format!("{}  v{}", draft.name, draft.version),
        format!("id:        {}", draft.id),
        format!("lineage:   {}", draft.lineage_id),
        format!("hash:      {}", draft.content_hash),
        format!("template:  {}", draft.template_id),
        format!("origin:    {}", draft.origin),
    ];
    if let Some(link) = &draft.job_link {
        lines.push(format!("job link:  {link}"));
    }
    lines.push(String::new());
    for kind in SectionKind::ALL {
        let meta = draft.sections.get(kind);
        let visibility = if meta.visible { "shown" } else { "hidden" };
        let state = match meta.state {
            SectionState::Empty => "empty",
            SectionState::Applied => "applied",
            SectionState::FromSource => "from source",
            SectionState::Edited => "edited",
        };
        lines.push(format!("{:<11} {visibility:<7} {state}", kind.as_str()));
    }
    lines
}

pub fn format_diff_lines(diff: &DraftDiff) -> Vec<String> {
    let mut lines = vec![format!("v{} -> v{}", diff.from.version, diff.to.version)];
    if diff.is_empty() {
        lines.push("no changes".to_string());
        return lines;
    }

    for kind in diff.changed_sections() {
        lines.push(format!("[{kind}]"));
        match kind {
            SectionKind::Summary => {
                for word in diff.summary.deleted() {
                    lines.push(format!("- {word}"));
                }
                for word in diff.summary.inserted() {
                    lines.push(format!("+ {word}"));
                }
            }
            SectionKind::Skills => {
                lines.extend(diff.skills.removed.iter().map(|skill| format!("- {skill}")));
                lines.extend(diff.skills.added.iter().map(|skill| format!("+ {skill}")));
            }
            SectionKind::Experience => push_record_lines(&mut lines, &diff.experience),
            SectionKind::Education => push_record_lines(&mut lines, &diff.education),
            SectionKind::Projects => push_record_lines(&mut lines, &diff.projects),
        }
    }
    lines
}

fn push_record_lines<T: Keyed>(lines: &mut Vec<String>, diff: &RecordDiff<T>) {
    lines.extend(
        diff.removed
            .iter()
            .map(|record| format!("- {}", record.stable_key())),
    );
    lines.extend(
        diff.added
            .iter()
            .map(|record| format!("+ {}", record.stable_key())),
    );
    lines.extend(diff.modified.iter().map(|change| format!("~ {}", change.key)));
}

pub fn format_change(change: &Change) -> String {
    match change {
        Change::Minted(draft) => format!(
            "{}  v{}  {}",
            draft.id,
            draft.version,
            draft.content_hash.short()
        ),
        Change::Updated(draft) => format!("{}  v{}  (updated)", draft.id, draft.version),
        Change::Unchanged => "unchanged".to_string(),
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn compact(value: &str, max_chars: usize) -> String {
    redraft_core::util::compact_text(value, max_chars)
}

pub fn normalize_draft_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyDraftId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_name_parts(parts: &[String]) -> Result<String, CliError> {
    let joined = parts.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyName)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Raw input from a file, the positional values, or piped stdin, in that
/// order.
pub fn read_input(
    values: &[String],
    separator: &str,
    file: Option<&Path>,
) -> Result<String, CliError> {
    if let Some(path) = file {
        return Ok(std::fs::read_to_string(path)?);
    }
    if !values.is_empty() {
        return Ok(values.join(separator));
    }
    read_piped_stdin()?.ok_or(CliError::EmptyInput)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    if buffer.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(buffer))
    }
}

/// Parse section input: summary is plain text, skills are split on commas and
/// newlines, record sections are a JSON array.
pub fn parse_section(kind: SectionKind, raw: &str) -> Result<SectionContent, CliError> {
    let invalid = |error: serde_json::Error| CliError::InvalidSection {
        section: kind.to_string(),
        reason: error.to_string(),
    };

    match kind {
        SectionKind::Summary => Ok(SectionContent::Summary(raw.trim().to_string())),
        SectionKind::Skills => Ok(SectionContent::Skills(
            raw.split([',', '\n'])
                .map(str::trim)
                .filter(|skill| !skill.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        SectionKind::Experience => serde_json::from_str(raw)
            .map(SectionContent::Experience)
            .map_err(invalid),
        SectionKind::Education => serde_json::from_str(raw)
            .map(SectionContent::Education)
            .map_err(invalid),
        SectionKind::Projects => serde_json::from_str(raw)
            .map(SectionContent::Projects)
            .map_err(invalid),
    }
}

/// Separator used when section content comes from positional values.
pub const fn value_separator(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::Summary => " ",
        _ => "\n",
    }
}

pub fn parse_content(raw: &str) -> Result<DraftContent, CliError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("REDRAFT_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("redraft")
        .join("drafts.db")
}

pub fn resolve_cache_dir(cli_cache_dir: Option<PathBuf>) -> PathBuf {
    cli_cache_dir
        .or_else(|| env::var_os("REDRAFT_CACHE_DIR").map(PathBuf::from))
        .unwrap_or_else(default_cache_dir)
}

pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("redraft")
}

pub fn resolve_owner(cli_owner: Option<String>, env_owner: Option<String>) -> String {
    cli_owner
        .or(env_owner)
        .map(|owner| owner.trim().to_string())
        .filter(|owner| !owner.is_empty())
        .unwrap_or_else(|| DEFAULT_OWNER.to_string())
}
