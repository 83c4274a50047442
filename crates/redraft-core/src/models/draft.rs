//! Draft model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::{DraftContent, SectionKind};
use super::sections::SectionMetadata;

/// Maximum length of a draft's display name, in characters
pub const MAX_NAME_LEN: usize = 120;

/// Template used when the caller does not pick one
pub const DEFAULT_TEMPLATE_ID: &str = "classic";

/// A unique identifier for a draft, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DraftId(Uuid);

impl DraftId {
    /// Create a new unique draft ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for DraftId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DraftId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identity of the user owning a set of drafts, as issued by auth
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Wrap an owner id; returns `None` for blank input.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What produced a draft version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DraftOrigin {
    Manual,
    Generation,
    AutoSave,
    Restore,
    Duplicate,
    Import,
}

impl DraftOrigin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Generation => "generation",
            Self::AutoSave => "auto-save",
            Self::Restore => "restore",
            Self::Duplicate => "duplicate",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for DraftOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DraftOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "generation" => Ok(Self::Generation),
            "auto-save" => Ok(Self::AutoSave),
            "restore" => Ok(Self::Restore),
            "duplicate" => Ok(Self::Duplicate),
            "import" => Ok(Self::Import),
            other => Err(format!("unknown draft origin '{other}'")),
        }
    }
}

/// Hex-encoded SHA-256 digest of a draft's hash-relevant state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub(crate) const fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for display
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single versioned resume snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Unique identifier of this version
    pub id: DraftId,
    /// Owning user
    pub owner_id: OwnerId,
    /// Id of version 1 of this lineage
    pub lineage_id: DraftId,
    /// Version this one was minted from
    pub parent_draft_id: Option<DraftId>,
    /// Display name
    pub name: String,
    /// Presentation template
    pub template_id: String,
    /// Job posting the draft targets
    pub job_link: Option<String>,
    /// Structured resume content
    pub content: DraftContent,
    /// Per-section visibility and lifecycle state
    pub sections: SectionMetadata,
    /// Version number within the lineage, starting at 1
    pub version: u32,
    /// Whether this is the lineage's current version
    pub is_active: bool,
    /// Soft delete flag
    pub is_archived: bool,
    /// What produced this version
    pub origin: DraftOrigin,
    /// Digest used for change detection
    pub content_hash: ContentHash,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    /// Whether this draft is the first version of its lineage
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_draft_id.is_none()
    }

    /// Sections to render, in canonical order
    #[must_use]
    pub fn visible_sections(&self) -> Vec<SectionKind> {
        self.sections.visible_kinds()
    }
}

/// Validate and normalize a draft display name.
pub fn normalize_name(name: &str) -> crate::Result<String> {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(crate::Error::Validation(
            "draft name cannot be empty".to_string(),
        ));
    }
    if collapsed.chars().count() > MAX_NAME_LEN {
        return Err(crate::Error::Validation(format!(
            "draft name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(collapsed)
}
