//! Resume content model
//!
//! Content is a closed set of section kinds with an explicit shape per kind,
//! so hashing and diffing can match on them exhaustively.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The sections a draft can carry, in canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Summary,
    Skills,
    Experience,
    Education,
    Projects,
}

impl SectionKind {
    /// Every kind in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Summary,
        Self::Skills,
        Self::Experience,
        Self::Education,
        Self::Projects,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Skills => "skills",
            Self::Experience => "experience",
            Self::Education => "education",
            Self::Projects => "projects",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "skills" => Ok(Self::Skills),
            "experience" => Ok(Self::Experience),
            "education" => Ok(Self::Education),
            "projects" => Ok(Self::Projects),
            other => Err(format!("unknown section kind '{other}'")),
        }
    }
}

/// A single job held.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub employer: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

/// A degree or course of study.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_date: Option<String>,
    #[serde(default)]
    pub details: Vec<String>,
}

/// A side or portfolio project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

/// Records that can be matched across versions by a stable key.
pub trait Keyed {
    /// Key identifying "the same" record in two versions.
    fn stable_key(&self) -> String;
}

fn key_part(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Keyed for ExperienceEntry {
    fn stable_key(&self) -> String {
        format!("{}|{}", key_part(&self.employer), key_part(&self.title))
    }
}

impl Keyed for EducationEntry {
    fn stable_key(&self) -> String {
        format!("{}|{}", key_part(&self.institution), key_part(&self.degree))
    }
}

impl Keyed for ProjectEntry {
    fn stable_key(&self) -> String {
        key_part(&self.name)
    }
}

/// Full structured content of a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContent {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
}

impl DraftContent {
    /// Extract one section as a tagged value.
    #[must_use]
    pub fn section(&self, kind: SectionKind) -> SectionContent {
        match kind {
            SectionKind::Summary => SectionContent::Summary(self.summary.clone()),
            SectionKind::Skills => SectionContent::Skills(self.skills.clone()),
            SectionKind::Experience => SectionContent::Experience(self.experience.clone()),
            SectionKind::Education => SectionContent::Education(self.education.clone()),
            SectionKind::Projects => SectionContent::Projects(self.projects.clone()),
        }
    }

    /// Replace one section, leaving the others untouched.
    pub fn set_section(&mut self, section: SectionContent) {
        match section {
            SectionContent::Summary(summary) => self.summary = summary,
            SectionContent::Skills(skills) => self.skills = skills,
            SectionContent::Experience(entries) => self.experience = entries,
            SectionContent::Education(entries) => self.education = entries,
            SectionContent::Projects(entries) => self.projects = entries,
        }
    }

    /// Whether a section has nothing worth rendering.
    #[must_use]
    pub fn is_section_empty(&self, kind: SectionKind) -> bool {
        match kind {
            SectionKind::Summary => self.summary.trim().is_empty(),
            SectionKind::Skills => self.skills.is_empty(),
            SectionKind::Experience => self.experience.is_empty(),
            SectionKind::Education => self.education.is_empty(),
            SectionKind::Projects => self.projects.is_empty(),
        }
    }
}

/// One section's payload, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum SectionContent {
    Summary(String),
    Skills(Vec<String>),
    Experience(Vec<ExperienceEntry>),
    Education(Vec<EducationEntry>),
    Projects(Vec<ProjectEntry>),
}

impl SectionContent {
    #[must_use]
    pub const fn kind(&self) -> SectionKind {
        match self {
            Self::Summary(_) => SectionKind::Summary,
            Self::Skills(_) => SectionKind::Skills,
            Self::Experience(_) => SectionKind::Experience,
            Self::Education(_) => SectionKind::Education,
            Self::Projects(_) => SectionKind::Projects,
        }
    }

    /// Trim text and drop blank list items so cosmetic whitespace never
    /// produces a new version.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Summary(text) => Self::Summary(text.trim().to_string()),
            Self::Skills(skills) => Self::Skills(normalize_list(skills)),
            Self::Experience(entries) => Self::Experience(
                entries
                    .into_iter()
                    .map(|mut entry| {
                        entry.bullets = normalize_list(entry.bullets);
                        entry
                    })
                    .collect(),
            ),
            Self::Education(entries) => Self::Education(
                entries
                    .into_iter()
                    .map(|mut entry| {
                        entry.details = normalize_list(entry.details);
                        entry
                    })
                    .collect(),
            ),
            Self::Projects(entries) => Self::Projects(
                entries
                    .into_iter()
                    .map(|mut entry| {
                        entry.bullets = normalize_list(entry.bullets);
                        entry
                    })
                    .collect(),
            ),
        }
    }
}

fn normalize_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
