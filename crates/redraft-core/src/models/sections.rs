//! Per-section metadata

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{DraftContent, SectionKind};

/// Where a section's current content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionState {
    /// Nothing filled in yet
    #[default]
    Empty,
    /// Accepted from generated content
    Applied,
    /// Carried over from an imported source document
    FromSource,
    /// Changed by hand
    Edited,
}

/// Display metadata for one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMeta {
    pub visible: bool,
    pub state: SectionState,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for SectionMeta {
    fn default() -> Self {
        Self {
            visible: true,
            state: SectionState::Empty,
            updated_at: None,
        }
    }
}

/// Metadata for every section of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionMetadata(BTreeMap<SectionKind, SectionMeta>);

impl Default for SectionMetadata {
    fn default() -> Self {
        Self(
            SectionKind::ALL
                .into_iter()
                .map(|kind| (kind, SectionMeta::default()))
                .collect(),
        )
    }
}

impl SectionMetadata {
    /// Metadata for `kind`, falling back to defaults for sections the row
    /// predates.
    #[must_use]
    pub fn get(&self, kind: SectionKind) -> SectionMeta {
        self.0.get(&kind).copied().unwrap_or_default()
    }

    pub fn set_visible(&mut self, kind: SectionKind, visible: bool) {
        self.0.entry(kind).or_default().visible = visible;
    }

    /// Record a lifecycle change; an empty section always reads as `Empty`.
    pub fn mark(
        &mut self,
        kind: SectionKind,
        state: SectionState,
        content: &DraftContent,
        at: DateTime<Utc>,
    ) {
        let meta = self.0.entry(kind).or_default();
        meta.state = if content.is_section_empty(kind) {
            SectionState::Empty
        } else {
            state
        };
        meta.updated_at = Some(at);
    }

    /// Copy visibility flags from `other`, keeping this metadata's states.
    pub fn adopt_visibility(&mut self, other: &Self) {
        for kind in SectionKind::ALL {
            self.set_visible(kind, other.get(kind).visible);
        }
    }

    /// Sections flagged visible, in canonical order.
    #[must_use]
    pub fn visible_kinds(&self) -> Vec<SectionKind> {
        SectionKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).visible)
            .collect()
    }

    /// Metadata derived from content alone: non-empty sections take `state`.
    #[must_use]
    pub fn derived(content: &DraftContent, state: SectionState, at: DateTime<Utc>) -> Self {
        let mut metadata = Self::default();
        for kind in SectionKind::ALL {
            if !content.is_section_empty(kind) {
                metadata.mark(kind, state, content, at);
            }
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_visible_and_empty() {
        let metadata = SectionMetadata::default();
        for kind in SectionKind::ALL {
            assert_eq!(metadata.get(kind), SectionMeta::default());
        }
        assert_eq!(metadata.visible_kinds(), SectionKind::ALL.to_vec());
    }

    #[test]
    fn mark_keeps_empty_sections_empty() {
        let mut metadata = SectionMetadata::default();
        let content = DraftContent::default();
        metadata.mark(SectionKind::Skills, SectionState::Applied, &content, Utc::now());
        assert_eq!(metadata.get(SectionKind::Skills).state, SectionState::Empty);
        assert!(metadata.get(SectionKind::Skills).updated_at.is_some());
    }

    #[test]
    fn visible_kinds_keep_canonical_order() {
        let mut metadata = SectionMetadata::default();
        metadata.set_visible(SectionKind::Skills, false);
        metadata.set_visible(SectionKind::Education, false);
        assert_eq!(
            metadata.visible_kinds(),
            vec![SectionKind::Summary, SectionKind::Experience, SectionKind::Projects]
        );
    }

    #[test]
    fn derived_marks_non_empty_sections() {
        let content = DraftContent {
            summary: "Platform engineer".into(),
            ..DraftContent::default()
        };
        let metadata = SectionMetadata::derived(&content, SectionState::FromSource, Utc::now());
        assert_eq!(metadata.get(SectionKind::Summary).state, SectionState::FromSource);
        assert_eq!(metadata.get(SectionKind::Skills).state, SectionState::Empty);
    }

    #[test]
    fn serializes_with_kebab_states() {
        let mut metadata = SectionMetadata::default();
        let content = DraftContent {
            skills: vec!["Go".into()],
            ..DraftContent::default()
        };
        metadata.mark(SectionKind::Skills, SectionState::FromSource, &content, Utc::now());
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains(r#""skills":{"visible":true,"state":"from-source""#));
        let parsed: SectionMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metadata);
    }
}
