//! Data models for Redraft

mod content;
mod draft;
mod sections;

pub use content::{
    DraftContent, EducationEntry, ExperienceEntry, Keyed, ProjectEntry, SectionContent,
    SectionKind,
};
pub use draft::{
    normalize_name, ContentHash, Draft, DraftId, DraftOrigin, OwnerId, DEFAULT_TEMPLATE_ID,
    MAX_NAME_LEN,
};
pub use sections::{SectionMeta, SectionMetadata, SectionState};
