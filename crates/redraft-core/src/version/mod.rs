//! Version engine
//!
//! Pure functions, no I/O: digests decide whether an edit is worth a version,
//! minting links the successor to its parent, and lineage helpers walk parent
//! links to answer history, diff and restore questions. Persisting what these
//! functions produce is the store's job.

mod diff;
mod hash;
mod lineage;

pub use diff::{
    diff, diff_list, diff_records, diff_text, ChangeTag, DraftDiff, ListDiff, RecordChange,
    RecordDiff, TextChange, TextDiff, VersionRef,
};
pub use hash::{content_hash, draft_hash, should_version, HashMetadata};
pub use lineage::{
    check_lineage, compare, family, mint_version, plan_restore, start_lineage, tip, RestorePlan,
};
