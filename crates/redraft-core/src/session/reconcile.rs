//! Merge of locally known tips with an authoritative remote listing

use std::collections::HashMap;

use crate::models::{Draft, DraftId};

/// Whether `candidate` is a strictly newer state of its lineage than `known`.
///
/// Versions order content; in-place edits keep the version and only move
/// `updated_at`.
pub fn supersedes(candidate: &Draft, known: &Draft) -> bool {
    candidate.version > known.version
        || (candidate.version == known.version && candidate.updated_at > known.updated_at)
}

/// Merge remote tips into the local view.
///
/// The remote listing decides which lineages exist. Within a lineage the
/// newer tip wins, so a lagging read never rolls a local tip back.
pub fn merge(local: &[Draft], remote: Vec<Draft>) -> Vec<Draft> {
    let local_tips = local
        .iter()
        .map(|draft| (draft.lineage_id, draft))
        .collect::<HashMap<DraftId, &Draft>>();

    remote
        .into_iter()
        .map(|remote_tip| match local_tips.get(&remote_tip.lineage_id) {
            Some(local_tip) if supersedes(local_tip, &remote_tip) => {
                tracing::debug!(
                    "Keeping local v{} of lineage {} over older remote v{}",
                    local_tip.version,
                    remote_tip.lineage_id,
                    remote_tip.version
                );
                (*local_tip).clone()
            }
            _ => remote_tip,
        })
        .collect()
}
