//! Lineage bookkeeping: minting, family walks, invariant checks, restore plans

use std::collections::HashMap;

use chrono::Utc;

use super::diff::{diff, DraftDiff};
use super::hash::{content_hash, draft_hash, HashMetadata};
use crate::error::{Error, Result};
use crate::models::{Draft, DraftContent, DraftId, DraftOrigin, OwnerId, SectionMetadata};

/// Build version 1 of a new lineage.
#[must_use]
pub fn start_lineage(
    owner_id: OwnerId,
    name: String,
    template_id: String,
    content: DraftContent,
    sections: SectionMetadata,
    origin: DraftOrigin,
) -> Draft {
    let id = DraftId::new();
    let now = Utc::now();
    let content_hash = content_hash(
        &content,
        HashMetadata {
            template_id: &template_id,
        },
    );

    Draft {
        id,
        owner_id,
        lineage_id: id,
        parent_draft_id: None,
        name,
        template_id,
        job_link: None,
        content,
        sections,
        version: 1,
        is_active: true,
        is_archived: false,
        origin,
        content_hash,
        created_at: now,
        updated_at: now,
    }
}

/// Build the unsaved successor of `prev` carrying new content.
#[must_use]
pub fn mint_version(
    prev: &Draft,
    content: DraftContent,
    sections: SectionMetadata,
    origin: DraftOrigin,
) -> Draft {
    let now = Utc::now();
    let mut next = Draft {
        id: DraftId::new(),
        owner_id: prev.owner_id.clone(),
        lineage_id: prev.lineage_id,
        parent_draft_id: Some(prev.id),
        name: prev.name.clone(),
        template_id: prev.template_id.clone(),
        job_link: prev.job_link.clone(),
        content,
        sections,
        version: prev.version + 1,
        is_active: true,
        is_archived: false,
        origin,
        content_hash: prev.content_hash.clone(),
        created_at: now,
        updated_at: now,
    };
    next.content_hash = draft_hash(&next);
    next
}

fn root_of(index: &HashMap<DraftId, &Draft>, start: DraftId) -> Result<DraftId> {
    let mut current = start;
    // A well-formed chain is at most as long as the collection.
    for _ in 0..=index.len() {
        let Some(draft) = index.get(&current) else {
            return Ok(current);
        };
        match draft.parent_draft_id {
            Some(parent) if index.contains_key(&parent) => current = parent,
            _ => return Ok(current),
        }
    }
    Err(Error::Invariant(format!(
        "parent links starting at {start} form a cycle"
    )))
}

/// Every version sharing a root with `member`, newest first.
pub fn family(drafts: &[Draft], member: DraftId) -> Result<Vec<Draft>> {
    let index = drafts
        .iter()
        .map(|draft| (draft.id, draft))
        .collect::<HashMap<_, _>>();

    if !index.contains_key(&member) {
        return Err(Error::NotFound(member.to_string()));
    }
    let root = root_of(&index, member)?;

    let mut members = Vec::new();
    for draft in drafts {
        if root_of(&index, draft.id)? == root {
            members.push(draft.clone());
        }
    }
    members.sort_by(|a, b| {
        b.version
            .cmp(&a.version)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    Ok(members)
}

/// The active member of a family.
pub fn tip(family: &[Draft]) -> Result<&Draft> {
    let mut active = family.iter().filter(|draft| draft.is_active);
    match (active.next(), active.next()) {
        (Some(draft), None) => Ok(draft),
        (None, _) => Err(Error::Invariant("lineage has no active version".into())),
        (Some(first), Some(second)) => Err(Error::Invariant(format!(
            "lineage has several active versions ({} and {})",
            first.id, second.id
        ))),
    }
}

/// Verify single-active and strictly increasing versions along parent links,
/// walking from the active member down to version 1.
pub fn check_lineage(family: &[Draft]) -> Result<()> {
    let active = tip(family)?;
    let index = family
        .iter()
        .map(|draft| (draft.id, draft))
        .collect::<HashMap<_, _>>();

    for draft in family {
        if let Some(parent_id) = draft.parent_draft_id {
            if let Some(parent) = index.get(&parent_id) {
                if parent.version >= draft.version {
                    return Err(Error::Invariant(format!(
                        "version {} of {} does not exceed its parent's version {}",
                        draft.version, draft.id, parent.version
                    )));
                }
            }
        }
    }

    let mut current = active;
    let mut steps = 0;
    while let Some(parent_id) = current.parent_draft_id {
        let parent = index.get(&parent_id).ok_or_else(|| {
            Error::Invariant(format!("parent {parent_id} of {} is missing", current.id))
        })?;
        current = *parent;
        steps += 1;
        if steps > family.len() {
            return Err(Error::Invariant("parent links form a cycle".into()));
        }
    }
    if current.version != 1 {
        return Err(Error::Invariant(format!(
            "lineage root {} has version {} instead of 1",
            current.id, current.version
        )));
    }
    Ok(())
}

/// Diff two members of a family; missing ids are `NotFound`, never an empty diff.
pub fn compare(family: &[Draft], from: DraftId, to: DraftId) -> Result<DraftDiff> {
    let find = |id: DraftId| {
        family
            .iter()
            .find(|draft| draft.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    };
    Ok(diff(find(from)?, find(to)?))
}

/// Outcome of planning a restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestorePlan {
    /// The target's content is already what the tip holds.
    AlreadyCurrent(Draft),
    /// Successor of the current tip carrying the target's content.
    Mint(Draft),
}

/// Plan restoring `target`: history only moves forward, so the restored
/// content is appended on top of the current tip.
pub fn plan_restore(family: &[Draft], target: DraftId) -> Result<RestorePlan> {
    let restored = family
        .iter()
        .find(|draft| draft.id == target)
        .ok_or_else(|| Error::NotFound(target.to_string()))?;
    let current = tip(family)?;

    if restored.id == current.id {
        return Ok(RestorePlan::AlreadyCurrent(current.clone()));
    }

    let mut sections = restored.sections.clone();
    sections.adopt_visibility(&current.sections);
    let candidate = mint_version(
        current,
        restored.content.clone(),
        sections,
        DraftOrigin::Restore,
    );

    if candidate.content_hash == current.content_hash {
        return Ok(RestorePlan::AlreadyCurrent(current.clone()));
    }
    Ok(RestorePlan::Mint(candidate))
}
