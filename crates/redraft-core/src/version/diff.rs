//! Structured comparison of two draft versions

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{
    Draft, DraftContent, DraftId, EducationEntry, ExperienceEntry, Keyed, ProjectEntry,
    SectionKind,
};

/// Above this many token pairs the summary diff degrades to replace-all.
const MAX_TEXT_DIFF_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTag {
    Equal,
    Insert,
    Delete,
}

/// A run of words sharing one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChange {
    pub tag: ChangeTag,
    pub text: String,
}

/// Word-level diff of a long text field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextDiff {
    pub changes: Vec<TextChange>,
}

impl TextDiff {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.changes.iter().all(|change| change.tag == ChangeTag::Equal)
    }

    /// Words present only in the newer text.
    #[must_use]
    pub fn inserted(&self) -> Vec<&str> {
        self.tagged(ChangeTag::Insert)
    }

    /// Words present only in the older text.
    #[must_use]
    pub fn deleted(&self) -> Vec<&str> {
        self.tagged(ChangeTag::Delete)
    }

    fn tagged(&self, tag: ChangeTag) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|change| change.tag == tag)
            .map(|change| change.text.as_str())
            .collect()
    }
}

/// Set-style diff of a flat list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ListDiff {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A record present in both versions whose fields differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordChange<T> {
    pub key: String,
    pub before: T,
    pub after: T,
}

/// Keyed diff of a structured list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDiff<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    pub modified: Vec<RecordChange<T>>,
}

impl<T> Default for RecordDiff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            modified: Vec::new(),
        }
    }
}

impl<T> RecordDiff<T> {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Which version a diff side refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionRef {
    pub id: DraftId,
    pub version: u32,
}

impl From<&Draft> for VersionRef {
    fn from(draft: &Draft) -> Self {
        Self {
            id: draft.id,
            version: draft.version,
        }
    }
}

/// Differences between an older version (`from`) and a newer one (`to`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftDiff {
    pub from: VersionRef,
    pub to: VersionRef,
    pub summary: TextDiff,
    pub skills: ListDiff,
    pub experience: RecordDiff<ExperienceEntry>,
    pub education: RecordDiff<EducationEntry>,
    pub projects: RecordDiff<ProjectEntry>,
}

impl DraftDiff {
    /// Sections with at least one change, in canonical order.
    #[must_use]
    pub fn changed_sections(&self) -> Vec<SectionKind> {
        SectionKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                SectionKind::Summary => !self.summary.is_unchanged(),
                SectionKind::Skills => !self.skills.is_unchanged(),
                SectionKind::Experience => !self.experience.is_unchanged(),
                SectionKind::Education => !self.education.is_unchanged(),
                SectionKind::Projects => !self.projects.is_unchanged(),
            })
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed_sections().is_empty()
    }
}

/// Compare `from` (older) against `to` (newer).
#[must_use]
pub fn diff(from: &Draft, to: &Draft) -> DraftDiff {
    let ContentDiff {
        summary,
        skills,
        experience,
        education,
        projects,
    } = diff_content(&from.content, &to.content);

    DraftDiff {
        from: from.into(),
        to: to.into(),
        summary,
        skills,
        experience,
        education,
        projects,
    }
}

struct ContentDiff {
    summary: TextDiff,
    skills: ListDiff,
    experience: RecordDiff<ExperienceEntry>,
    education: RecordDiff<EducationEntry>,
    projects: RecordDiff<ProjectEntry>,
}

fn diff_content(from: &DraftContent, to: &DraftContent) -> ContentDiff {
    ContentDiff {
        summary: diff_text(&from.summary, &to.summary),
        skills: diff_list(&from.skills, &to.skills),
        experience: diff_records(&from.experience, &to.experience),
        education: diff_records(&from.education, &to.education),
        projects: diff_records(&from.projects, &to.projects),
    }
}

/// Word-level LCS diff.
#[must_use]
pub fn diff_text(from: &str, to: &str) -> TextDiff {
    let old = from.split_whitespace().collect::<Vec<_>>();
    let new = to.split_whitespace().collect::<Vec<_>>();

    let mut tagged: Vec<(ChangeTag, &str)> = Vec::with_capacity(old.len() + new.len());

    if (old.len() + 1).saturating_mul(new.len() + 1) > MAX_TEXT_DIFF_CELLS {
        tagged.extend(old.iter().map(|word| (ChangeTag::Delete, *word)));
        tagged.extend(new.iter().map(|word| (ChangeTag::Insert, *word)));
        return group(tagged);
    }

    // lcs[i][j] = length of the LCS of old[i..] and new[j..]
    let width = new.len() + 1;
    let mut lcs = vec![0u32; (old.len() + 1) * width];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            lcs[i * width + j] = if old[i] == new[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            tagged.push((ChangeTag::Equal, old[i]));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            tagged.push((ChangeTag::Delete, old[i]));
            i += 1;
        } else {
            tagged.push((ChangeTag::Insert, new[j]));
            j += 1;
        }
    }
    tagged.extend(old[i..].iter().map(|word| (ChangeTag::Delete, *word)));
    tagged.extend(new[j..].iter().map(|word| (ChangeTag::Insert, *word)));

    group(tagged)
}

fn group(tagged: Vec<(ChangeTag, &str)>) -> TextDiff {
    let mut changes: Vec<TextChange> = Vec::new();
    for (tag, word) in tagged {
        match changes.last_mut() {
            Some(last) if last.tag == tag => {
                last.text.push(' ');
                last.text.push_str(word);
            }
            _ => changes.push(TextChange {
                tag,
                text: word.to_string(),
            }),
        }
    }
    TextDiff { changes }
}

/// Set diff preserving first-appearance order.
#[must_use]
pub fn diff_list(from: &[String], to: &[String]) -> ListDiff {
    let old = from.iter().collect::<HashSet<_>>();
    let new = to.iter().collect::<HashSet<_>>();

    let mut seen = HashSet::new();
    let added = to
        .iter()
        .filter(|item| !old.contains(item) && seen.insert(*item))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let removed = from
        .iter()
        .filter(|item| !new.contains(item) && seen.insert(*item))
        .cloned()
        .collect();

    ListDiff { added, removed }
}

/// Keyed diff; records are matched by [`Keyed::stable_key`], first occurrence wins.
#[must_use]
pub fn diff_records<T>(from: &[T], to: &[T]) -> RecordDiff<T>
where
    T: Keyed + Clone + PartialEq,
{
    let old = index_by_key(from);
    let new = index_by_key(to);

    let mut result = RecordDiff::default();
    let mut seen = HashSet::new();

    for record in to {
        let key = record.stable_key();
        if !seen.insert(key.clone()) {
            continue;
        }
        match old.get(&key) {
            None => result.added.push(record.clone()),
            Some(before) if *before != record => result.modified.push(RecordChange {
                key,
                before: (*before).clone(),
                after: record.clone(),
            }),
            Some(_) => {}
        }
    }

    let mut seen = HashSet::new();
    for record in from {
        let key = record.stable_key();
        if seen.insert(key.clone()) && !new.contains_key(&key) {
            result.removed.push(record.clone());
        }
    }

    result
}

fn index_by_key<T: Keyed>(records: &[T]) -> HashMap<String, &T> {
    let mut map = HashMap::new();
    for record in records {
        map.entry(record.stable_key()).or_insert(record);
    }
    map
}
