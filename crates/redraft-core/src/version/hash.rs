//! Content digests
//!
//! The digest is SHA-256 over a canonical JSON rendering: object keys are
//! sorted recursively, arrays keep their order. Two drafts hash equal exactly
//! when their content and hash-relevant metadata are equal, regardless of how
//! a record's fields happened to be ordered on the wire.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::{ContentHash, Draft, DraftContent};

/// Metadata that participates in the digest.
///
/// Section visibility, lifecycle state, name and job link are deliberately
/// absent: changing them never mints a version.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HashMetadata<'a> {
    pub template_id: &'a str,
}

impl<'a> HashMetadata<'a> {
    #[must_use]
    pub fn of(draft: &'a Draft) -> Self {
        Self {
            template_id: &draft.template_id,
        }
    }
}

#[derive(Serialize)]
struct HashInput<'a> {
    content: &'a DraftContent,
    metadata: HashMetadata<'a>,
}

/// Digest of `content` under `metadata`.
#[must_use]
pub fn content_hash(content: &DraftContent, metadata: HashMetadata<'_>) -> ContentHash {
    let value = serde_json::to_value(HashInput { content, metadata })
        .expect("draft content always serializes to JSON");
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);

    let digest = Sha256::digest(canonical.as_bytes());
    ContentHash::from_hex(hex::encode(digest))
}

/// Digest of a draft's current content.
#[must_use]
pub fn draft_hash(draft: &Draft) -> ContentHash {
    content_hash(&draft.content, HashMetadata::of(draft))
}

/// Whether moving from `old` to `new` warrants a new version.
#[must_use]
pub fn should_version(old: &ContentHash, new: &ContentHash) -> bool {
    old != new
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys = map.keys().collect::<Vec<_>>();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
