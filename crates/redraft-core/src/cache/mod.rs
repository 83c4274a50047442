//! User-scoped local snapshot of the draft collection.
//!
//! One JSON file per user lives in the cache directory. Reads never fail:
//! anything unreadable, foreign or outdated is a miss. Writes are best effort
//! and go through a temp file plus rename so a crash never leaves half a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::{Draft, DraftId, OwnerId};

/// Bumped whenever the serialized `Draft` shape changes
pub const CACHE_SCHEMA_VERSION: u32 = 1;

const FILE_PREFIX: &str = "drafts-";
const FILE_SUFFIX: &str = ".json";
/// Longest hex-encoded user id kept verbatim in a file name
const MAX_HEX_NAME_LEN: usize = 128;

/// On-disk cache payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub user_id: OwnerId,
    pub drafts: Vec<Draft>,
    pub active_draft_id: Option<DraftId>,
    pub last_synced_at: DateTime<Utc>,
    pub schema_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub is_fresh: bool,
    /// `None` when no entry exists
    pub age_ms: Option<u64>,
}

impl Freshness {
    const MISSING: Self = Self {
        is_fresh: false,
        age_ms: None,
    };
}

/// File-backed cache with a freshness TTL
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
    ttl: Duration,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `user`, or `None`
    pub fn load(&self, user: &OwnerId) -> Option<CacheEntry> {
        let (entry, freshness) = self.load_any(user)?;
        if freshness.is_fresh {
            Some(entry)
        } else {
            tracing::debug!("Cache entry for {user} is stale ({:?} ms)", freshness.age_ms);
            None
        }
    }

    /// Entry for `user` regardless of age
    pub fn load_any(&self, user: &OwnerId) -> Option<(CacheEntry, Freshness)> {
        let path = self.path_for(user);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Cache miss for {user}");
                return None;
            }
            Err(error) => {
                tracing::warn!("Failed to read cache at {}: {}", path.display(), error);
                return None;
            }
        };

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!("Ignoring malformed cache at {}: {}", path.display(), error);
                return None;
            }
        };

        if &entry.user_id != user {
            tracing::warn!("Ignoring cache at {} owned by another user", path.display());
            return None;
        }
        if entry.schema_version != CACHE_SCHEMA_VERSION {
            tracing::debug!(
                "Ignoring cache schema v{} (expected v{CACHE_SCHEMA_VERSION})",
                entry.schema_version
            );
            return None;
        }

        let freshness = self.freshness_of(&entry);
        Some((entry, freshness))
    }

    /// Overwrite the entry for `user`, stamping it as synced now
    ///
    /// Failures are logged and swallowed.
    pub fn save(&self, user: &OwnerId, drafts: &[Draft], active_draft_id: Option<DraftId>) {
        let entry = CacheEntry {
            user_id: user.clone(),
            drafts: drafts.to_vec(),
            active_draft_id,
            last_synced_at: Utc::now(),
            schema_version: CACHE_SCHEMA_VERSION,
        };
        if let Err(error) = self.write_entry(&entry) {
            tracing::warn!("Failed to write draft cache: {}", error);
        }
    }

    /// Remove one user's entry, or every entry when `user` is `None`
    pub fn clear(&self, user: Option<&OwnerId>) {
        let paths = match user {
            Some(user) => vec![self.path_for(user)],
            None => self.entry_paths(),
        };

        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Cleared cache {}", path.display()),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => {
                    tracing::warn!("Failed to clear cache {}: {}", path.display(), error);
                }
            }
        }
    }

    pub fn freshness(&self, user: &OwnerId) -> Freshness {
        self.load_any(user)
            .map_or(Freshness::MISSING, |(_, freshness)| freshness)
    }

    fn freshness_of(&self, entry: &CacheEntry) -> Freshness {
        let age_ms = Utc::now()
            .signed_duration_since(entry.last_synced_at)
            .num_milliseconds()
            .max(0)
            .unsigned_abs();
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        Freshness {
            is_fresh: age_ms < ttl_ms,
            age_ms: Some(age_ms),
        }
    }

    fn write_entry(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.path_for(&entry.user_id);
        let cache_error =
            |error: &dyn std::fmt::Display| Error::Cache(format!("{}: {error}", path.display()));

        std::fs::create_dir_all(&self.dir).map_err(|error| cache_error(&error))?;
        let serialized = serde_json::to_vec(entry)?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, serialized).map_err(|error| cache_error(&error))?;
        std::fs::rename(&temp_path, &path).map_err(|error| cache_error(&error))?;
        Ok(())
    }

    /// User ids are opaque, so the file name carries them hex-encoded.
    /// Ids too long for a file name are replaced by their SHA-256 digest.
    fn path_for(&self, user: &OwnerId) -> PathBuf {
        let encoded = hex::encode(user.as_str());
        let stem = if encoded.len() > MAX_HEX_NAME_LEN {
            format!("sha256-{}", hex::encode(Sha256::digest(user.as_str().as_bytes())))
        } else {
            encoded
        };
        self.dir.join(format!("{FILE_PREFIX}{stem}{FILE_SUFFIX}"))
    }

    fn entry_paths(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DraftContent, DraftOrigin, SectionMetadata};
    use crate::version::start_lineage;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const TTL: Duration = Duration::from_secs(300);

    fn user(name: &str) -> OwnerId {
        OwnerId::new(name).unwrap()
    }

    fn draft(owner: &OwnerId) -> Draft {
        start_lineage(
            owner.clone(),
            "My Resume".into(),
            "classic".into(),
            DraftContent::default(),
            SectionMetadata::default(),
            DraftOrigin::Manual,
        )
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let cache = LocalCache::new(dir.path(), TTL);
        let alice = user("alice");
        let drafts = vec![draft(&alice)];

        cache.save(&alice, &drafts, Some(drafts[0].id));

        let entry = cache.load(&alice).unwrap();
        assert_eq!(entry.drafts, drafts);
        assert_eq!(entry.active_draft_id, Some(drafts[0].id));
        assert_eq!(entry.schema_version, CACHE_SCHEMA_VERSION);
        assert!(cache.freshness(&alice).is_fresh);
    }

    #[test]
    fn wire_shape_uses_camel_case() {
        let dir = tempdir().unwrap();
        let cache = LocalCache::new(dir.path(), TTL);
        let alice = user("alice");
        cache.save(&alice, &[], None);

        let raw = std::fs::read_to_string(cache.path_for(&alice)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for key in ["userId", "drafts", "activeDraftId", "lastSyncedAt", "schemaVersion"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn stale_entry_is_a_miss_but_still_readable() {
        let dir = tempdir().unwrap();
        let cache = LocalCache::new(dir.path(), TTL);
        let alice = user("alice");
        let entry = CacheEntry {
            user_id: alice.clone(),
            drafts: vec![draft(&alice)],
            active_draft_id: None,
            last_synced_at: Utc::now() - chrono::Duration::minutes(6),
            schema_version: CACHE_SCHEMA_VERSION,
        };
        cache.write_entry(&entry).unwrap();

        assert!(cache.load(&alice).is_none());
        let (stale, freshness) = cache.load_any(&alice).unwrap();
        assert_eq!(stale, entry);
        assert!(!freshness.is_fresh);
        assert!(freshness.age_ms.unwrap() >= 6 * 60 * 1000);
    }

    #[test]
    fn malformed_or_mismatched_entries_are_misses() {
        let dir = tempdir().unwrap();
        let cache = LocalCache::new(dir.path(), TTL);
        let alice = user("alice");
        let bob = user("bob");

        std::fs::write(cache.path_for(&alice), "{not json").unwrap();
        assert!(cache.load(&alice).is_none());

        // Bob's payload sitting in Alice's slot
        let foreign = CacheEntry {
            user_id: bob,
            drafts: Vec::new(),
            active_draft_id: None,
            last_synced_at: Utc::now(),
            schema_version: CACHE_SCHEMA_VERSION,
        };
        std::fs::write(
            cache.path_for(&alice),
            serde_json::to_string(&foreign).unwrap(),
        )
        .unwrap();
        assert!(cache.load(&alice).is_none());

        let outdated = CacheEntry {
            user_id: alice.clone(),
            schema_version: CACHE_SCHEMA_VERSION + 1,
            ..foreign
        };
        cache.write_entry(&outdated).unwrap();
        assert!(cache.load(&alice).is_none());
        assert_eq!(cache.freshness(&alice), Freshness::MISSING);
    }

    #[test]
    fn clear_one_or_all() {
        let dir = tempdir().unwrap();
        let cache = LocalCache::new(dir.path(), TTL);
        let alice = user("alice");
        let bob = user("bob");
        cache.save(&alice, &[], None);
        cache.save(&bob, &[], None);
        std::fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        cache.clear(Some(&alice));
        assert!(cache.load(&alice).is_none());
        assert!(cache.load(&bob).is_some());

        cache.clear(None);
        assert!(cache.load(&bob).is_none());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn save_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let cache = LocalCache::new(&blocker, TTL);
        let alice = user("alice");

        cache.save(&alice, &[], None);
        assert!(cache.load(&alice).is_none());
    }

    #[test]
    fn user_ids_are_filesystem_safe() {
        let dir = tempdir().unwrap();
        let cache = LocalCache::new(dir.path(), TTL);
        let odd = user("../../etc/passwd");
        cache.save(&odd, &[], None);

        assert!(cache.load(&odd).is_some());
        assert!(cache.path_for(&odd).starts_with(dir.path()));
    }

    #[test]
    fn long_user_ids_get_a_bounded_file_name() {
        let dir = tempdir().unwrap();
        let cache = LocalCache::new(dir.path(), TTL);
        let long = user(&"x".repeat(400));
        let other = user(&format!("{}y", "x".repeat(399)));

        cache.save(&long, &[], None);
        cache.save(&other, &[], None);

        let name = cache.path_for(&long);
        let name = name.file_name().unwrap().to_str().unwrap();
        assert!(name.len() < 100, "{name}");
        assert_ne!(cache.path_for(&long), cache.path_for(&other));
        assert!(cache.load(&long).is_some());
        assert_eq!(cache.load(&other).unwrap().user_id, other);

        cache.clear(None);
        assert!(cache.load(&long).is_none());
    }
}
