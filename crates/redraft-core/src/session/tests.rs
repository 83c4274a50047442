use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use super::{Change, DraftSession, SessionPhase};
use crate::cache::LocalCache;
use crate::config::{RetryPolicy, SessionConfig};
use crate::db::{DraftPatch, DraftStore, SqliteDraftStore};
use crate::error::{Error, Result};
use crate::models::{
    Draft, DraftContent, DraftId, DraftOrigin, OwnerId, SectionContent, SectionKind, SectionState,
};

#[derive(Debug, Clone, Copy)]
enum Fault {
    Conflict,
    Transient,
    Stall(Duration),
    /// Serve the call, then hold the answer back
    Lag(Duration),
}

/// Store wrapper that counts calls and injects failures per operation.
#[derive(Clone)]
struct ProbeStore {
    inner: SqliteDraftStore,
    faults: Arc<Mutex<HashMap<&'static str, VecDeque<Fault>>>>,
    calls: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl ProbeStore {
    fn new() -> Self {
        Self {
            inner: SqliteDraftStore::open_in_memory().unwrap(),
            faults: Arc::default(),
            calls: Arc::default(),
        }
    }

    fn fail_next(&self, op: &'static str, fault: Fault, times: usize) {
        let mut faults = self.faults.lock().unwrap();
        faults
            .entry(op)
            .or_default()
            .extend(std::iter::repeat(fault).take(times));
    }

    fn calls(&self, op: &'static str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Count the call and inject its fault. Returns how long to hold the
    /// answer back.
    async fn enter(&self, op: &'static str) -> Result<Option<Duration>> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
        let fault = self
            .faults
            .lock()
            .unwrap()
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        match fault {
            None => Ok(None),
            Some(Fault::Conflict) => Err(Error::Conflict {
                id: DraftId::new(),
                expected: 0,
            }),
            Some(Fault::Transient) => Err(Error::Transient("connection reset".into())),
            Some(Fault::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(None)
            }
            Some(Fault::Lag(duration)) => Ok(Some(duration)),
        }
    }
}

impl DraftStore for ProbeStore {
    async fn create(&self, owner: &OwnerId, initial: &Draft) -> Result<Draft> {
        self.enter("create").await?;
        self.inner.create(owner, initial).await
    }

    async fn get(&self, owner: &OwnerId, id: DraftId) -> Result<Draft> {
        self.enter("get").await?;
        self.inner.get(owner, id).await
    }

    async fn list(&self, owner: &OwnerId, active_only: bool) -> Result<Vec<Draft>> {
        let lag = self.enter("list").await?;
        let drafts = self.inner.list(owner, active_only).await;
        if let Some(lag) = lag {
            tokio::time::sleep(lag).await;
        }
        drafts
    }

    async fn list_family(&self, owner: &OwnerId, lineage_id: DraftId) -> Result<Vec<Draft>> {
        self.enter("list_family").await?;
        self.inner.list_family(owner, lineage_id).await
    }

    async fn list_archived(&self, owner: &OwnerId) -> Result<Vec<Draft>> {
        self.enter("list_archived").await?;
        self.inner.list_archived(owner).await
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: DraftId,
        expected_version: u32,
        patch: DraftPatch,
    ) -> Result<Draft> {
        self.enter("update").await?;
        self.inner.update(owner, id, expected_version, patch).await
    }

    async fn archive(&self, owner: &OwnerId, id: DraftId) -> Result<()> {
        self.enter("archive").await?;
        self.inner.archive(owner, id).await
    }

    async fn restore_archived(&self, owner: &OwnerId, id: DraftId) -> Result<()> {
        self.enter("restore_archived").await?;
        self.inner.restore_archived(owner, id).await
    }

    async fn permanent_delete(&self, owner: &OwnerId, id: DraftId) -> Result<()> {
        self.enter("permanent_delete").await?;
        self.inner.permanent_delete(owner, id).await
    }
}

fn owner() -> OwnerId {
    OwnerId::new("alice").unwrap()
}

fn test_config() -> SessionConfig {
    SessionConfig {
        retry: RetryPolicy {
            max_retries: 3,
            base_backoff: Duration::from_millis(1),
        },
        ..SessionConfig::default()
    }
}

fn open(store: &ProbeStore, cache_dir: &Path, ttl: Duration) -> DraftSession<ProbeStore> {
    DraftSession::open(
        owner(),
        store.clone(),
        LocalCache::new(cache_dir, ttl),
        test_config(),
    )
    .unwrap()
}

fn setup() -> (DraftSession<ProbeStore>, ProbeStore, TempDir) {
    let store = ProbeStore::new();
    let dir = TempDir::new().unwrap();
    let session = open(&store, dir.path(), Duration::from_secs(300));
    (session, store, dir)
}

fn summary(text: &str) -> SectionContent {
    SectionContent::Summary(text.to_string())
}

fn skills(items: &[&str]) -> SectionContent {
    SectionContent::Skills(items.iter().map(ToString::to_string).collect())
}

fn minted(change: Change) -> Draft {
    match change {
        Change::Minted(draft) => draft,
        other => panic!("expected a new version, got {other:?}"),
    }
}

/// The stored lineage has exactly one active version and intact parent links.
async fn assert_lineage_intact(store: &ProbeStore, lineage_id: DraftId) {
    let family = store.inner.list_family(&owner(), lineage_id).await.unwrap();
    crate::version::check_lineage(&family).unwrap();
    assert_eq!(family.iter().filter(|draft| draft.is_active).count(), 1);
}

fn updated(change: Change) -> Draft {
    match change {
        Change::Updated(draft) => draft,
        other => panic!("expected an in-place update, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn apply_hide_and_restore_walkthrough() {
    let (session, store, _dir) = setup();

    let v1 = session.create_draft("My Resume", None).await.unwrap();
    assert_eq!(v1.version, 1);
    assert!(v1.is_active);
    assert_eq!(v1.template_id, "classic");
    assert_eq!(session.active_draft().map(|draft| draft.id), Some(v1.id));

    let v2 = minted(session.apply_section(skills(&["Go", "Rust"])).await.unwrap());
    assert_eq!(v2.version, 2);
    assert_eq!(v2.parent_draft_id, Some(v1.id));
    assert_eq!(v2.origin, DraftOrigin::Generation);
    assert_eq!(
        v2.sections.get(SectionKind::Skills).state,
        SectionState::Applied
    );

    let updates = store.calls("update");
    let repeat = session.apply_section(skills(&["Go", "Rust"])).await.unwrap();
    assert_eq!(repeat, Change::Unchanged);
    assert_eq!(store.calls("update"), updates);

    let hidden = updated(
        session
            .toggle_section_visibility(SectionKind::Skills, false)
            .await
            .unwrap(),
    );
    assert_eq!(hidden.id, v2.id);
    assert_eq!(hidden.version, 2);
    assert_eq!(hidden.content_hash, v2.content_hash);
    assert!(!hidden.sections.get(SectionKind::Skills).visible);

    let v3 = minted(session.restore_version(v1.id).await.unwrap());
    assert_eq!(v3.version, 3);
    assert_eq!(v3.parent_draft_id, Some(v2.id));
    assert_eq!(v3.origin, DraftOrigin::Restore);
    assert!(v3.content.skills.is_empty());
    assert_eq!(v3.content_hash, v1.content_hash);
    assert!(!v3.sections.get(SectionKind::Skills).visible);

    let history = session.history(v3.id).await.unwrap();
    let walk = history
        .iter()
        .map(|draft| (draft.version, draft.is_active))
        .collect::<Vec<_>>();
    assert_eq!(walk, vec![(3, true), (2, false), (1, false)]);
    assert_eq!(session.status().error, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn undo_and_redo_stay_in_memory() {
    let (session, store, dir) = setup();
    let v1 = session.create_draft("Draft", None).await.unwrap();
    session.apply_section(summary("first")).await.unwrap();
    session.apply_section(skills(&["Rust"])).await.unwrap();
    let v4 = minted(session.apply_section(summary("second")).await.unwrap());

    let calls = store.total_calls();

    let after_one = session.undo().unwrap();
    assert_eq!(after_one.id, v4.id);
    assert_eq!(after_one.content.summary, "first");
    assert_eq!(after_one.content.skills, vec!["Rust".to_string()]);
    assert_ne!(after_one.content_hash, v4.content_hash);

    session.undo().unwrap();
    let after_three = session.undo().unwrap();
    assert_eq!(after_three.content, v1.content);
    assert!(session.undo().is_none());
    assert!(!session.can_undo());

    session.redo().unwrap();
    session.redo().unwrap();
    let back = session.redo().unwrap();
    assert_eq!(back.content, v4.content);
    assert_eq!(back.content_hash, v4.content_hash);
    assert!(session.redo().is_none());

    assert_eq!(store.total_calls(), calls);

    session.undo().unwrap();
    let cached = LocalCache::new(dir.path(), Duration::from_secs(300))
        .load(&owner())
        .unwrap();
    assert_eq!(cached.drafts[0].id, v4.id);
    assert_eq!(cached.drafts[0].content, v4.content);
}

#[tokio::test(flavor = "multi_thread")]
async fn save_persists_the_working_copy() {
    let (session, _store, _dir) = setup();
    session.create_draft("Draft", None).await.unwrap();
    let v2 = minted(session.apply_section(summary("kept")).await.unwrap());
    session.apply_section(summary("discarded")).await.unwrap();
    session.undo().unwrap();

    let v4 = minted(session.save().await.unwrap());
    assert_eq!(v4.version, 4);
    assert_eq!(v4.origin, DraftOrigin::AutoSave);
    assert_eq!(v4.content, v2.content);
    assert_eq!(v4.content_hash, v2.content_hash);

    assert_eq!(session.save().await.unwrap(), Change::Unchanged);
    assert_eq!(session.history(v4.id).await.unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_after_undo_builds_on_what_is_displayed() {
    let (session, _store, _dir) = setup();
    session.create_draft("Draft", None).await.unwrap();
    session.apply_section(summary("first")).await.unwrap();
    session.apply_section(skills(&["Rust"])).await.unwrap();
    session.undo().unwrap();

    let v4 = minted(session.edit_section(summary("edited")).await.unwrap());
    assert_eq!(v4.version, 4);
    assert_eq!(v4.content.summary, "edited");
    assert!(v4.content.skills.is_empty());
    assert_eq!(v4.origin, DraftOrigin::Manual);
    assert_eq!(
        v4.sections.get(SectionKind::Summary).state,
        SectionState::Edited
    );
    assert!(!session.can_redo());

    let reverted = session.undo().unwrap();
    assert_eq!(reverted.content.summary, "first");
    assert!(reverted.content.skills.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn conflicting_writer_is_rebased_onto_the_new_tip() {
    let store = ProbeStore::new();
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let ttl = Duration::from_secs(300);
    let first = open(&store, dir_a.path(), ttl);
    let second = open(&store, dir_b.path(), ttl);

    let v1 = first.create_draft("Shared", None).await.unwrap();
    second.load_all().await.unwrap();
    second.select(v1.id).unwrap();

    minted(first.apply_section(summary("from first")).await.unwrap());
    let v3 = minted(second.apply_section(skills(&["Go"])).await.unwrap());

    assert_eq!(v3.version, 3);
    assert_eq!(v3.content.summary, "from first");
    assert_eq!(v3.content.skills, vec!["Go".to_string()]);
    assert_eq!(store.calls("update"), 3);
    assert_eq!(second.status().error, None);
    assert_lineage_intact(&store, v1.lineage_id).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn persistent_conflicts_surface_as_modified_elsewhere() {
    let (session, store, _dir) = setup();
    let v1 = session.create_draft("Draft", None).await.unwrap();
    store.fail_next("update", Fault::Conflict, 10);

    let error = session
        .apply_section(summary("never lands"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::ModifiedElsewhere(_)), "{error:?}");
    assert_eq!(store.calls("update"), 4);

    let active = session.active_draft().unwrap();
    assert_eq!(active.id, v1.id);
    assert_eq!(active.version, 1);
    assert!(session.status().error.is_some());
    assert!(!session.can_undo());
    assert_lineage_intact(&store, v1.lineage_id).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failures_are_retried() {
    let (session, store, _dir) = setup();
    session.create_draft("Draft", None).await.unwrap();
    store.fail_next("update", Fault::Transient, 2);

    let v2 = minted(session.apply_section(summary("eventually")).await.unwrap());
    assert_eq!(v2.version, 2);
    assert_eq!(store.calls("update"), 3);
    assert_eq!(session.status().error, None);
    assert_lineage_intact(&store, v2.lineage_id).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn not_found_is_not_retried() {
    let (session, store, _dir) = setup();
    let error = session.history(DraftId::new()).await.unwrap_err();
    assert!(matches!(error, Error::NotFound(_)), "{error:?}");
    assert_eq!(store.calls("get"), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stalled_store_times_out_after_every_attempt() {
    let (session, store, _dir) = setup();
    session.create_draft("Draft", None).await.unwrap();
    store.fail_next("update", Fault::Stall(Duration::from_secs(30)), 10);

    let error = session.apply_section(summary("slow")).await.unwrap_err();
    assert!(
        matches!(error, Error::Timeout(limit) if limit == Duration::from_secs(15)),
        "{error:?}"
    );
    assert_eq!(store.calls("update"), 4);
    assert_eq!(session.active_draft().unwrap().version, 1);
    assert_lineage_intact(&store, session.active_draft().unwrap().lineage_id).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_cache_renders_first_then_reconciles() {
    let store = ProbeStore::new();
    let dir = TempDir::new().unwrap();
    let writer = open(&store, dir.path(), Duration::from_secs(300));
    let created = writer.create_draft("Cached", None).await.unwrap();

    let reader = open(&store, dir.path(), Duration::ZERO);
    assert_eq!(store.calls("list"), 0);
    assert_eq!(
        reader.drafts().iter().map(|draft| draft.id).collect::<Vec<_>>(),
        vec![created.id]
    );
    assert_eq!(reader.active_draft().map(|draft| draft.id), Some(created.id));
    assert_eq!(
        reader.status().phase,
        SessionPhase::Ready {
            sync_pending: true
        }
    );

    assert!(reader.reconcile_if_stale().await.unwrap());
    assert_eq!(store.calls("list"), 1);
    let status = reader.status();
    assert_eq!(status.phase, SessionPhase::Synced);
    assert!(status.last_synced_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn fresh_cache_skips_reconcile() {
    let store = ProbeStore::new();
    let dir = TempDir::new().unwrap();
    let writer = open(&store, dir.path(), Duration::from_secs(300));
    writer.create_draft("Cached", None).await.unwrap();
    writer.load_all().await.unwrap();

    let reader = open(&store, dir.path(), Duration::from_secs(300));
    assert_eq!(
        reader.status().phase,
        SessionPhase::Ready {
            sync_pending: false
        }
    );
    let lists = store.calls("list");
    assert!(!reader.reconcile_if_stale().await.unwrap());
    assert_eq!(store.calls("list"), lists);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_reload_keeps_what_is_on_screen() {
    let store = ProbeStore::new();
    let dir = TempDir::new().unwrap();
    let writer = open(&store, dir.path(), Duration::from_secs(300));
    let created = writer.create_draft("Offline", None).await.unwrap();

    let reader = open(&store, dir.path(), Duration::ZERO);
    store.fail_next("list", Fault::Transient, 10);

    let error = reader.load_all().await.unwrap_err();
    assert!(error.is_transient());
    assert_eq!(store.calls("list"), 4);
    assert_eq!(reader.drafts()[0].id, created.id);

    let status = reader.status();
    assert!(status.error.is_some());
    assert_eq!(
        status.phase,
        SessionPhase::Ready {
            sync_pending: true
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_restore_and_purge_lineage() {
    let (session, _store, _dir) = setup();
    let draft = session.create_draft("Short lived", None).await.unwrap();
    session.apply_section(summary("content")).await.unwrap();

    session.delete_draft(draft.id).await.unwrap();
    assert!(session.drafts().is_empty());
    assert!(session.active_draft().is_none());

    let deleted = session.deleted_drafts().await.unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].lineage_id, draft.lineage_id);
    assert_eq!(deleted[0].version, 2);

    let restored = session.restore_deleted(draft.id).await.unwrap();
    assert_eq!(restored.version, 2);
    assert!(!restored.is_archived);
    assert_eq!(session.drafts().len(), 1);
    assert!(session.deleted_drafts().await.unwrap().is_empty());

    session.permanent_delete(draft.id).await.unwrap();
    assert!(session.drafts().is_empty());
    let error = session.history(draft.id).await.unwrap_err();
    assert!(matches!(error, Error::NotFound(_)), "{error:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_starts_a_new_lineage() {
    let (session, _store, _dir) = setup();
    let original = session.create_draft("Backend roles", None).await.unwrap();
    session
        .set_job_link(original.id, Some("https://jobs.example.com/42"))
        .await
        .unwrap();
    let v2 = minted(session.apply_section(skills(&["Rust"])).await.unwrap());

    let copy = session.duplicate(original.id).await.unwrap();
    assert_eq!(copy.name, "Backend roles (copy)");
    assert_eq!(copy.version, 1);
    assert_eq!(copy.origin, DraftOrigin::Duplicate);
    assert_ne!(copy.lineage_id, original.lineage_id);
    assert_eq!(copy.content, v2.content);
    assert_eq!(copy.job_link.as_deref(), Some("https://jobs.example.com/42"));

    assert_eq!(session.drafts().len(), 2);
    assert_eq!(session.active_draft().map(|draft| draft.id), Some(v2.id));
}

#[tokio::test(flavor = "multi_thread")]
async fn rename_and_job_link_edit_in_place() {
    let (session, _store, _dir) = setup();
    let draft = session.create_draft("Old", None).await.unwrap();

    let renamed = updated(session.rename(draft.id, "  New name  ").await.unwrap());
    assert_eq!(renamed.name, "New name");
    assert_eq!(renamed.version, 1);
    assert_eq!(session.rename(draft.id, "New name").await.unwrap(), Change::Unchanged);

    let error = session
        .set_job_link(draft.id, Some("ftp://jobs.example.com"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Validation(_)), "{error:?}");
    assert!(session.status().error.is_some());

    let linked = updated(
        session
            .set_job_link(draft.id, Some("https://jobs.example.com/1"))
            .await
            .unwrap(),
    );
    assert_eq!(linked.job_link.as_deref(), Some("https://jobs.example.com/1"));
    assert_eq!(session.status().error, None);

    let cleared = updated(session.set_job_link(draft.id, None).await.unwrap());
    assert_eq!(cleared.job_link, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn compare_two_versions() {
    let (session, _store, _dir) = setup();
    session.create_draft("Draft", None).await.unwrap();
    let java = minted(session.apply_section(skills(&["Java"])).await.unwrap());
    let go = minted(session.apply_section(skills(&["Go"])).await.unwrap());

    let diff = session.compare(java.id, go.id).await.unwrap();
    assert_eq!(diff.skills.added, vec!["Go".to_string()]);
    assert_eq!(diff.skills.removed, vec!["Java".to_string()]);
    assert_eq!(diff.from.version, 2);
    assert_eq!(diff.to.version, 3);

    let error = session.compare(java.id, DraftId::new()).await.unwrap_err();
    assert!(matches!(error, Error::NotFound(_)), "{error:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn restore_appends_and_leaves_history_alone() {
    let (session, _store, _dir) = setup();
    session.create_draft("Draft", None).await.unwrap();
    let mut versions = Vec::new();
    for text in ["two", "three", "four", "five"] {
        versions.push(minted(session.apply_section(summary(text)).await.unwrap()));
    }
    let v2 = versions[0].clone();
    let before = session.history(v2.id).await.unwrap();

    let v6 = minted(session.restore_version(v2.id).await.unwrap());
    assert_eq!(v6.version, 6);
    assert_eq!(v6.content.summary, "two");

    let after = session.history(v2.id).await.unwrap();
    assert_eq!(after.len(), 6);
    for (old, new) in before.iter().zip(after.iter().skip(1)) {
        assert_eq!(old.id, new.id);
        assert_eq!(old.content_hash, new.content_hash);
        assert_eq!(old.version, new.version);
    }

    assert_eq!(
        session.restore_version(v6.id).await.unwrap(),
        Change::Unchanged
    );
    assert_eq!(
        session.restore_version(v2.id).await.unwrap(),
        Change::Unchanged
    );
    assert_eq!(session.history(v2.id).await.unwrap().len(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_edits_on_one_lineage_are_serialized() {
    let (session, store, _dir) = setup();
    session.create_draft("Draft", None).await.unwrap();

    let (first, second) = tokio::join!(
        session.apply_section(summary("parallel")),
        session.apply_section(skills(&["Rust"]))
    );
    let mut versions = vec![
        minted(first.unwrap()).version,
        minted(second.unwrap()).version,
    ];
    versions.sort_unstable();
    assert_eq!(versions, vec![2, 3]);
    assert_eq!(store.calls("update"), 2);
    assert_lineage_intact(&store, session.active_draft().unwrap().lineage_id).await;

    let active = session.active_draft().unwrap();
    assert_eq!(active.content.summary, "parallel");
    assert_eq!(active.content.skills, vec!["Rust".to_string()]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn background_sync_ticks_until_shutdown() {
    let store = ProbeStore::new();
    let dir = TempDir::new().unwrap();
    let session = DraftSession::open(
        owner(),
        store.clone(),
        LocalCache::new(dir.path(), Duration::ZERO),
        SessionConfig {
            sync_interval: Duration::from_millis(100),
            ..test_config()
        },
    )
    .unwrap();

    session
        .run_background_sync(tokio::time::sleep(Duration::from_millis(350)))
        .await;
    assert_eq!(store.calls("list"), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_forgets_state_and_cache() {
    let (session, _store, dir) = setup();
    session.create_draft("Draft", None).await.unwrap();
    let cache = LocalCache::new(dir.path(), Duration::from_secs(300));
    assert!(cache.load(&owner()).is_some());

    session.close();
    assert!(session.drafts().is_empty());
    assert!(session.active_draft().is_none());
    assert!(cache.load_any(&owner()).is_none());
    assert_eq!(session.status().phase, SessionPhase::Uninitialized);
}

#[tokio::test(flavor = "multi_thread")]
async fn load_one_resolves_an_old_version_to_its_tip() {
    let store = ProbeStore::new();
    let dir_a = TempDir::new().unwrap();
    let writer = open(&store, dir_a.path(), Duration::from_secs(300));
    let v1 = writer.create_draft("Draft", None).await.unwrap();
    let v2 = minted(writer.apply_section(summary("newer")).await.unwrap());

    let dir_b = TempDir::new().unwrap();
    let reader = open(&store, dir_b.path(), Duration::from_secs(300));
    let loaded = reader.load_one(v1.id).await.unwrap();
    assert_eq!(loaded.id, v2.id);
    assert_eq!(reader.active_draft().map(|draft| draft.id), Some(v2.id));
}

#[tokio::test(flavor = "multi_thread")]
async fn import_marks_sections_from_source() {
    let (session, _store, _dir) = setup();
    let content = DraftContent {
        summary: "  Seasoned engineer  ".into(),
        skills: vec!["Rust".into(), " ".into()],
        ..DraftContent::default()
    };

    let imported = session.import_draft("Imported", content).await.unwrap();
    assert_eq!(imported.origin, DraftOrigin::Import);
    assert_eq!(imported.content.summary, "Seasoned engineer");
    assert_eq!(imported.content.skills, vec!["Rust".to_string()]);
    assert_eq!(
        imported.sections.get(SectionKind::Summary).state,
        SectionState::FromSource
    );
    assert_eq!(
        imported.sections.get(SectionKind::Experience).state,
        SectionState::Empty
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn undo_depth_is_capped() {
    let (session, _store, _dir) = setup();
    session.create_draft("Draft", None).await.unwrap();
    for index in 0..12 {
        session
            .apply_section(summary(&format!("revision {index}")))
            .await
            .unwrap();
    }

    let mut steps = 0;
    while session.undo().is_some() {
        steps += 1;
    }
    assert_eq!(steps, 10);
    assert_eq!(
        session.active_draft().unwrap().content.summary,
        "revision 1"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn edits_need_a_selection() {
    let (session, store, _dir) = setup();
    let mut status = session.subscribe();

    let error = session.apply_section(summary("nowhere")).await.unwrap_err();
    assert!(matches!(error, Error::Validation(_)), "{error:?}");
    assert_eq!(store.total_calls(), 0);

    assert!(status.has_changed().unwrap());
    assert!(status.borrow_and_update().error.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn reload_read_before_an_in_place_write_keeps_the_write() {
    let (session, store, dir) = setup();
    session.create_draft("Draft", None).await.unwrap();
    session.apply_section(skills(&["Rust"])).await.unwrap();
    store.fail_next("list", Fault::Lag(Duration::from_millis(200)), 1);

    let (reloaded, hidden) = tokio::join!(session.load_all(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session
            .toggle_section_visibility(SectionKind::Skills, false)
            .await
    });
    reloaded.unwrap();
    let hidden = updated(hidden.unwrap());

    let stored = store.inner.get(&owner(), hidden.id).await.unwrap();
    assert!(!stored.sections.get(SectionKind::Skills).visible);

    let active = session.active_draft().unwrap();
    assert!(!active.sections.get(SectionKind::Skills).visible);

    let cached = LocalCache::new(dir.path(), Duration::from_secs(300))
        .load(&owner())
        .unwrap();
    assert!(!cached.drafts[0].sections.get(SectionKind::Skills).visible);
}

#[tokio::test(flavor = "multi_thread")]
async fn restoring_another_lineage_keeps_the_working_copy() {
    let (session, _store, _dir) = setup();
    let other = session.create_draft("Other", None).await.unwrap();
    session.apply_section(summary("other two")).await.unwrap();

    session.create_draft("Main", None).await.unwrap();
    session.apply_section(summary("first")).await.unwrap();
    session.apply_section(summary("second")).await.unwrap();
    assert_eq!(session.undo().unwrap().content.summary, "first");

    let restored = minted(session.restore_version(other.id).await.unwrap());
    assert_eq!(restored.lineage_id, other.lineage_id);
    assert_eq!(restored.version, 3);

    let active = session.active_draft().unwrap();
    assert_eq!(active.name, "Main");
    assert_eq!(active.content.summary, "first");
    assert!(session.can_redo());
    assert_eq!(session.redo().unwrap().content.summary, "second");
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_write_after_sync_marks_sync_pending() {
    let (session, store, _dir) = setup();
    let draft = session.create_draft("Draft", None).await.unwrap();
    session.load_all().await.unwrap();
    assert_eq!(session.status().phase, SessionPhase::Synced);

    let error = session.rename(draft.id, "   ").await.unwrap_err();
    assert!(matches!(error, Error::Validation(_)), "{error:?}");
    assert_eq!(session.status().phase, SessionPhase::Synced);

    store.fail_next("update", Fault::Transient, 10);
    let error = session.apply_section(summary("offline")).await.unwrap_err();
    assert!(error.is_transient(), "{error:?}");

    let status = session.status();
    assert!(status.error.is_some());
    assert_eq!(
        status.phase,
        SessionPhase::Ready {
            sync_pending: true
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn lineage_queues_are_dropped_with_their_drafts() {
    let (session, _store, _dir) = setup();
    let gone = session.create_draft("Gone", None).await.unwrap();
    session.apply_section(summary("one")).await.unwrap();
    let purged = session.create_draft("Purged", None).await.unwrap();
    session.apply_section(summary("two")).await.unwrap();
    let kept = session.create_draft("Kept", None).await.unwrap();
    session.apply_section(summary("three")).await.unwrap();
    let queues = || session.lineage_locks.lock().unwrap().len();
    assert_eq!(queues(), 3);

    session.delete_draft(gone.id).await.unwrap();
    session.permanent_delete(purged.id).await.unwrap();
    assert_eq!(queues(), 1);
    assert!(session
        .lineage_locks
        .lock()
        .unwrap()
        .contains_key(&kept.lineage_id));

    session.close();
    assert_eq!(queues(), 0);
}
