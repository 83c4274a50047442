//! Draft session controller.
//!
//! A [`DraftSession`] is built on login for one owner and torn down with
//! [`DraftSession::close`] on logout. It keeps the owner's drafts in memory,
//! renders from the local cache before the store answers, and funnels every
//! mutation through the same path:
//!
//! 1. validate input,
//! 2. compute the candidate content and compare digests,
//! 3. write to the store under optimistic concurrency, retrying conflicts
//!    and transient failures with backoff,
//! 4. on success update memory, write the cache through and record undo state.
//!
//! A failed step leaves the in-memory drafts untouched and records the error
//! in [`SessionStatus`].
//!
//! Operations on one lineage are queued behind a per-lineage async mutex.
//! Undo and redo never reach the store: they lay a working copy over the
//! active draft, which [`DraftSession::save`] or the next versioned edit
//! persists.

mod history;
mod reconcile;
mod retry;
mod state;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{watch, OwnedMutexGuard};
use tokio::time::MissedTickBehavior;

pub use history::{Snapshot, UndoEntry, UndoHistory};
pub use state::{SessionPhase, SessionStatus};

use self::retry::{exhausted, AttemptOutcome, RetryState};
use self::state::SessionState;
use crate::cache::LocalCache;
use crate::config::SessionConfig;
use crate::db::{DraftPatch, DraftStore};
use crate::error::{Error, ErrorKind, Result};
use crate::export::{export_view, ExportView};
use crate::models::{
    normalize_name, Draft, DraftContent, DraftId, DraftOrigin, OwnerId, SectionContent,
    SectionKind, SectionMetadata, SectionState, DEFAULT_TEMPLATE_ID, MAX_NAME_LEN,
};
use crate::util::{is_http_url, normalize_text_option};
use crate::version::{self, DraftDiff, HashMetadata, RestorePlan};

/// Result of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A new version was minted and is now the tip
    Minted(Draft),
    /// The tip was edited in place, version unchanged
    Updated(Draft),
    /// Nothing needed writing
    Unchanged,
}

impl Change {
    pub const fn draft(&self) -> Option<&Draft> {
        match self {
            Self::Minted(draft) | Self::Updated(draft) => Some(draft),
            Self::Unchanged => None,
        }
    }

    pub const fn is_minted(&self) -> bool {
        matches!(self, Self::Minted(_))
    }
}

enum Committed {
    Stored(Draft),
    /// The plan found nothing to write against this tip
    Unchanged(Draft),
}

pub struct DraftSession<S: DraftStore> {
    owner: OwnerId,
    store: S,
    cache: LocalCache,
    config: SessionConfig,
    state: Mutex<SessionState>,
    lineage_locks: Mutex<HashMap<DraftId, Arc<tokio::sync::Mutex<()>>>>,
    status: watch::Sender<SessionStatus>,
}

impl<S: DraftStore> DraftSession<S> {
    /// Start a session for `owner`, rendering whatever the cache holds.
    ///
    /// Stale cache entries are used too; the phase then reports a pending
    /// sync so the caller knows to reconcile.
    pub fn open(
        owner: OwnerId,
        store: S,
        cache: LocalCache,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut state = SessionState::new(config.undo_capacity);
        let mut status = SessionStatus::new(SessionPhase::Uninitialized);
        if let Some((entry, freshness)) = cache.load_any(&owner) {
            tracing::debug!(
                "Rendering {} cached drafts for {} (fresh: {})",
                entry.drafts.len(),
                owner,
                freshness.is_fresh
            );
            state.selected = entry.active_draft_id.and_then(|active| {
                entry
                    .drafts
                    .iter()
                    .find(|draft| draft.id == active)
                    .map(|draft| draft.lineage_id)
            });
            state.drafts = entry.drafts;
            status.phase = SessionPhase::Ready {
                sync_pending: !freshness.is_fresh,
            };
            status.last_synced_at = Some(entry.last_synced_at);
        }

        let (status, _) = watch::channel(status);
        Ok(Self {
            owner,
            store,
            cache,
            config,
            state: Mutex::new(state),
            lineage_locks: Mutex::new(HashMap::new()),
            status,
        })
    }

    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Follow status changes
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Tips of the owner's live drafts, most recently touched first
    pub fn drafts(&self) -> Vec<Draft> {
        self.state().drafts.clone()
    }

    /// The selected draft as the user sees it, working copy included
    pub fn active_draft(&self) -> Option<Draft> {
        self.state().active_draft()
    }

    pub fn export_view(&self) -> Option<ExportView> {
        self.active_draft().as_ref().map(export_view)
    }

    pub fn can_undo(&self) -> bool {
        self.state().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state().history.can_redo()
    }

    // -----------------------------------------------------------------------
    // Loading and selection
    // -----------------------------------------------------------------------

    /// Authoritative reload of every live draft.
    pub async fn load_all(&self) -> Result<Vec<Draft>> {
        let result = self.load_all_inner().await;
        self.record(result)
    }

    /// Load one draft, resolve it to its lineage tip and select it.
    pub async fn load_one(&self, id: DraftId) -> Result<Draft> {
        let result = self.load_one_inner(id).await;
        self.record(result)
    }

    /// Select a loaded draft. Undo history belongs to the previous selection
    /// and is dropped.
    pub fn select(&self, id: DraftId) -> Result<Draft> {
        let result = self.select_inner(id);
        self.record(result)
    }

    // -----------------------------------------------------------------------
    // Lineage lifecycle
    // -----------------------------------------------------------------------

    /// Create version 1 of an empty draft and select it.
    pub async fn create_draft(&self, name: &str, template_id: Option<&str>) -> Result<Draft> {
        let result: Result<Draft> = async {
            let name = normalize_name(name)?;
            let template_id = normalize_text_option(template_id.map(str::to_string))
                .unwrap_or_else(|| DEFAULT_TEMPLATE_ID.to_string());
            let draft = version::start_lineage(
                self.owner.clone(),
                name,
                template_id,
                DraftContent::default(),
                SectionMetadata::default(),
                DraftOrigin::Manual,
            );
            self.create_lineage(draft, true).await
        }
        .await;
        self.record(result)
    }

    /// Create version 1 from existing resume content and select it.
    pub async fn import_draft(&self, name: &str, content: DraftContent) -> Result<Draft> {
        let result: Result<Draft> = async {
            let name = normalize_name(name)?;
            let content = normalized_content(content);
            let sections =
                SectionMetadata::derived(&content, SectionState::FromSource, Utc::now());
            let draft = version::start_lineage(
                self.owner.clone(),
                name,
                DEFAULT_TEMPLATE_ID.to_string(),
                content,
                sections,
                DraftOrigin::Import,
            );
            self.create_lineage(draft, true).await
        }
        .await;
        self.record(result)
    }

    /// Copy a draft's current content into a new lineage.
    pub async fn duplicate(&self, id: DraftId) -> Result<Draft> {
        let result: Result<Draft> = async {
            let lineage_id = self.lineage_of(id).await?;
            let source = self.current_tip(lineage_id).await?;
            let mut copy = version::start_lineage(
                self.owner.clone(),
                copy_name(&source.name),
                source.template_id.clone(),
                source.content.clone(),
                source.sections.clone(),
                DraftOrigin::Duplicate,
            );
            copy.job_link.clone_from(&source.job_link);
            self.create_lineage(copy, false).await
        }
        .await;
        self.record(result)
    }

    pub async fn rename(&self, id: DraftId, name: &str) -> Result<Change> {
        let result: Result<Change> = async {
            let name = normalize_name(name)?;
            self.update_in_place(id, |base| {
                (base.name != name).then(|| DraftPatch::Rename(name.clone()))
            })
            .await
        }
        .await;
        self.record(result)
    }

    /// Set or clear the job posting link. Only http(s) URLs are accepted.
    pub async fn set_job_link(&self, id: DraftId, link: Option<&str>) -> Result<Change> {
        let result: Result<Change> = async {
            let link = normalize_text_option(link.map(str::to_string));
            if let Some(link) = &link {
                if !is_http_url(link) {
                    return Err(Error::Validation(
                        "job link must start with http:// or https://".into(),
                    ));
                }
            }
            self.update_in_place(id, |base| {
                (base.job_link != link).then(|| DraftPatch::JobLink(link.clone()))
            })
            .await
        }
        .await;
        self.record(result)
    }

    /// Archive the whole lineage. Versions stay in the store.
    pub async fn delete_draft(&self, id: DraftId) -> Result<()> {
        let result: Result<()> = async {
            let lineage_id = self.lineage_of(id).await?;
            let _guard = self.lock_lineage(lineage_id).await;
            self.request(move || self.store.archive(&self.owner, lineage_id))
                .await?;

            self.forget_lock(lineage_id);
            let mut state = self.state();
            state.remove_lineage(lineage_id);
            self.persist_cache(&state);
            tracing::info!("Deleted draft lineage {}", lineage_id);
            Ok(())
        }
        .await;
        self.record(result)
    }

    /// Bring an archived lineage back.
    pub async fn restore_deleted(&self, id: DraftId) -> Result<Draft> {
        let result: Result<Draft> = async {
            let lineage_id = self.lineage_of(id).await?;
            let _guard = self.lock_lineage(lineage_id).await;
            self.request(move || self.store.restore_archived(&self.owner, lineage_id))
                .await?;
            let tip = self.request(move || self.fetch_tip(lineage_id)).await?;

            let mut state = self.state();
            state.upsert_tip(tip.clone());
            self.persist_cache(&state);
            tracing::info!("Restored draft lineage {}", lineage_id);
            Ok(tip)
        }
        .await;
        self.record(result)
    }

    /// Tips of archived lineages.
    pub async fn deleted_drafts(&self) -> Result<Vec<Draft>> {
        let result = self
            .request(move || self.store.list_archived(&self.owner))
            .await;
        self.record(result)
    }

    /// Irreversibly remove every version of the lineage.
    pub async fn permanent_delete(&self, id: DraftId) -> Result<()> {
        let result: Result<()> = async {
            let lineage_id = self.lineage_of(id).await?;
            let _guard = self.lock_lineage(lineage_id).await;
            self.request(move || self.store.permanent_delete(&self.owner, lineage_id))
                .await?;

            self.forget_lock(lineage_id);
            let mut state = self.state();
            state.remove_lineage(lineage_id);
            self.persist_cache(&state);
            Ok(())
        }
        .await;
        self.record(result)
    }

    // -----------------------------------------------------------------------
    // Content edits on the active draft
    // -----------------------------------------------------------------------

    /// Apply generated content to one section. Undoable.
    pub async fn apply_section(&self, section: SectionContent) -> Result<Change> {
        let section = section.normalized();
        let kind = section.kind();
        let result = self
            .edit_active(
                &format!("apply {kind}"),
                DraftOrigin::Generation,
                true,
                |snapshot, at| {
                    snapshot.content.set_section(section.clone());
                    snapshot
                        .sections
                        .mark(kind, SectionState::Applied, &snapshot.content, at);
                },
            )
            .await;
        self.record(result)
    }

    /// Apply generated content to every section at once. Undoable.
    pub async fn apply_all(&self, content: DraftContent) -> Result<Change> {
        let content = normalized_content(content);
        let result = self
            .edit_active("apply all", DraftOrigin::Generation, true, |snapshot, at| {
                snapshot.content = content.clone();
                for kind in SectionKind::ALL {
                    snapshot
                        .sections
                        .mark(kind, SectionState::Applied, &snapshot.content, at);
                }
            })
            .await;
        self.record(result)
    }

    /// Hand edit of one section. Undoable.
    pub async fn edit_section(&self, section: SectionContent) -> Result<Change> {
        let section = section.normalized();
        let kind = section.kind();
        let result = self
            .edit_active(
                &format!("edit {kind}"),
                DraftOrigin::Manual,
                true,
                |snapshot, at| {
                    snapshot.content.set_section(section.clone());
                    snapshot
                        .sections
                        .mark(kind, SectionState::Edited, &snapshot.content, at);
                },
            )
            .await;
        self.record(result)
    }

    /// Show or hide a section of the active draft. Edits the tip in place;
    /// visibility is neither versioned nor undoable.
    pub async fn toggle_section_visibility(
        &self,
        kind: SectionKind,
        visible: bool,
    ) -> Result<Change> {
        let result: Result<Change> = async {
            let lineage_id = self.selected_lineage()?;
            let _guard = self.lock_lineage(lineage_id).await;
            let committed = self
                .commit(lineage_id, |base| {
                    Ok((base.sections.get(kind).visible != visible)
                        .then_some(DraftPatch::SectionVisibility { kind, visible }))
                })
                .await?;

            let mut state = self.state();
            if let Some(copy) = state.working_copy.as_mut() {
                copy.snapshot.sections.set_visible(kind, visible);
            }
            Ok(self.settle_in_place(&mut state, committed))
        }
        .await;
        self.record(result)
    }

    /// Step back to the state before the last undoable operation.
    ///
    /// Returns the draft now displayed, or `None` when there is nothing to
    /// undo. Never touches the store.
    pub fn undo(&self) -> Option<Draft> {
        let mut state = self.state();
        let current = state.displayed()?;
        let previous = state.history.undo(current)?;
        Self::show_snapshot(&mut state, previous);
        state.active_draft()
    }

    /// Re-apply the last undone operation.
    pub fn redo(&self) -> Option<Draft> {
        let mut state = self.state();
        let current = state.displayed()?;
        let next = state.history.redo(current)?;
        Self::show_snapshot(&mut state, next);
        state.active_draft()
    }

    /// Persist the working copy left by undo/redo as a new version.
    pub async fn save(&self) -> Result<Change> {
        let result: Result<Change> = async {
            let lineage_id = self.selected_lineage()?;
            let _guard = self.lock_lineage(lineage_id).await;
            let overlay = self.state().overlay().cloned();
            let Some(snapshot) = overlay else {
                return Ok(Change::Unchanged);
            };

            let committed = self
                .commit(lineage_id, |base| {
                    let hash = version::content_hash(&snapshot.content, HashMetadata::of(base));
                    if hash == base.content_hash {
                        return Ok(None);
                    }
                    let mut sections = snapshot.sections.clone();
                    sections.adopt_visibility(&base.sections);
                    Ok(Some(DraftPatch::Successor(Box::new(version::mint_version(
                        base,
                        snapshot.content.clone(),
                        sections,
                        DraftOrigin::AutoSave,
                    )))))
                })
                .await?;

            let mut state = self.state();
            state.working_copy = None;
            Ok(self.settle_minted(&mut state, committed))
        }
        .await;
        self.record(result)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Every version of the lineage containing `id`, newest first.
    pub async fn history(&self, id: DraftId) -> Result<Vec<Draft>> {
        let result: Result<Vec<Draft>> = async {
            let lineage_id = self.lineage_of(id).await?;
            let family = self
                .request(move || self.store.list_family(&self.owner, lineage_id))
                .await?;
            version::check_lineage(&family)?;
            Ok(family)
        }
        .await;
        self.record(result)
    }

    /// Diff two versions of one lineage.
    pub async fn compare(&self, from: DraftId, to: DraftId) -> Result<DraftDiff> {
        let result: Result<DraftDiff> = async {
            let lineage_id = self.lineage_of(from).await?;
            let family = self
                .request(move || self.store.list_family(&self.owner, lineage_id))
                .await?;
            version::compare(&family, from, to)
        }
        .await;
        self.record(result)
    }

    /// Make a past version's content current again by appending a new
    /// version on top of the tip.
    pub async fn restore_version(&self, id: DraftId) -> Result<Change> {
        let result: Result<Change> = async {
            let target = self
                .request(move || self.store.get(&self.owner, id))
                .await?;
            let lineage_id = target.lineage_id;
            let _guard = self.lock_lineage(lineage_id).await;

            let committed = self
                .commit(lineage_id, |base| {
                    if base.id == target.id {
                        return Ok(None);
                    }
                    // Once the tip has moved on, the target is a past version.
                    let mut past = target.clone();
                    past.is_active = false;
                    match version::plan_restore(&[base.clone(), past], target.id)? {
                        RestorePlan::AlreadyCurrent(_) => Ok(None),
                        RestorePlan::Mint(draft) => {
                            Ok(Some(DraftPatch::Successor(Box::new(draft))))
                        }
                    }
                })
                .await?;

            let mut state = self.state();
            if matches!(committed, Committed::Stored(_)) && state.selected == Some(lineage_id) {
                state.working_copy = None;
            }
            Ok(self.settle_minted(&mut state, committed))
        }
        .await;
        self.record(result)
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    /// Reload when the data on screen has not been reconciled or the cache
    /// has outlived its TTL. Returns whether a reload happened.
    pub async fn reconcile_if_stale(&self) -> Result<bool> {
        let pending = matches!(
            self.status.borrow().phase,
            SessionPhase::Uninitialized | SessionPhase::Ready { sync_pending: true }
        );
        let stale = !self.cache.freshness(&self.owner).is_fresh;
        if !pending && !stale {
            return Ok(false);
        }
        self.load_all().await.map(|_| true)
    }

    /// Periodically reconcile until `shutdown` resolves.
    pub async fn run_background_sync(&self, shutdown: impl Future<Output = ()>) {
        let period = self.config.sync_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::debug!("Background sync for {} stopped", self.owner);
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.reconcile_if_stale().await {
                        tracing::warn!("Background sync failed: {}", error);
                    }
                }
            }
        }
    }

    /// Tear the session down on logout: forget everything and clear this
    /// owner's cache entry.
    pub fn close(&self) {
        self.cache.clear(Some(&self.owner));
        *self.state() = SessionState::new(self.config.undo_capacity);
        self.lineage_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.status
            .send_replace(SessionStatus::new(SessionPhase::Uninitialized));
        tracing::info!("Closed draft session for {}", self.owner);
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mirror an operation's outcome into the observable status.
    fn record<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => {
                self.status.send_if_modified(|status| {
                    let mut modified = status.error.take().is_some();
                    if status.phase == SessionPhase::Uninitialized {
                        status.phase = SessionPhase::Ready { sync_pending: true };
                        modified = true;
                    }
                    modified
                });
            }
            Err(error) => {
                tracing::warn!("Draft operation failed: {}", error);
                let message = error.to_string();
                let store_failure = matches!(
                    error.kind(),
                    ErrorKind::Transient | ErrorKind::Conflict | ErrorKind::Internal
                );
                self.status.send_modify(|status| {
                    status.error = Some(message);
                    if store_failure && status.phase == SessionPhase::Synced {
                        status.phase = SessionPhase::Ready { sync_pending: true };
                    }
                });
            }
        }
        result
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.status.send_if_modified(|status| {
            let modified = status.phase != phase;
            status.phase = phase;
            modified
        });
    }

    fn persist_cache(&self, state: &SessionState) {
        self.cache
            .save(&self.owner, &state.drafts, state.active_draft_id());
    }

    fn selected_lineage(&self) -> Result<DraftId> {
        self.state()
            .selected
            .ok_or_else(|| Error::Validation("no draft is selected".into()))
    }

    async fn lock_lineage(&self, lineage_id: DraftId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .lineage_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(lineage_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the queue of a lineage that left the session. Holders of the old
    /// lock keep it until they finish.
    fn forget_lock(&self, lineage_id: DraftId) {
        self.lineage_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&lineage_id);
    }

    /// One store call under the request deadline.
    async fn call<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.config.request_timeout;
        tokio::time::timeout(limit, request)
            .await
            .unwrap_or(Err(Error::Timeout(limit)))
    }

    /// A store call that is safe to repeat, retried on transient failure.
    async fn request<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = RetryState::new(self.config.retry);
        loop {
            match AttemptOutcome::classify(self.call(attempt()).await) {
                AttemptOutcome::Success(value) => return Ok(value),
                AttemptOutcome::TransientFail(error) => {
                    let Some(delay) = retry.next_delay() else {
                        return Err(error);
                    };
                    tracing::warn!(
                        "Store request failed ({}); retry {} in {:?}",
                        error,
                        retry.retries(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                AttemptOutcome::Conflict(error) | AttemptOutcome::GiveUp(error) => {
                    return Err(error)
                }
            }
        }
    }

    /// Active member of a lineage straight from the store.
    async fn fetch_tip(&self, lineage_id: DraftId) -> Result<Draft> {
        let family = self.store.list_family(&self.owner, lineage_id).await?;
        let tip = version::tip(&family)?;
        if tip.is_archived {
            return Err(Error::NotFound(format!("draft {lineage_id} is deleted")));
        }
        Ok(tip.clone())
    }

    async fn current_tip(&self, lineage_id: DraftId) -> Result<Draft> {
        let local = self.state().tip(lineage_id).cloned();
        match local {
            Some(tip) => Ok(tip),
            None => self.request(move || self.fetch_tip(lineage_id)).await,
        }
    }

    async fn lineage_of(&self, id: DraftId) -> Result<DraftId> {
        let local = self.state().find(id).map(|draft| draft.lineage_id);
        if let Some(lineage_id) = local {
            return Ok(lineage_id);
        }
        let draft = self
            .request(move || self.store.get(&self.owner, id))
            .await?;
        Ok(draft.lineage_id)
    }

    /// Version-conditioned write with the retry state machine.
    ///
    /// `plan` turns the current tip into a patch, or `None` when the tip
    /// already holds what the caller wants. On conflict the tip is refetched
    /// and `plan` runs again against it.
    async fn commit<F>(&self, lineage_id: DraftId, mut plan: F) -> Result<Committed>
    where
        F: FnMut(&Draft) -> Result<Option<DraftPatch>>,
    {
        let mut base = self.current_tip(lineage_id).await?;
        let mut retry = RetryState::new(self.config.retry);

        loop {
            let Some(patch) = plan(&base)? else {
                return Ok(Committed::Unchanged(base));
            };

            let outcome = AttemptOutcome::classify(
                self.call(
                    self.store
                        .update(&self.owner, base.id, base.version, patch),
                )
                .await,
            );
            let error = match outcome {
                AttemptOutcome::Success(draft) => return Ok(Committed::Stored(draft)),
                AttemptOutcome::GiveUp(error) => return Err(error),
                AttemptOutcome::Conflict(error) | AttemptOutcome::TransientFail(error) => error,
            };

            let Some(delay) = retry.next_delay() else {
                return Err(exhausted(error, retry.retries()));
            };
            tracing::warn!(
                "Write to lineage {} failed ({}); retry {} of {} in {:?}",
                lineage_id,
                error,
                retry.retries(),
                self.config.retry.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;

            match self.call(self.fetch_tip(lineage_id)).await {
                Ok(tip) => base = tip,
                Err(error) if error.is_transient() => {}
                Err(error) => return Err(error),
            }
        }
    }

    /// Shared path of the undoable content edits.
    async fn edit_active<E>(
        &self,
        label: &str,
        origin: DraftOrigin,
        undoable: bool,
        edit: E,
    ) -> Result<Change>
    where
        E: Fn(&mut Snapshot, DateTime<Utc>),
    {
        let lineage_id = self.selected_lineage()?;
        let _guard = self.lock_lineage(lineage_id).await;

        let (tip, before) = {
            let state = self.state();
            let tip = state
                .tip(lineage_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(lineage_id.to_string()))?;
            let displayed = if state.selected == Some(lineage_id) {
                state.displayed()
            } else {
                None
            };
            let before = displayed.unwrap_or_else(|| snapshot_of(&tip));
            (tip, before)
        };

        let at = Utc::now();
        let mut candidate = before.clone();
        edit(&mut candidate, at);
        let metadata = HashMetadata::of(&tip);
        if version::content_hash(&candidate.content, metadata)
            == version::content_hash(&before.content, metadata)
        {
            return Ok(Change::Unchanged);
        }

        let committed = self
            .commit(lineage_id, |base| {
                let next = if base.id == tip.id {
                    candidate.clone()
                } else {
                    let mut rebased = snapshot_of(base);
                    edit(&mut rebased, at);
                    rebased
                };
                let hash = version::content_hash(&next.content, HashMetadata::of(base));
                if hash == base.content_hash {
                    return Ok(None);
                }
                Ok(Some(DraftPatch::Successor(Box::new(version::mint_version(
                    base,
                    next.content,
                    next.sections,
                    origin,
                )))))
            })
            .await?;

        let mut state = self.state();
        let had_overlay = state.working_copy.is_some();
        let change = self.settle_minted(&mut state, committed);
        if change.is_minted() || had_overlay {
            state.working_copy = None;
            if undoable && state.selected == Some(lineage_id) {
                state.history.record(before, label);
            }
        }
        Ok(change)
    }

    async fn update_in_place<F>(&self, id: DraftId, plan: F) -> Result<Change>
    where
        F: Fn(&Draft) -> Option<DraftPatch>,
    {
        let lineage_id = self.lineage_of(id).await?;
        let _guard = self.lock_lineage(lineage_id).await;
        let committed = self.commit(lineage_id, |base| Ok(plan(base))).await?;
        let mut state = self.state();
        Ok(self.settle_in_place(&mut state, committed))
    }

    async fn create_lineage(&self, draft: Draft, select: bool) -> Result<Draft> {
        let draft = &draft;
        let created = self
            .request(move || self.store.create(&self.owner, draft))
            .await?;

        let mut state = self.state();
        state.upsert_tip(created.clone());
        if select {
            state.select(Some(created.lineage_id));
        }
        self.persist_cache(&state);
        tracing::info!(
            "Created draft {} '{}' ({})",
            created.id,
            created.name,
            created.origin
        );
        Ok(created)
    }

    fn settle_minted(&self, state: &mut SessionState, committed: Committed) -> Change {
        match committed {
            Committed::Stored(draft) => {
                tracing::info!(
                    "Minted v{} of lineage {} ({})",
                    draft.version,
                    draft.lineage_id,
                    draft.origin
                );
                state.upsert_tip(draft.clone());
                self.persist_cache(state);
                Change::Minted(draft)
            }
            Committed::Unchanged(base) => {
                self.adopt_tip(state, base);
                Change::Unchanged
            }
        }
    }

    fn settle_in_place(&self, state: &mut SessionState, committed: Committed) -> Change {
        match committed {
            Committed::Stored(draft) => {
                state.upsert_tip(draft.clone());
                self.persist_cache(state);
                Change::Updated(draft)
            }
            Committed::Unchanged(base) => {
                self.adopt_tip(state, base);
                Change::Unchanged
            }
        }
    }

    /// Take a tip learned from the store unless the local one is as new.
    fn adopt_tip(&self, state: &mut SessionState, tip: Draft) {
        let known = state.tip(tip.lineage_id);
        if known.is_some_and(|known| !reconcile::supersedes(&tip, known)) {
            return;
        }
        state.upsert_tip(tip);
        self.persist_cache(state);
    }

    /// Lay an undo/redo snapshot over the selected tip. Visibility always
    /// follows the tip.
    fn show_snapshot(state: &mut SessionState, mut snapshot: Snapshot) {
        if let Some(tip) = state.selected_tip() {
            snapshot.sections.adopt_visibility(&tip.sections);
        }
        state.set_displayed(snapshot);
    }

    async fn load_all_inner(&self) -> Result<Vec<Draft>> {
        let previous = self.status.borrow().phase;
        self.set_phase(SessionPhase::Loading);

        let remote = match self
            .request(move || self.store.list(&self.owner, true))
            .await
        {
            Ok(remote) => remote,
            Err(error) => {
                self.set_phase(match previous {
                    SessionPhase::Uninitialized => SessionPhase::Uninitialized,
                    _ => SessionPhase::Ready { sync_pending: true },
                });
                return Err(error);
            }
        };

        let drafts = {
            let mut state = self.state();
            let active_before = state.active_draft_id();
            state.drafts = reconcile::merge(&state.drafts, remote);
            if let Some(lineage_id) = state.selected {
                if state.tip(lineage_id).is_none() {
                    state.deselect();
                }
            }
            if state.active_draft_id() != active_before {
                state.history.clear();
                state.working_copy = None;
            }
            self.persist_cache(&state);
            state.drafts.clone()
        };

        self.status.send_modify(|status| {
            status.phase = SessionPhase::Synced;
            status.last_synced_at = Some(Utc::now());
        });
        tracing::debug!("Reconciled {} drafts for {}", drafts.len(), self.owner);
        Ok(drafts)
    }

    async fn load_one_inner(&self, id: DraftId) -> Result<Draft> {
        let draft = self
            .request(move || self.store.get(&self.owner, id))
            .await?;
        if draft.is_archived {
            return Err(Error::NotFound(format!("draft {id} is deleted")));
        }
        let tip = if draft.is_active {
            draft
        } else {
            let lineage_id = draft.lineage_id;
            self.request(move || self.fetch_tip(lineage_id)).await?
        };

        let mut state = self.state();
        self.adopt_tip(&mut state, tip.clone());
        state.select(Some(tip.lineage_id));
        self.persist_cache(&state);
        Ok(state.active_draft().unwrap_or(tip))
    }

    fn select_inner(&self, id: DraftId) -> Result<Draft> {
        let mut state = self.state();
        let lineage_id = state
            .find(id)
            .map(|draft| draft.lineage_id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        state.select(Some(lineage_id));
        self.persist_cache(&state);
        state
            .active_draft()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

fn snapshot_of(draft: &Draft) -> Snapshot {
    Snapshot {
        content: draft.content.clone(),
        sections: draft.sections.clone(),
    }
}

fn normalized_content(content: DraftContent) -> DraftContent {
    let mut normalized = DraftContent::default();
    for kind in SectionKind::ALL {
        normalized.set_section(content.section(kind).normalized());
    }
    normalized
}

/// `"<name> (copy)"`, shortened to fit the name limit
fn copy_name(name: &str) -> String {
    const SUFFIX: &str = " (copy)";
    let keep = MAX_NAME_LEN - SUFFIX.len();
    let base = name.chars().take(keep).collect::<String>();
    format!("{}{SUFFIX}", base.trim_end())
}
