//! Draft store: the remote-of-record for every lineage

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Draft, DraftId, OwnerId, SectionKind};

/// A change applied by [`DraftStore::update`].
///
/// The first three variants edit the row in place and never touch content.
/// `Successor` inserts an already-minted next version and deactivates the
/// base in the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftPatch {
    Rename(String),
    JobLink(Option<String>),
    SectionVisibility { kind: SectionKind, visible: bool },
    Successor(Box<Draft>),
}

/// Owner-scoped persistence for drafts.
///
/// Every call only ever sees rows belonging to `owner`. `update` is the
/// optimistic-concurrency seam: it succeeds only while the target row is the
/// active, non-archived version `expected_version` of its lineage.
#[allow(async_fn_in_trait)]
pub trait DraftStore {
    /// Insert version 1 of a new lineage
    async fn create(&self, owner: &OwnerId, initial: &Draft) -> Result<Draft>;

    /// Fetch a single version by id, archived or not
    async fn get(&self, owner: &OwnerId, id: DraftId) -> Result<Draft>;

    /// Non-archived drafts, most recently updated first
    async fn list(&self, owner: &OwnerId, active_only: bool) -> Result<Vec<Draft>>;

    /// Every version of one lineage, newest version first
    async fn list_family(&self, owner: &OwnerId, lineage_id: DraftId) -> Result<Vec<Draft>>;

    /// Tips of archived lineages
    async fn list_archived(&self, owner: &OwnerId) -> Result<Vec<Draft>>;

    /// Version-conditioned write
    async fn update(
        &self,
        owner: &OwnerId,
        id: DraftId,
        expected_version: u32,
        patch: DraftPatch,
    ) -> Result<Draft>;

    /// Soft-delete the whole lineage containing `id`
    async fn archive(&self, owner: &OwnerId, id: DraftId) -> Result<()>;

    /// Undo [`DraftStore::archive`]
    async fn restore_archived(&self, owner: &OwnerId, id: DraftId) -> Result<()>;

    /// Remove every version of the lineage containing `id`
    async fn permanent_delete(&self, owner: &OwnerId, id: DraftId) -> Result<()>;
}

const DRAFT_COLUMNS: &str = "id, owner_id, lineage_id, parent_draft_id, name, template_id, \
     job_link, content, sections, version, is_active, is_archived, origin, content_hash, \
     created_at, updated_at";

/// `SQLite` implementation of [`DraftStore`]
///
/// Clones share one connection, so two sessions built from clones of the
/// same store observe each other's writes.
#[derive(Clone)]
pub struct SqliteDraftStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl SqliteDraftStore {
    /// Wrap an already-open database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        }
    }

    /// Open a store at the given filesystem path, creating parent directories
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::info!("Opened draft store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Filesystem path, when the store is file-backed
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

impl DraftStore for SqliteDraftStore {
    async fn create(&self, owner: &OwnerId, initial: &Draft) -> Result<Draft> {
        if &initial.owner_id != owner {
            return Err(Error::Validation("draft belongs to another owner".into()));
        }
        if initial.version != 1 || !initial.is_root() || initial.lineage_id != initial.id {
            return Err(Error::Validation(
                "create expects version 1 of a new lineage".into(),
            ));
        }

        let owner = owner.clone();
        let initial = initial.clone();
        self.with_db(move |db| {
            let conn = db.connection();
            insert_draft(conn, &initial)?;
            fetch_draft(conn, &owner, initial.id)?
                .ok_or_else(|| Error::Database("inserted draft could not be read back".into()))
        })
        .await
    }

    async fn get(&self, owner: &OwnerId, id: DraftId) -> Result<Draft> {
        let owner = owner.clone();
        self.with_db(move |db| {
            fetch_draft(db.connection(), &owner, id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))
        })
        .await
    }

    async fn list(&self, owner: &OwnerId, active_only: bool) -> Result<Vec<Draft>> {
        let owner = owner.clone();
        let sql = if active_only {
            format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts
                 WHERE owner_id = ?1 AND is_archived = 0 AND is_active = 1
                 ORDER BY updated_at DESC"
            )
        } else {
            format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts
                 WHERE owner_id = ?1 AND is_archived = 0
                 ORDER BY updated_at DESC, version DESC"
            )
        };
        self.with_db(move |db| query_drafts(db.connection(), &sql, params![owner.as_str()]))
            .await
    }

    async fn list_family(&self, owner: &OwnerId, lineage_id: DraftId) -> Result<Vec<Draft>> {
        let owner = owner.clone();
        self.with_db(move |db| {
            let sql = format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts
                 WHERE owner_id = ?1 AND lineage_id = ?2
                 ORDER BY version DESC"
            );
            let family = query_drafts(
                db.connection(),
                &sql,
                params![owner.as_str(), lineage_id.as_str()],
            )?;
            if family.is_empty() {
                return Err(Error::NotFound(lineage_id.to_string()));
            }
            Ok(family)
        })
        .await
    }

    async fn list_archived(&self, owner: &OwnerId) -> Result<Vec<Draft>> {
        let owner = owner.clone();
        self.with_db(move |db| {
            let sql = format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts
                 WHERE owner_id = ?1 AND is_archived = 1 AND is_active = 1
                 ORDER BY updated_at DESC"
            );
            query_drafts(db.connection(), &sql, params![owner.as_str()])
        })
        .await
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: DraftId,
        expected_version: u32,
        patch: DraftPatch,
    ) -> Result<Draft> {
        let owner = owner.clone();
        self.with_db(move |db| apply_patch(db, &owner, id, expected_version, patch))
            .await
    }

    async fn archive(&self, owner: &OwnerId, id: DraftId) -> Result<()> {
        self.set_archived(owner, id, true).await
    }

    async fn restore_archived(&self, owner: &OwnerId, id: DraftId) -> Result<()> {
        self.set_archived(owner, id, false).await
    }

    async fn permanent_delete(&self, owner: &OwnerId, id: DraftId) -> Result<()> {
        let owner = owner.clone();
        self.with_db(move |db| {
            let conn = db.connection();
            let lineage_id = lineage_of(conn, &owner, id)?;
            let removed = conn.execute(
                "DELETE FROM drafts WHERE owner_id = ?1 AND lineage_id = ?2",
                params![owner.as_str(), lineage_id],
            )?;
            tracing::info!("Permanently deleted lineage {lineage_id} ({removed} versions)");
            Ok(())
        })
        .await
    }
}

impl SqliteDraftStore {
    /// Run `work` against the connection on the blocking pool.
    ///
    /// The connection stays locked until `work` returns, even when the
    /// awaiting caller has given up on it.
    async fn with_db<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut db = Arc::clone(&self.db).lock_owned().await;
        tokio::task::spawn_blocking(move || work(&mut db))
            .await
            .map_err(|error| Error::Database(format!("store task failed: {error}")))?
    }

    async fn set_archived(&self, owner: &OwnerId, id: DraftId, archived: bool) -> Result<()> {
        let owner = owner.clone();
        self.with_db(move |db| {
            let conn = db.connection();
            let lineage_id = lineage_of(conn, &owner, id)?;
            conn.execute(
                "UPDATE drafts SET is_archived = ?1, updated_at = ?2
                 WHERE owner_id = ?3 AND lineage_id = ?4",
                params![archived, db_time(&Utc::now()), owner.as_str(), lineage_id],
            )?;
            Ok(())
        })
        .await
    }
}

fn apply_patch(
    db: &mut Database,
    owner: &OwnerId,
    id: DraftId,
    expected_version: u32,
    patch: DraftPatch,
) -> Result<Draft> {
    let tx = db.connection_mut().transaction()?;

    let current = fetch_draft(&tx, owner, id)?.ok_or_else(|| Error::NotFound(id.to_string()))?;
    if current.is_archived {
        return Err(Error::NotFound(id.to_string()));
    }
    if !current.is_active || current.version != expected_version {
        return Err(Error::Conflict {
            id,
            expected: expected_version,
        });
    }

    let now = db_time(&Utc::now());
    let result_id = match patch {
        DraftPatch::Rename(name) => {
            tx.execute(
                "UPDATE drafts SET name = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
                params![name, now, id.as_str(), owner.as_str()],
            )?;
            id
        }
        DraftPatch::JobLink(job_link) => {
            tx.execute(
                "UPDATE drafts SET job_link = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
                params![job_link, now, id.as_str(), owner.as_str()],
            )?;
            id
        }
        DraftPatch::SectionVisibility { kind, visible } => {
            let mut sections = current.sections.clone();
            sections.set_visible(kind, visible);
            tx.execute(
                "UPDATE drafts SET sections = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
                params![
                    serde_json::to_string(&sections)?,
                    now,
                    id.as_str(),
                    owner.as_str()
                ],
            )?;
            id
        }
        DraftPatch::Successor(next) => {
            check_successor(&current, &next)?;
            let deactivated = tx.execute(
                "UPDATE drafts SET is_active = 0, updated_at = ?1
                 WHERE id = ?2 AND owner_id = ?3 AND is_active = 1 AND version = ?4",
                params![now, id.as_str(), owner.as_str(), expected_version],
            )?;
            if deactivated != 1 {
                return Err(Error::Conflict {
                    id,
                    expected: expected_version,
                });
            }
            insert_draft(&tx, &next).map_err(|error| match error {
                Error::Sqlite(ref sqlite)
                    if sqlite.sqlite_error_code()
                        == Some(rusqlite::ErrorCode::ConstraintViolation) =>
                {
                    Error::Conflict {
                        id,
                        expected: expected_version,
                    }
                }
                other => other,
            })?;
            next.id
        }
    };

    let updated = fetch_draft(&tx, owner, result_id)?
        .ok_or_else(|| Error::Database("updated draft could not be read back".into()))?;
    tx.commit()?;
    Ok(updated)
}

fn check_successor(base: &Draft, next: &Draft) -> Result<()> {
    let well_formed = next.owner_id == base.owner_id
        && next.lineage_id == base.lineage_id
        && next.parent_draft_id == Some(base.id)
        && next.version == base.version + 1
        && next.is_active
        && !next.is_archived;
    if well_formed {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "draft {} is not the successor of {} v{}",
            next.id, base.id, base.version
        )))
    }
}

fn lineage_of(conn: &Connection, owner: &OwnerId, id: DraftId) -> Result<String> {
    conn.query_row(
        "SELECT lineage_id FROM drafts WHERE id = ?1 AND owner_id = ?2",
        params![id.as_str(), owner.as_str()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(id.to_string()))
}

fn insert_draft(conn: &Connection, draft: &Draft) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO drafts ({DRAFT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            draft.id.as_str(),
            draft.owner_id.as_str(),
            draft.lineage_id.as_str(),
            draft.parent_draft_id.map(|id| id.as_str()),
            draft.name,
            draft.template_id,
            draft.job_link,
            serde_json::to_string(&draft.content)?,
            serde_json::to_string(&draft.sections)?,
            draft.version,
            draft.is_active,
            draft.is_archived,
            draft.origin.as_str(),
            draft.content_hash.as_str(),
            db_time(&draft.created_at),
            db_time(&draft.updated_at),
        ],
    )?;
    Ok(())
}

fn fetch_draft(conn: &Connection, owner: &OwnerId, id: DraftId) -> Result<Option<Draft>> {
    let sql = format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1 AND owner_id = ?2");
    Ok(conn
        .query_row(&sql, params![id.as_str(), owner.as_str()], parse_draft)
        .optional()?)
}

fn query_drafts(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Draft>> {
    let mut stmt = conn.prepare(sql)?;
    let drafts = stmt
        .query_map(params, parse_draft)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(drafts)
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering
fn db_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(
    index: usize,
    error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, error.into())
}

fn parse_id(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<DraftId> {
    let raw: String = row.get(index)?;
    raw.parse().map_err(|error| conversion_error(index, error))
}

fn parse_json<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    index: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    serde_json::from_str(&raw).map_err(|error| conversion_error(index, error))
}

fn parse_time(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| conversion_error(index, error))
}

/// Parse a draft from a row selected with `DRAFT_COLUMNS`
fn parse_draft(row: &rusqlite::Row<'_>) -> rusqlite::Result<Draft> {
    let owner: String = row.get(1)?;
    let parent: Option<String> = row.get(3)?;
    let origin: String = row.get(12)?;
    let content_hash: String = row.get(13)?;

    Ok(Draft {
        id: parse_id(row, 0)?,
        owner_id: OwnerId::new(owner).ok_or_else(|| conversion_error(1, "empty owner id"))?,
        lineage_id: parse_id(row, 2)?,
        parent_draft_id: parent
            .map(|raw| raw.parse().map_err(|error| conversion_error(3, error)))
            .transpose()?,
        name: row.get(4)?,
        template_id: row.get(5)?,
        job_link: row.get(6)?,
        content: parse_json(row, 7)?,
        sections: parse_json(row, 8)?,
        version: row.get(9)?,
        is_active: row.get(10)?,
        is_archived: row.get(11)?,
        origin: origin.parse().map_err(|error: String| conversion_error(12, error))?,
        content_hash: crate::models::ContentHash::from_hex(content_hash),
        created_at: parse_time(row, 14)?,
        updated_at: parse_time(row, 15)?,
    })
}
