//! Database migrations

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
pub fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .optional()?
        .flatten();

    Ok(version.unwrap_or(0))
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- One row per version. A lineage is every row sharing lineage_id.
        CREATE TABLE IF NOT EXISTS drafts (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            lineage_id TEXT NOT NULL,
            parent_draft_id TEXT,
            name TEXT NOT NULL,
            template_id TEXT NOT NULL,
            job_link TEXT,
            content TEXT NOT NULL,
            sections TEXT NOT NULL,
            version INTEGER NOT NULL CHECK (version >= 1),
            is_active INTEGER NOT NULL DEFAULT 1,
            is_archived INTEGER NOT NULL DEFAULT 0,
            origin TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (lineage_id, version)
        );

        CREATE INDEX IF NOT EXISTS idx_drafts_owner
            ON drafts(owner_id, is_archived, is_active, updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_drafts_lineage
            ON drafts(owner_id, lineage_id, version DESC);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_drafts_single_active
            ON drafts(lineage_id) WHERE is_active = 1;

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    tx.commit()?;
    tracing::info!("Applied database migration v1");
    Ok(())
}
