//! Database layer for Redraft

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use migrations::CURRENT_VERSION as SCHEMA_VERSION;
pub use repository::{DraftPatch, DraftStore, SqliteDraftStore};
