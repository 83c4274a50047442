//! redraft-core - Core library for Redraft
//!
//! This crate contains the draft models, the version engine, the `SQLite`
//! draft store, the local cache and the session controller shared by every
//! Redraft interface.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod session;
pub mod util;
pub mod version;

pub use cache::LocalCache;
pub use config::SessionConfig;
pub use db::{DraftStore, SqliteDraftStore};
pub use error::{Error, ErrorKind, Result};
pub use models::{Draft, DraftId, OwnerId};
pub use session::{Change, DraftSession};
