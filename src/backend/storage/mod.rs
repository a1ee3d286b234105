/// Durable state for the bot: one token pair per broadcaster and the last
/// follower snapshot.
///
/// Two backends are available, a single JSON document and an SQLite
/// database. Both are opened once at startup; failing to open the configured
/// backend is fatal.
mod json;
pub mod migrate;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::backend::config::{StorageBackend, StorageConfig};
use crate::backend::twitch::TokenPair;

pub use json::JsonStore;
pub use sqlite::SqliteStore;

/// A follower as reported by the channel followers endpoint and as kept in
/// the persisted snapshot. `user_id` is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerRecord {
    pub user_id: String,
    pub user_name: String,
    pub user_login: String,
    pub followed_at: String,
}

/// Errors raised by the storage backends
#[derive(Debug)]
pub enum StorageError {
    Io(String),
    Json(String),
    Sqlite(String),
    Task(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "Storage I/O error: {}", msg),
            StorageError::Json(msg) => write!(f, "Storage JSON error: {}", msg),
            StorageError::Sqlite(msg) => write!(f, "SQLite error: {}", msg),
            StorageError::Task(msg) => write!(f, "Storage task failed: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Json(err.to_string())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Sqlite(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Upsert/read access to the token record of a broadcaster.
///
/// Records are created on first authorization and updated on every refresh.
/// Nothing in the bot deletes them.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_token(&self, broadcaster_id: &str) -> Result<Option<TokenPair>>;

    /// Insert or replace the record for `broadcaster_id`. At most one record
    /// exists per broadcaster.
    async fn upsert_token(&self, broadcaster_id: &str, pair: &TokenPair) -> Result<()>;

    async fn token_exists(&self, broadcaster_id: &str) -> Result<bool>;
}

/// The last observed follower listing.
///
/// Whether a snapshot was ever taken is stored separately from the listing
/// itself: an empty snapshot is a valid state once every follower left.
#[async_trait]
pub trait FollowerStore: Send + Sync {
    async fn followers(&self) -> Result<Vec<FollowerRecord>>;

    /// Insert new followers and refresh the names of known ones
    async fn upsert_followers(&self, followers: &[FollowerRecord]) -> Result<()>;

    async fn delete_follower(&self, user_id: &str) -> Result<()>;

    /// True once an initial snapshot was stored
    async fn is_seeded(&self) -> Result<bool>;

    async fn mark_seeded(&self) -> Result<()>;
}

/// Both stores, backed by the same file or database
#[derive(Clone)]
pub struct Stores {
    pub tokens: Arc<dyn TokenStore>,
    pub followers: Arc<dyn FollowerStore>,
}

/// Open the backend selected in the configuration
pub fn open_stores(config: &StorageConfig) -> Result<Stores> {
    let path = config.resolved_path();
    match config.backend {
        StorageBackend::Json => {
            let store = Arc::new(JsonStore::open(&path)?);
            log::info!("Using JSON store at {}", path.display());
            Ok(Stores {
                tokens: store.clone(),
                followers: store,
            })
        }
        StorageBackend::Sqlite => {
            let store = Arc::new(SqliteStore::open(&path)?);
            log::info!("Connected to the SQLite database at {}", path.display());
            Ok(Stores {
                tokens: store.clone(),
                followers: store,
            })
        }
    }
}
