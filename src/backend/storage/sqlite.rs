use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use super::{FollowerRecord, FollowerStore, Result, StorageError, TokenStore};
use crate::backend::twitch::TokenPair;

const CREATE_TOKENS_TABLE: &str = "CREATE TABLE IF NOT EXISTS tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT UNIQUE,
    access_token TEXT,
    refresh_token TEXT,
    expires_in INTEGER,
    obtained_at TEXT
)";

const CREATE_FOLLOWERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS followers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT UNIQUE,
    user_name TEXT,
    user_login TEXT,
    followed_at TEXT
)";

const CREATE_META_TABLE: &str = "CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT
)";

const FOLLOWERS_SEEDED_KEY: &str = "followers_seeded";

const UPSERT_TOKEN: &str = "INSERT INTO tokens (user_id, access_token, refresh_token, expires_in, obtained_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(user_id) DO UPDATE SET
        access_token = excluded.access_token,
        refresh_token = excluded.refresh_token,
        expires_in = excluded.expires_in,
        obtained_at = excluded.obtained_at";

const UPSERT_FOLLOWER: &str = "INSERT INTO followers (user_id, user_name, user_login, followed_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(user_id) DO UPDATE SET
        user_name = excluded.user_name,
        user_login = excluded.user_login,
        followed_at = excluded.followed_at";

/// Token and follower store in an SQLite database.
///
/// rusqlite is blocking, so every statement runs on the blocking thread
/// pool with the shared connection.
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(connection: Connection) -> Result<Self> {
        connection.execute(CREATE_TOKENS_TABLE, [])?;
        log::debug!("Made sure the tokens table exists");
        connection.execute(CREATE_FOLLOWERS_TABLE, [])?;
        log::debug!("Made sure the followers table exists");
        connection.execute(CREATE_META_TABLE, [])?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    async fn with_connection<T, F>(&self, func: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let connection = self.connection.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = connection.lock().unwrap_or_else(PoisonError::into_inner);
            func(&mut *connection)
        })
        .await?
    }
}

fn parse_obtained_at(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StorageError::Sqlite(format!("invalid obtained_at '{}': {}", raw, e)))
        })
        .transpose()
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn get_token(&self, broadcaster_id: &str) -> Result<Option<TokenPair>> {
        let broadcaster_id = broadcaster_id.to_string();
        let row = self
            .with_connection(move |connection| {
                Ok(connection
                    .query_row(
                        "SELECT access_token, refresh_token, expires_in, obtained_at FROM tokens WHERE user_id = ?1",
                        params![broadcaster_id],
                        |row| {
                            Ok((
                                row.get::<_, Option<String>>(0)?,
                                row.get::<_, Option<String>>(1)?,
                                row.get::<_, Option<i64>>(2)?,
                                row.get::<_, Option<String>>(3)?,
                            ))
                        },
                    )
                    .optional()?)
            })
            .await?;

        let Some((access_token, refresh_token, expires_in, obtained_at)) = row else {
            return Ok(None);
        };

        Ok(Some(TokenPair {
            access_token: access_token.unwrap_or_default(),
            refresh_token: refresh_token.unwrap_or_default(),
            expires_in: expires_in.and_then(|secs| u64::try_from(secs).ok()),
            obtained_at: parse_obtained_at(obtained_at)?,
        }))
    }

    async fn upsert_token(&self, broadcaster_id: &str, pair: &TokenPair) -> Result<()> {
        let broadcaster_id = broadcaster_id.to_string();
        let access_token = pair.access_token.clone();
        let refresh_token = pair.refresh_token.clone();
        let expires_in = pair.expires_in.and_then(|secs| i64::try_from(secs).ok());
        let obtained_at = pair.obtained_at.map(|dt| dt.to_rfc3339());

        self.with_connection(move |connection| {
            connection.execute(
                UPSERT_TOKEN,
                params![
                    broadcaster_id,
                    access_token,
                    refresh_token,
                    expires_in,
                    obtained_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn token_exists(&self, broadcaster_id: &str) -> Result<bool> {
        let broadcaster_id = broadcaster_id.to_string();
        self.with_connection(move |connection| {
            let count: i64 = connection.query_row(
                "SELECT COUNT(*) FROM tokens WHERE user_id = ?1",
                params![broadcaster_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }
}

#[async_trait]
impl FollowerStore for SqliteStore {
    async fn followers(&self) -> Result<Vec<FollowerRecord>> {
        self.with_connection(|connection| {
            let mut statement = connection.prepare(
                "SELECT user_id, user_name, user_login, followed_at FROM followers ORDER BY id",
            )?;

            let rows = statement.query_map([], |row| {
                Ok(FollowerRecord {
                    user_id: row.get(0)?,
                    user_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    user_login: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    followed_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })?;

            let mut followers = Vec::new();
            for row in rows {
                followers.push(row?);
            }
            Ok(followers)
        })
        .await
    }

    async fn upsert_followers(&self, followers: &[FollowerRecord]) -> Result<()> {
        let followers = followers.to_vec();
        self.with_connection(move |connection| {
            let transaction = connection.transaction()?;
            {
                let mut statement = transaction.prepare(UPSERT_FOLLOWER)?;
                for follower in &followers {
                    statement.execute(params![
                        follower.user_id,
                        follower.user_name,
                        follower.user_login,
                        follower.followed_at
                    ])?;
                }
            }
            transaction.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_follower(&self, user_id: &str) -> Result<()> {
        let user_id = user_id.to_string();
        self.with_connection(move |connection| {
            connection.execute("DELETE FROM followers WHERE user_id = ?1", params![user_id])?;
            Ok(())
        })
        .await
    }

    async fn is_seeded(&self) -> Result<bool> {
        self.with_connection(|connection| {
            let value: Option<String> = connection
                .query_row(
                    "SELECT value FROM meta WHERE key = ?1",
                    params![FOLLOWERS_SEEDED_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.is_some())
        })
        .await
    }

    async fn mark_seeded(&self) -> Result<()> {
        self.with_connection(|connection| {
            connection.execute(
                "INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)",
                params![FOLLOWERS_SEEDED_KEY, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }
}
