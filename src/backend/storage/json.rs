use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{FollowerRecord, FollowerStore, Result, TokenStore};
use crate::backend::twitch::TokenPair;

/// On-disk layout of the JSON store
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    tokens: BTreeMap<String, TokenPair>,
    #[serde(default)]
    followers: Vec<FollowerRecord>,
    #[serde(default)]
    followers_seeded: bool,
}

struct DocumentFile {
    path: PathBuf,
    document: Mutex<Document>,
}

impl DocumentFile {
    fn document(&self) -> MutexGuard<'_, Document> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, document: &Document) -> Result<()> {
        let content = serde_json::to_string_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Apply `change` to a copy of the document, write it, then swap it in
    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Document),
    {
        let mut document = self.document();
        let mut next = document.clone();
        change(&mut next);
        self.persist(&next)?;
        *document = next;
        Ok(())
    }
}

/// Token and follower store kept in a single JSON document.
///
/// The whole document is cached in memory and rewritten on every change
/// through a temporary file, so a crash mid-write leaves the previous
/// version in place. Writes run on the blocking thread pool.
pub struct JsonStore {
    file: Arc<DocumentFile>,
}

impl JsonStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let document = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Document::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            Document::default()
        };

        Ok(Self {
            file: Arc::new(DocumentFile {
                path,
                document: Mutex::new(document),
            }),
        })
    }

    fn document(&self) -> MutexGuard<'_, Document> {
        self.file.document()
    }

    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Document) + Send + 'static,
    {
        let file = self.file.clone();
        tokio::task::spawn_blocking(move || file.update(change)).await?
    }
}

#[async_trait]
impl TokenStore for JsonStore {
    async fn get_token(&self, broadcaster_id: &str) -> Result<Option<TokenPair>> {
        Ok(self.document().tokens.get(broadcaster_id).cloned())
    }

    async fn upsert_token(&self, broadcaster_id: &str, pair: &TokenPair) -> Result<()> {
        let broadcaster_id = broadcaster_id.to_string();
        let pair = pair.clone();
        self.update(move |document| {
            document.tokens.insert(broadcaster_id, pair);
        })
        .await
    }

    async fn token_exists(&self, broadcaster_id: &str) -> Result<bool> {
        Ok(self.document().tokens.contains_key(broadcaster_id))
    }
}

#[async_trait]
impl FollowerStore for JsonStore {
    async fn followers(&self) -> Result<Vec<FollowerRecord>> {
        Ok(self.document().followers.clone())
    }

    async fn upsert_followers(&self, followers: &[FollowerRecord]) -> Result<()> {
        if followers.is_empty() {
            return Ok(());
        }

        let followers = followers.to_vec();
        self.update(move |document| {
            let positions: HashMap<String, usize> = document
                .followers
                .iter()
                .enumerate()
                .map(|(index, f)| (f.user_id.clone(), index))
                .collect();

            let mut appended = Vec::new();
            for follower in followers {
                match positions.get(&follower.user_id) {
                    Some(&index) => document.followers[index] = follower,
                    None => appended.push(follower),
                }
            }

            for follower in appended {
                if !document
                    .followers
                    .iter()
                    .any(|f| f.user_id == follower.user_id)
                {
                    document.followers.push(follower);
                }
            }
        })
        .await
    }

    async fn delete_follower(&self, user_id: &str) -> Result<()> {
        let user_id = user_id.to_string();
        self.update(move |document| {
            document.followers.retain(|f| f.user_id != user_id);
        })
        .await
    }

    async fn is_seeded(&self) -> Result<bool> {
        Ok(self.document().followers_seeded)
    }

    async fn mark_seeded(&self) -> Result<()> {
        let seeded = self.document().followers_seeded;
        if seeded {
            return Ok(());
        }
        self.update(|document| document.followers_seeded = true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn follower(id: &str) -> FollowerRecord {
        FollowerRecord {
            user_id: id.to_string(),
            user_name: format!("User{}", id),
            user_login: format!("user{}", id),
            followed_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_token_upsert_is_keyed_by_broadcaster() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::open(dir.path().join("store.json")).expect("open");

        assert!(!store.token_exists("123").await.unwrap());
        assert!(store.get_token("123").await.unwrap().is_none());

        store
            .upsert_token("123", &TokenPair::new("a1", "r1"))
            .await
            .unwrap();
        store
            .upsert_token("123", &TokenPair::new("a2", "r2"))
            .await
            .unwrap();
        store
            .upsert_token("456", &TokenPair::new("b1", "s1"))
            .await
            .unwrap();

        assert!(store.token_exists("123").await.unwrap());
        assert_eq!(
            store.get_token("123").await.unwrap(),
            Some(TokenPair::new("a2", "r2"))
        );
        assert_eq!(
            store.get_token("456").await.unwrap(),
            Some(TokenPair::new("b1", "s1"))
        );
    }

    #[tokio::test]
    async fn test_document_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("store.json");

        {
            let store = JsonStore::open(&path).expect("open");
            store
                .upsert_token("123", &TokenPair::new("a1", "r1").with_expiry(3600))
                .await
                .unwrap();
            store
                .upsert_followers(&[follower("1"), follower("2")])
                .await
                .unwrap();
        }

        let reopened = JsonStore::open(&path).expect("reopen");
        let pair = reopened.get_token("123").await.unwrap().expect("token");
        assert_eq!(pair.access_token, "a1");
        assert_eq!(pair.expires_in, Some(3600));
        assert!(pair.obtained_at.is_some());
        assert_eq!(reopened.followers().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_follower_upsert_and_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::open(dir.path().join("store.json")).expect("open");

        store
            .upsert_followers(&[follower("1"), follower("2")])
            .await
            .unwrap();

        let mut renamed = follower("2");
        renamed.user_name = "Renamed".to_string();
        store
            .upsert_followers(&[renamed.clone(), follower("3")])
            .await
            .unwrap();
        store.delete_follower("1").await.unwrap();

        let followers = store.followers().await.unwrap();
        assert_eq!(followers, vec![renamed, follower("3")]);
    }

    #[tokio::test]
    async fn test_seeded_marker_outlives_an_empty_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");

        {
            let store = JsonStore::open(&path).expect("open");
            assert!(!store.is_seeded().await.unwrap());
            store.upsert_followers(&[follower("1")]).await.unwrap();
            store.mark_seeded().await.unwrap();
            store.delete_follower("1").await.unwrap();
        }

        let reopened = JsonStore::open(&path).expect("reopen");
        assert!(reopened.followers().await.unwrap().is_empty());
        assert!(reopened.is_seeded().await.unwrap());
    }
}
