use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::diff::{diff_followers, FollowerEvent};
use crate::backend::commands::to_discord_timestamp;
use crate::backend::discord::{DiscordError, DiscordHttp};
use crate::backend::storage::{FollowerStore, StorageError};
use crate::backend::twitch::{TwitchApi, TwitchError};

#[derive(Debug)]
pub enum FollowerError {
    Twitch(TwitchError),
    Storage(StorageError),
    Announce(String),
}

impl fmt::Display for FollowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FollowerError::Twitch(e) => write!(f, "Failed to list followers: {}", e),
            FollowerError::Storage(e) => write!(f, "Failed to update the follower snapshot: {}", e),
            FollowerError::Announce(msg) => write!(f, "Failed to announce follower change: {}", msg),
        }
    }
}

impl std::error::Error for FollowerError {}

impl From<TwitchError> for FollowerError {
    fn from(err: TwitchError) -> Self {
        FollowerError::Twitch(err)
    }
}

impl From<StorageError> for FollowerError {
    fn from(err: StorageError) -> Self {
        FollowerError::Storage(err)
    }
}

impl From<DiscordError> for FollowerError {
    fn from(err: DiscordError) -> Self {
        FollowerError::Announce(err.to_string())
    }
}

/// Where follower changes are posted
#[async_trait]
pub trait FollowerAnnouncer: Send + Sync {
    async fn announce(&self, event: &FollowerEvent, total: u64) -> Result<(), FollowerError>;
}

/// Posts follower changes to a Discord channel webhook
pub struct WebhookAnnouncer {
    http: DiscordHttp,
    url: String,
}

impl WebhookAnnouncer {
    pub fn new(http: DiscordHttp, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

pub fn announcement(event: &FollowerEvent, total: u64) -> String {
    let follower = event.follower();
    match event {
        FollowerEvent::Followed(_) => format!(
            "**{}** ({}) is now following! Followed at {}\nFollowers: {}",
            follower.user_name,
            follower.user_login,
            to_discord_timestamp(&follower.followed_at),
            total
        ),
        FollowerEvent::Unfollowed(_) => format!(
            "**{}** ({}) is no longer following (followed since {})\nFollowers: {}",
            follower.user_name,
            follower.user_login,
            to_discord_timestamp(&follower.followed_at),
            total
        ),
    }
}

#[async_trait]
impl FollowerAnnouncer for WebhookAnnouncer {
    async fn announce(&self, event: &FollowerEvent, total: u64) -> Result<(), FollowerError> {
        self.http
            .execute_webhook(&self.url, &announcement(event, total))
            .await?;
        Ok(())
    }
}

/// Summary of one pass over the follower listing
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub seeded: bool,
    pub announced: usize,
    pub failed: usize,
}

/// Periodically lists the channel followers and announces the difference to
/// the persisted snapshot.
///
/// A change is applied to the snapshot only after it was announced, so a
/// failed announcement is retried on the next pass.
pub struct FollowerWatcher {
    api: Arc<TwitchApi>,
    store: Arc<dyn FollowerStore>,
    announcer: Arc<dyn FollowerAnnouncer>,
    interval: Duration,
}

impl FollowerWatcher {
    pub fn new(
        api: Arc<TwitchApi>,
        store: Arc<dyn FollowerStore>,
        announcer: Arc<dyn FollowerAnnouncer>,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            store,
            announcer,
            interval,
        }
    }

    /// Run forever. The next pass is scheduled only once the previous one
    /// finished, so passes never overlap.
    pub async fn run(self) {
        log::info!(
            "Watching followers every {} seconds",
            self.interval.as_secs()
        );
        loop {
            match self.tick().await {
                Ok(report) if report.announced > 0 || report.failed > 0 => {
                    log::info!(
                        "Follower pass: {} announced, {} pending",
                        report.announced,
                        report.failed
                    );
                }
                Ok(_) => {}
                Err(e) => log::warn!("{}", e),
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    pub async fn tick(&self) -> Result<TickReport, FollowerError> {
        let listing = self.api.get_channel_followers().await?;

        if !self.store.is_seeded().await? {
            self.store.upsert_followers(&listing.followers).await?;
            self.store.mark_seeded().await?;
            log::info!(
                "Stored initial snapshot of {} followers",
                listing.followers.len()
            );
            return Ok(TickReport {
                seeded: true,
                ..TickReport::default()
            });
        }

        let previous = self.store.followers().await?;
        let mut report = TickReport::default();
        for event in diff_followers(&previous, &listing.followers) {
            if let Err(e) = self.announcer.announce(&event, listing.total).await {
                log::warn!("{}", e);
                report.failed += 1;
                continue;
            }

            match &event {
                FollowerEvent::Followed(follower) => {
                    log::info!("New follower: {}", follower.user_login);
                    self.store
                        .upsert_followers(std::slice::from_ref(follower))
                        .await?;
                }
                FollowerEvent::Unfollowed(follower) => {
                    log::info!("Lost follower: {}", follower.user_login);
                    self.store.delete_follower(&follower.user_id).await?;
                }
            }
            report.announced += 1;
        }

        // Keep names of known followers current
        let known: HashSet<&str> = previous.iter().map(|f| f.user_id.as_str()).collect();
        let still_following: Vec<_> = listing
            .followers
            .iter()
            .filter(|f| known.contains(f.user_id.as_str()))
            .cloned()
            .collect();
        self.store.upsert_followers(&still_following).await?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::FollowerRecord;
    use crate::backend::testing::{follower, manager_with_token, FakeAuth, MemoryStore};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingAnnouncer {
        events: Mutex<Vec<FollowerEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl FollowerAnnouncer for RecordingAnnouncer {
        async fn announce(&self, event: &FollowerEvent, _total: u64) -> Result<(), FollowerError> {
            if self.fail {
                return Err(FollowerError::Announce("webhook down".to_string()));
            }
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    async fn listing(server: &MockServer, followers: &[FollowerRecord]) {
        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/channels/followers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": followers,
                "pagination": {},
                "total": followers.len()
            })))
            .mount(server)
            .await;
    }

    fn watcher(
        server: &MockServer,
        store: Arc<MemoryStore>,
        announcer: Arc<RecordingAnnouncer>,
    ) -> FollowerWatcher {
        let auth = Arc::new(FakeAuth::with_valid(&["a1"]));
        let api = TwitchApi::new(server.uri(), manager_with_token(&auth, "a1"));
        FollowerWatcher::new(Arc::new(api), store, announcer, Duration::from_secs(60))
    }

    async fn ids(store: &MemoryStore) -> Vec<String> {
        let mut ids: Vec<String> = store
            .followers()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.user_id)
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_first_pass_seeds_silently() {
        let server = MockServer::start().await;
        listing(&server, &[follower("a", "A"), follower("b", "B")]).await;

        let store = Arc::new(MemoryStore::default());
        let announcer = Arc::new(RecordingAnnouncer::default());
        let report = watcher(&server, store.clone(), announcer.clone())
            .tick()
            .await
            .unwrap();

        assert!(report.seeded);
        assert!(announcer.events.lock().unwrap().is_empty());
        assert_eq!(ids(&store).await, vec!["a", "b"]);
        assert!(store.is_seeded().await.unwrap());
    }

    #[tokio::test]
    async fn test_follower_after_everyone_left_is_announced() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::with_followers(&[follower("a", "A")]));
        let announcer = Arc::new(RecordingAnnouncer::default());
        let watcher = watcher(&server, store.clone(), announcer.clone());

        listing(&server, &[]).await;
        let report = watcher.tick().await.unwrap();
        assert!(!report.seeded);
        assert_eq!(report.announced, 1);
        assert!(ids(&store).await.is_empty());

        listing(&server, &[follower("c", "C")]).await;
        let report = watcher.tick().await.unwrap();
        assert!(!report.seeded);
        assert_eq!(report.announced, 1);

        assert_eq!(
            *announcer.events.lock().unwrap(),
            vec![
                FollowerEvent::Unfollowed(follower("a", "A")),
                FollowerEvent::Followed(follower("c", "C")),
            ]
        );
        assert_eq!(ids(&store).await, vec!["c"]);
    }

    #[tokio::test]
    async fn test_channel_without_followers_is_seeded_once() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::default());
        let announcer = Arc::new(RecordingAnnouncer::default());
        let watcher = watcher(&server, store.clone(), announcer.clone());

        listing(&server, &[]).await;
        assert!(watcher.tick().await.unwrap().seeded);

        listing(&server, &[follower("b", "B")]).await;
        let report = watcher.tick().await.unwrap();
        assert!(!report.seeded);
        assert_eq!(
            *announcer.events.lock().unwrap(),
            vec![FollowerEvent::Followed(follower("b", "B"))]
        );
    }

    #[tokio::test]
    async fn test_changes_are_announced_and_persisted() {
        let server = MockServer::start().await;
        listing(&server, &[follower("b", "B"), follower("c", "C")]).await;

        let store = Arc::new(MemoryStore::with_followers(&[
            follower("a", "A"),
            follower("b", "B"),
        ]));
        let announcer = Arc::new(RecordingAnnouncer::default());

        let report = watcher(&server, store.clone(), announcer.clone())
            .tick()
            .await
            .unwrap();

        assert_eq!(report.announced, 2);
        assert_eq!(
            *announcer.events.lock().unwrap(),
            vec![
                FollowerEvent::Followed(follower("c", "C")),
                FollowerEvent::Unfollowed(follower("a", "A")),
            ]
        );
        assert_eq!(ids(&store).await, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_failed_announcement_is_retried_next_pass() {
        let server = MockServer::start().await;
        listing(&server, &[follower("a", "A"), follower("c", "C")]).await;

        let store = Arc::new(MemoryStore::with_followers(&[follower("a", "A")]));

        let failing = Arc::new(RecordingAnnouncer {
            fail: true,
            ..RecordingAnnouncer::default()
        });
        let report = watcher(&server, store.clone(), failing)
            .tick()
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(ids(&store).await, vec!["a"]);

        let announcer = Arc::new(RecordingAnnouncer::default());
        watcher(&server, store.clone(), announcer.clone())
            .tick()
            .await
            .unwrap();
        assert_eq!(
            *announcer.events.lock().unwrap(),
            vec![FollowerEvent::Followed(follower("c", "C"))]
        );
        assert_eq!(ids(&store).await, vec!["a", "c"]);
    }

    #[test]
    fn test_announcement_text() {
        let text = announcement(&FollowerEvent::Followed(follower("c", "Carla")), 42);
        assert!(text.contains("**Carla** (carla) is now following!"));
        assert!(text.contains("<t:1714588200>"));
        assert!(text.ends_with("Followers: 42"));
    }
}
