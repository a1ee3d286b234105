//! In-memory stand-ins for the Twitch identity service and the stores

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::storage::{self, FollowerRecord, FollowerStore, TokenStore};
use crate::backend::twitch::{
    AuthApi, AuthError, DeviceCodeSession, ManagerSettings, ReauthMode, TokenInfo, TokenManager,
    TokenPair,
};

pub const GOOD_CODE: &str = "good-code";

pub struct FakeAuth {
    valid_tokens: Mutex<HashSet<String>>,
    expiring: Mutex<HashMap<String, usize>>,
    validate_error: Option<AuthError>,
    validate_script: Mutex<VecDeque<AuthError>>,
    refresh_result: Result<TokenPair, AuthError>,
    refresh_delay: Duration,
    device_script: Mutex<VecDeque<Result<TokenPair, AuthError>>>,
    pub validate_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub device_polls: AtomicUsize,
    pub code_exchanges: AtomicUsize,
}

impl FakeAuth {
    /// Accepts exactly the given access tokens; everything else is expired
    pub fn with_valid(tokens: &[&str]) -> Self {
        Self {
            valid_tokens: Mutex::new(tokens.iter().map(|t| t.to_string()).collect()),
            expiring: Mutex::new(HashMap::new()),
            validate_error: None,
            validate_script: Mutex::new(VecDeque::new()),
            refresh_result: Ok(TokenPair::new("refreshed-access", "refreshed-refresh")),
            refresh_delay: Duration::ZERO,
            device_script: Mutex::new(VecDeque::new()),
            validate_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            device_polls: AtomicUsize::new(0),
            code_exchanges: AtomicUsize::new(0),
        }
    }

    pub fn refreshing_to(mut self, pair: TokenPair) -> Self {
        self.refresh_result = Ok(pair);
        self
    }

    pub fn failing_refresh(mut self) -> Self {
        self.refresh_result = Err(AuthError::RefreshFailed {
            status: 400,
            message: "Invalid refresh token".to_string(),
        });
        self
    }

    pub fn failing_validation(mut self, error: AuthError) -> Self {
        self.validate_error = Some(error);
        self
    }

    /// The next validations fail with `errors`, one each, before the
    /// accepted tokens apply again
    pub fn with_validation_errors(self, errors: Vec<AuthError>) -> Self {
        *self.validate_script.lock().unwrap() = errors.into();
        self
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Responses for successive device-code polls; `Pending` once exhausted
    pub fn with_device_script(self, script: Vec<Result<TokenPair, AuthError>>) -> Self {
        *self.device_script.lock().unwrap() = script.into();
        self
    }

    /// `token` passes `validations` more validations, then reports expired
    pub fn expiring_after(self, token: &str, validations: usize) -> Self {
        self.expiring
            .lock()
            .unwrap()
            .insert(token.to_string(), validations);
        self
    }

    fn accept(&self, pair: &TokenPair) {
        self.valid_tokens
            .lock()
            .unwrap()
            .insert(pair.access_token.clone());
    }
}

#[async_trait]
impl AuthApi for FakeAuth {
    async fn validate(&self, access_token: &str) -> Result<TokenInfo, AuthError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.validate_error {
            return Err(error.clone());
        }
        if let Some(error) = self.validate_script.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut valid_tokens = self.valid_tokens.lock().unwrap();
        if let Some(remaining) = self.expiring.lock().unwrap().get_mut(access_token) {
            if *remaining == 0 {
                valid_tokens.remove(access_token);
            } else {
                *remaining -= 1;
            }
        }
        if !valid_tokens.contains(access_token) {
            return Err(AuthError::Expired);
        }
        Ok(TokenInfo {
            client_id: "cid".to_string(),
            login: Some("streamer".to_string()),
            scopes: Vec::new(),
            user_id: Some("1001".to_string()),
            expires_in: 3600,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        if let Ok(pair) = &self.refresh_result {
            self.accept(pair);
        }
        self.refresh_result.clone()
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<TokenPair, AuthError> {
        self.code_exchanges.fetch_add(1, Ordering::SeqCst);
        if code != GOOD_CODE {
            return Err(AuthError::Denied {
                status: 400,
                message: "Invalid authorization code".to_string(),
            });
        }
        let pair = TokenPair::new("code-access", "code-refresh");
        self.accept(&pair);
        Ok(pair)
    }

    async fn request_device_code(&self, _scopes: &[String]) -> Result<DeviceCodeSession, AuthError> {
        Ok(DeviceCodeSession {
            device_code: "dc".to_string(),
            user_code: "ABCD-EFGH".to_string(),
            verification_uri: "https://www.twitch.tv/activate".to_string(),
            interval: 1,
            expires_in: 1800,
        })
    }

    async fn exchange_device_code(
        &self,
        _device_code: &str,
        _scopes: &[String],
    ) -> Result<TokenPair, AuthError> {
        self.device_polls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .device_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AuthError::Pending));
        if let Ok(pair) = &next {
            self.accept(pair);
        }
        next
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tokens: Mutex<HashMap<String, TokenPair>>,
    followers: Mutex<Vec<FollowerRecord>>,
    seeded: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_token(broadcaster_id: &str, pair: TokenPair) -> Self {
        let store = Self::default();
        store
            .tokens
            .lock()
            .unwrap()
            .insert(broadcaster_id.to_string(), pair);
        store
    }

    /// A store that already holds a follower snapshot
    pub fn with_followers(followers: &[FollowerRecord]) -> Self {
        let store = Self::default();
        *store.followers.lock().unwrap() = followers.to_vec();
        *store.seeded.lock().unwrap() = true;
        store
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get_token(&self, broadcaster_id: &str) -> storage::Result<Option<TokenPair>> {
        Ok(self.tokens.lock().unwrap().get(broadcaster_id).cloned())
    }

    async fn upsert_token(&self, broadcaster_id: &str, pair: &TokenPair) -> storage::Result<()> {
        self.tokens
            .lock()
            .unwrap()
            .insert(broadcaster_id.to_string(), pair.clone());
        Ok(())
    }

    async fn token_exists(&self, broadcaster_id: &str) -> storage::Result<bool> {
        Ok(self.tokens.lock().unwrap().contains_key(broadcaster_id))
    }
}

#[async_trait]
impl FollowerStore for MemoryStore {
    async fn followers(&self) -> storage::Result<Vec<FollowerRecord>> {
        Ok(self.followers.lock().unwrap().clone())
    }

    async fn upsert_followers(&self, followers: &[FollowerRecord]) -> storage::Result<()> {
        let mut stored = self.followers.lock().unwrap();
        for follower in followers {
            match stored.iter_mut().find(|f| f.user_id == follower.user_id) {
                Some(existing) => *existing = follower.clone(),
                None => stored.push(follower.clone()),
            }
        }
        Ok(())
    }

    async fn delete_follower(&self, user_id: &str) -> storage::Result<()> {
        self.followers.lock().unwrap().retain(|f| f.user_id != user_id);
        Ok(())
    }

    async fn is_seeded(&self) -> storage::Result<bool> {
        Ok(*self.seeded.lock().unwrap())
    }

    async fn mark_seeded(&self) -> storage::Result<()> {
        *self.seeded.lock().unwrap() = true;
        Ok(())
    }
}

pub const BROADCASTER: &str = "1001";

pub fn settings(mode: ReauthMode) -> ManagerSettings {
    ManagerSettings {
        broadcaster_id: BROADCASTER.to_string(),
        client_id: "cid".to_string(),
        scopes: vec!["channel:read:polls".to_string()],
        redirect_uri: "http://localhost:3000".to_string(),
        id_base: "https://id.example".to_string(),
        mode,
        device_code_timeout: Duration::from_secs(30),
        open_browser: false,
    }
}

/// A redirect-mode manager whose stored access token is `access`
pub fn manager_with_token(auth: &Arc<FakeAuth>, access: &str) -> TokenManager {
    let store = Arc::new(MemoryStore::with_token(
        BROADCASTER,
        TokenPair::new(access, "refresh"),
    ));
    TokenManager::new(auth.clone(), store, settings(ReauthMode::Redirect))
}

pub fn follower(id: &str, name: &str) -> FollowerRecord {
    FollowerRecord {
        user_id: id.to_string(),
        user_name: name.to_string(),
        user_login: name.to_lowercase(),
        followed_at: "2024-05-01T18:30:00Z".to_string(),
    }
}
