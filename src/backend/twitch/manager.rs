use futures_util::future::{BoxFuture, FutureExt, Shared};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

use super::auth::{build_authorization_url, AuthApi};
use super::error::{AuthError, AuthFailure, AuthFailureKind};
use super::tokens::{DeviceCodeSession, LifecycleState, TokenPair};
use crate::backend::storage::TokenStore;

const STATE_LENGTH: usize = 32;

/// How a missing or unrecoverable token gets replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReauthMode {
    /// A human opens the authorization URL and Twitch redirects back to the callback server
    Redirect,
    /// A human enters a user code on twitch.tv while the bot polls for the result
    DeviceCode,
}

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub broadcaster_id: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    pub id_base: String,
    pub mode: ReauthMode,
    pub device_code_timeout: Duration,
    pub open_browser: bool,
}

/// What the operator has to do to let a waiting authorization finish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationPrompt {
    Redirect { url: String, state: String },
    DeviceCode {
        verification_uri: String,
        user_code: String,
    },
}

type Transition = Shared<BoxFuture<'static, Result<TokenPair, AuthFailure>>>;

struct PendingGrant {
    state: String,
    sender: oneshot::Sender<TokenPair>,
}

#[derive(Default)]
struct ManagerState {
    lifecycle: LifecycleState,
    pair: Option<TokenPair>,
    in_flight: Option<Transition>,
    grant: Option<PendingGrant>,
    prompt: Option<AuthorizationPrompt>,
}

struct Inner {
    auth: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    settings: ManagerSettings,
    state: Mutex<ManagerState>,
}

/// Keeps the broadcaster's token pair valid.
///
/// Validation, refresh and re-authorization all run inside one shared
/// transition future. A caller arriving while a transition is in flight
/// awaits that transition instead of starting its own, so at most one
/// refresh or interactive grant happens at a time.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    pub fn new(
        auth: Arc<dyn AuthApi>,
        store: Arc<dyn TokenStore>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                auth,
                store,
                settings,
                state: Mutex::new(ManagerState::default()),
            }),
        }
    }

    pub fn broadcaster_id(&self) -> &str {
        &self.inner.settings.broadcaster_id
    }

    pub fn client_id(&self) -> &str {
        &self.inner.settings.client_id
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().lifecycle
    }

    /// The in-memory pair, without any network round trip
    pub fn current(&self) -> Option<TokenPair> {
        self.inner.lock().pair.clone()
    }

    pub fn pending_authorization(&self) -> Option<AuthorizationPrompt> {
        self.inner.lock().prompt.clone()
    }

    /// Return a token pair that Twitch has just confirmed as valid
    pub async fn ensure_valid(&self) -> Result<TokenPair, AuthFailure> {
        self.transition().await
    }

    /// Like [`ensure_valid`](Self::ensure_valid), but keeps retrying while
    /// Twitch is unreachable or answers with a server error. The delay
    /// doubles from one second up to `max_backoff`.
    pub async fn wait_until_valid(&self, max_backoff: Duration) -> Result<TokenPair, AuthFailure> {
        let mut delay = Duration::from_secs(1).min(max_backoff);
        loop {
            match self.ensure_valid().await {
                Err(failure) if failure.is_transient() => {
                    log::warn!("{}, retrying in {}s", failure, delay.as_secs());
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(max_backoff);
                }
                outcome => return outcome,
            }
        }
    }

    /// Called after Helix rejected `rejected_access_token` with 401.
    ///
    /// When the pair was already replaced by another caller the new one is
    /// returned directly, otherwise the token is validated again (and
    /// refreshed if it really expired).
    pub async fn recover_rejected(
        &self,
        rejected_access_token: &str,
    ) -> Result<TokenPair, AuthFailure> {
        let replaced = {
            let state = self.inner.lock();
            match (&state.pair, &state.in_flight) {
                (Some(pair), None)
                    if pair.access_token != rejected_access_token
                        && state.lifecycle == LifecycleState::Valid =>
                {
                    Some(pair.clone())
                }
                _ => None,
            }
        };

        match replaced {
            Some(pair) => Ok(pair),
            None => self.ensure_valid().await,
        }
    }

    /// Complete a pending redirect grant with the code Twitch sent to the callback
    pub async fn submit_authorization_code(
        &self,
        code: &str,
        state: Option<&str>,
    ) -> Result<TokenPair, AuthFailure> {
        {
            let guard = self.inner.lock();
            match &guard.grant {
                None => {
                    return Err(AuthFailure::new(
                        AuthFailureKind::Denied,
                        "no authorization is pending",
                    ))
                }
                Some(grant) if state != Some(grant.state.as_str()) => {
                    return Err(AuthFailure::new(
                        AuthFailureKind::Denied,
                        "state parameter does not match the pending authorization",
                    ))
                }
                Some(_) => {}
            }
        }

        let pair = self
            .inner
            .auth
            .exchange_code(code, &self.inner.settings.redirect_uri)
            .await
            .map_err(AuthFailure::from_auth_error)?;

        let grant = self.inner.lock().grant.take();
        let Some(grant) = grant else {
            return Err(AuthFailure::new(
                AuthFailureKind::Denied,
                "authorization was already completed",
            ));
        };

        self.inner.install(pair.clone()).await?;
        log::info!("Authorization code exchanged, token is valid");
        if grant.sender.send(pair.clone()).is_err() {
            log::debug!("Nobody was waiting for the authorization anymore");
        }
        Ok(pair)
    }

    fn transition(&self) -> Transition {
        let mut state = self.inner.lock();
        if let Some(in_flight) = &state.in_flight {
            return in_flight.clone();
        }

        let inner = self.inner.clone();
        let transition = async move {
            let outcome = inner.settle().await;
            inner.lock().in_flight = None;
            outcome
        }
        .boxed()
        .shared();

        state.in_flight = Some(transition.clone());
        transition
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_lifecycle(&self, lifecycle: LifecycleState) {
        let mut state = self.lock();
        if state.lifecycle != lifecycle {
            log::debug!("Token state: {} -> {}", state.lifecycle, lifecycle);
            state.lifecycle = lifecycle;
        }
    }

    async fn load_pair(&self) -> Result<Option<TokenPair>, AuthFailure> {
        let cached = self.lock().pair.clone();
        if cached.is_some() {
            return Ok(cached);
        }

        let stored = self
            .store
            .get_token(&self.settings.broadcaster_id)
            .await?
            .filter(TokenPair::is_set);
        if let Some(pair) = &stored {
            log::info!(
                "Loaded stored token for broadcaster {}",
                self.settings.broadcaster_id
            );
            self.lock().pair = Some(pair.clone());
        }
        Ok(stored)
    }

    /// Swap in a new pair and persist it
    async fn install(&self, pair: TokenPair) -> Result<(), AuthFailure> {
        {
            let mut state = self.lock();
            state.pair = Some(pair.clone());
            state.lifecycle = LifecycleState::Valid;
            state.prompt = None;
        }
        if let Some(expires_at) = pair.expires_at() {
            log::info!("New access token expires at {}", expires_at.to_rfc3339());
        }

        if let Err(e) = self
            .store
            .upsert_token(&self.settings.broadcaster_id, &pair)
            .await
        {
            log::error!("Failed to persist token: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    async fn settle(&self) -> Result<TokenPair, AuthFailure> {
        let Some(pair) = self.load_pair().await? else {
            log::warn!(
                "No token stored for broadcaster {}",
                self.settings.broadcaster_id
            );
            return self.reauthorize().await;
        };

        self.set_lifecycle(LifecycleState::Validating);
        match self.auth.validate(&pair.access_token).await {
            Ok(_) => {
                self.set_lifecycle(LifecycleState::Valid);
                Ok(pair)
            }
            Err(AuthError::Expired) => self.refresh(pair).await,
            Err(e) => {
                log::warn!("Token validation failed: {}", e);
                self.set_lifecycle(LifecycleState::Uninitialized);
                Err(AuthFailure::from_auth_error(e))
            }
        }
    }

    async fn refresh(&self, pair: TokenPair) -> Result<TokenPair, AuthFailure> {
        log::warn!("Access token expired, refreshing");
        self.set_lifecycle(LifecycleState::Refreshing);

        match self.auth.refresh(&pair.refresh_token).await {
            Ok(fresh) => {
                self.install(fresh.clone()).await?;
                log::info!("Access token refreshed");
                Ok(fresh)
            }
            Err(AuthError::Transport(message)) => {
                log::warn!("Token refresh could not reach Twitch: {}", message);
                self.set_lifecycle(LifecycleState::Uninitialized);
                Err(AuthFailure::new(AuthFailureKind::Transport, message))
            }
            Err(e) => {
                log::warn!("{}", e);
                self.reauthorize().await
            }
        }
    }

    async fn reauthorize(&self) -> Result<TokenPair, AuthFailure> {
        self.set_lifecycle(LifecycleState::ReauthRequired);
        log::warn!("Re-authorization required");

        match self.settings.mode {
            ReauthMode::Redirect => self.await_redirect_grant().await,
            ReauthMode::DeviceCode => self.await_device_grant().await,
        }
    }

    async fn await_redirect_grant(&self) -> Result<TokenPair, AuthFailure> {
        let csrf_state = random_state();
        let url = build_authorization_url(
            &self.settings.id_base,
            &self.settings.client_id,
            &self.settings.redirect_uri,
            &self.settings.scopes,
            Some(&csrf_state),
        );

        let (sender, receiver) = oneshot::channel();
        {
            let mut state = self.lock();
            state.grant = Some(PendingGrant {
                state: csrf_state.clone(),
                sender,
            });
            state.prompt = Some(AuthorizationPrompt::Redirect {
                url: url.clone(),
                state: csrf_state,
            });
            state.lifecycle = LifecycleState::AwaitingGrant;
        }

        log::warn!("Authorize the bot by opening {}", url);
        self.open_in_browser(&url);

        match receiver.await {
            Ok(pair) => Ok(pair),
            Err(_) => {
                let mut state = self.lock();
                state.lifecycle = LifecycleState::ReauthRequired;
                state.prompt = None;
                Err(AuthFailure::new(
                    AuthFailureKind::ReauthRequired,
                    "authorization was abandoned",
                ))
            }
        }
    }

    async fn await_device_grant(&self) -> Result<TokenPair, AuthFailure> {
        let session = match self.auth.request_device_code(&self.settings.scopes).await {
            Ok(session) => session,
            Err(e) => {
                log::error!("Device code request failed: {}", e);
                return Err(AuthFailure::from_auth_error(e));
            }
        };

        {
            let mut state = self.lock();
            state.prompt = Some(AuthorizationPrompt::DeviceCode {
                verification_uri: session.verification_uri.clone(),
                user_code: session.user_code.clone(),
            });
            state.lifecycle = LifecycleState::AwaitingGrant;
        }

        log::warn!(
            "Go to {} and enter the code {}",
            session.verification_uri,
            session.user_code
        );
        self.open_in_browser(&session.verification_uri);

        let mut limit = self.settings.device_code_timeout;
        if session.expires_in > 0 {
            limit = limit.min(Duration::from_secs(session.expires_in));
        }

        let outcome = match tokio::time::timeout(limit, self.poll_device_code(&session)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AuthFailure::new(
                AuthFailureKind::Timeout,
                format!("device code not confirmed within {}s", limit.as_secs()),
            )),
        };

        match outcome {
            Ok(pair) => {
                self.install(pair.clone()).await?;
                log::info!("Device code confirmed, token is valid");
                Ok(pair)
            }
            Err(failure) => {
                log::error!("{}", failure);
                let mut state = self.lock();
                state.lifecycle = LifecycleState::ReauthRequired;
                state.prompt = None;
                Err(failure)
            }
        }
    }

    async fn poll_device_code(&self, session: &DeviceCodeSession) -> Result<TokenPair, AuthFailure> {
        let interval = Duration::from_secs(session.interval.max(1));
        let mut attempts = 0u32;

        loop {
            tokio::time::sleep(interval).await;
            attempts += 1;

            match self
                .auth
                .exchange_device_code(&session.device_code, &self.settings.scopes)
                .await
            {
                Ok(pair) => {
                    log::debug!("Device code confirmed after {} attempts", attempts);
                    return Ok(pair);
                }
                Err(AuthError::Pending) => {
                    log::trace!("Device code still pending (attempt {})", attempts);
                }
                Err(AuthError::Transport(e)) => {
                    log::debug!("Device code poll failed, retrying: {}", e);
                }
                Err(e) => return Err(AuthFailure::from_auth_error(e)),
            }
        }
    }

    fn open_in_browser(&self, url: &str) {
        if !self.settings.open_browser {
            return;
        }
        match open::that(url) {
            Ok(_) => log::info!("Opened authorization page in the browser"),
            Err(e) => log::warn!("Couldn't open the browser: {}", e),
        }
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}
