/// Twitch integration: token lifecycle and the Helix resources the bot uses
///
/// The [`TokenManager`] is the only owner of the broadcaster's token pair.
/// It validates the pair, refreshes it when Twitch reports it expired and
/// falls back to an interactive grant (redirect or device code) when the
/// refresh token is no longer accepted. [`TwitchApi`] obtains its bearer
/// token exclusively through the manager.
///
/// # Example Usage
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use crate::backend::storage::SqliteStore;
/// use crate::backend::twitch::{
///     ClientCredentials, ManagerSettings, ReauthMode, TokenManager, TwitchApi,
///     TwitchAuthClient, HELIX_URL, TWITCH_ID_URL,
/// };
///
/// #[tokio::main]
/// async fn main() {
///     let credentials = ClientCredentials {
///         client_id: "your_client_id".to_string(),
///         client_secret: "your_client_secret".to_string(),
///     };
///     let auth = Arc::new(TwitchAuthClient::new(credentials, TWITCH_ID_URL));
///     let store = Arc::new(SqliteStore::open("data/twitchcord.db").unwrap());
///
///     let manager = TokenManager::new(auth, store, ManagerSettings {
///         broadcaster_id: "123456".to_string(),
///         client_id: "your_client_id".to_string(),
///         scopes: vec!["channel:read:polls".to_string()],
///         redirect_uri: "http://localhost:3000".to_string(),
///         id_base: TWITCH_ID_URL.to_string(),
///         mode: ReauthMode::Redirect,
///         device_code_timeout: Duration::from_secs(600),
///         open_browser: true,
///     });
///
///     let api = TwitchApi::new(HELIX_URL, manager);
///     let poll = api.get_poll(None).await.unwrap();
///     println!("{}", poll.title);
/// }
/// ```

mod api;
mod auth;
mod error;
mod manager;
mod models;
mod tokens;

// Re-export public types
pub use api::{NewPoll, NewPrediction, TwitchApi, UserLookup};
pub use auth::{
    build_authorization_url, build_device_code_request, localhost_redirect_uri, AuthApi,
    ClientCredentials, DeviceCodeRequest, TwitchAuthClient, TwitchEndpoints, HELIX_URL,
    TWITCH_ID_URL,
};
pub use error::{AuthError, AuthFailure, AuthFailureKind, Result, TwitchError};
pub use manager::{AuthorizationPrompt, ManagerSettings, ReauthMode, TokenManager};
pub use models::{
    ChannelFollowers, Poll, PollChoice, Prediction, PredictionOutcome, TopPredictor, UserData,
};
pub use tokens::{DeviceCodeSession, LifecycleState, TokenInfo, TokenPair, UNSET_TOKEN};
