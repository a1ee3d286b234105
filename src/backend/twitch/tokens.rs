use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder written by older versions of the bot for "no token yet"
pub const UNSET_TOKEN: &str = "N/A";

/// An OAuth access/refresh token pair.
///
/// The pair is always replaced as a unit; a refresh never updates only one
/// of the two tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in: None,
            obtained_at: None,
        }
    }

    /// Record the lifetime reported by Twitch, counted from now
    pub fn with_expiry(mut self, expires_in: u64) -> Self {
        self.expires_in = Some(expires_in);
        self.obtained_at = Some(Utc::now());
        self
    }

    /// Both tokens present and neither is the legacy placeholder
    pub fn is_set(&self) -> bool {
        [&self.access_token, &self.refresh_token]
            .iter()
            .all(|token| !token.is_empty() && token.as_str() != UNSET_TOKEN)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let obtained_at = self.obtained_at?;
        let expires_in = i64::try_from(self.expires_in?).ok()?;
        Some(obtained_at + Duration::seconds(expires_in))
    }
}

// Keep tokens out of logs
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Response from the token endpoint (code exchange, refresh, device code)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)] // Part of Twitch API response
    pub scope: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)] // Part of Twitch API response
    pub token_type: Option<String>,
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        let pair = TokenPair::new(response.access_token, response.refresh_token);
        match response.expires_in {
            Some(expires_in) => pair.with_expiry(expires_in),
            None => TokenPair {
                obtained_at: Some(Utc::now()),
                ..pair
            },
        }
    }
}

/// Metadata returned by the validation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenInfo {
    pub client_id: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
}

/// A device-code authorization in progress. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceCodeSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds to wait between polls
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
    /// Seconds until the device code expires, 0 when not reported
    #[serde(default)]
    pub expires_in: u64,
}

fn default_poll_interval() -> u64 {
    1
}

/// Where the token manager currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Validating,
    Valid,
    Refreshing,
    ReauthRequired,
    AwaitingGrant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Validating => "validating",
            LifecycleState::Valid => "valid",
            LifecycleState::Refreshing => "refreshing",
            LifecycleState::ReauthRequired => "re-authorization required",
            LifecycleState::AwaitingGrant => "awaiting grant",
        };
        f.write_str(name)
    }
}
