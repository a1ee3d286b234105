use std::fmt;

use crate::backend::storage::StorageError;

/// Errors that can occur during Twitch operations
#[derive(Debug)]
pub enum TwitchError {
    /// HTTP request error
    HttpError(String),

    /// JSON parsing error
    JsonError(String),

    /// Twitch answered with a non-2xx status
    Upstream { status: u16, message: String },

    /// No usable access token could be obtained
    Auth(AuthFailure),

    /// The response carried no matching entry
    NotFound(String),
}

impl fmt::Display for TwitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TwitchError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            TwitchError::JsonError(msg) => write!(f, "JSON error: {}", msg),
            TwitchError::Upstream { status, message } => {
                write!(f, "Twitch returned {}: {}", status, message)
            }
            TwitchError::Auth(failure) => write!(f, "Authentication error: {}", failure),
            TwitchError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for TwitchError {}

impl From<serde_json::Error> for TwitchError {
    fn from(err: serde_json::Error) -> Self {
        TwitchError::JsonError(err.to_string())
    }
}

impl From<reqwest::Error> for TwitchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TwitchError::JsonError(err.to_string())
        } else {
            TwitchError::HttpError(err.to_string())
        }
    }
}

impl From<AuthFailure> for TwitchError {
    fn from(failure: AuthFailure) -> Self {
        TwitchError::Auth(failure)
    }
}

pub type Result<T> = std::result::Result<T, TwitchError>;

/// Classification of a single call against the Twitch OAuth endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The access token was rejected with 401
    Expired,

    /// Validation failed with any other status
    Other { status: u16, message: String },

    /// The refresh token was not accepted
    RefreshFailed { status: u16, message: String },

    /// Device code not confirmed yet, keep polling
    Pending,

    /// Code exchange or device-code request refused
    Denied { status: u16, message: String },

    /// The request never produced a usable response
    Transport(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Expired => write!(f, "access token expired"),
            AuthError::Other { status, message } => {
                write!(f, "validation failed with {}: {}", status, message)
            }
            AuthError::RefreshFailed { status, message } => {
                write!(f, "token refresh failed with {}: {}", status, message)
            }
            AuthError::Pending => write!(f, "authorization pending"),
            AuthError::Denied { status, message } => {
                write!(f, "authorization denied with {}: {}", status, message)
            }
            AuthError::Transport(msg) => write!(f, "request failed: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Transport(err.to_string())
    }
}

/// What a caller of the token manager can see go wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    /// A human has to complete authorization before calls can proceed
    ReauthRequired,
    /// The authorization attempt was refused
    Denied,
    /// The device code was not confirmed in time
    Timeout,
    /// Twitch answered validation with an unexpected status
    Upstream(u16),
    /// Twitch could not be reached
    Transport,
    /// The token record could not be read or written
    Storage,
}

/// Outcome of a failed token transition. Cloneable because every caller
/// waiting on the same transition receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    pub kind: AuthFailureKind,
    pub message: String,
}

impl AuthFailure {
    pub fn new(kind: AuthFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failures another attempt may get past without a human stepping in
    pub fn is_transient(&self) -> bool {
        match self.kind {
            AuthFailureKind::Transport => true,
            AuthFailureKind::Upstream(status) => status == 429 || status >= 500,
            _ => false,
        }
    }

    /// Map a client error that ends the current attempt
    pub fn from_auth_error(err: AuthError) -> Self {
        match err {
            AuthError::Other { status, message } => {
                AuthFailure::new(AuthFailureKind::Upstream(status), message)
            }
            AuthError::Transport(message) => AuthFailure::new(AuthFailureKind::Transport, message),
            AuthError::Expired | AuthError::RefreshFailed { .. } => {
                AuthFailure::new(AuthFailureKind::ReauthRequired, err.to_string())
            }
            AuthError::Pending | AuthError::Denied { .. } => {
                AuthFailure::new(AuthFailureKind::Denied, err.to_string())
            }
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AuthFailureKind::ReauthRequired => {
                write!(f, "re-authorization required: {}", self.message)
            }
            AuthFailureKind::Denied => write!(f, "authorization denied: {}", self.message),
            AuthFailureKind::Timeout => write!(f, "authorization timed out: {}", self.message),
            AuthFailureKind::Upstream(status) => {
                write!(f, "Twitch returned {}: {}", status, self.message)
            }
            AuthFailureKind::Transport => write!(f, "Twitch unreachable: {}", self.message),
            AuthFailureKind::Storage => write!(f, "token storage failed: {}", self.message),
        }
    }
}

impl std::error::Error for AuthFailure {}

impl From<StorageError> for AuthFailure {
    fn from(err: StorageError) -> Self {
        AuthFailure::new(AuthFailureKind::Storage, err.to_string())
    }
}
