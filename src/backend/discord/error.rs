use std::fmt;

/// Errors that can occur while talking to Discord
#[derive(Debug)]
pub enum DiscordError {
    /// HTTP request error
    HttpError(String),

    /// JSON parsing error
    JsonError(String),

    /// WebSocket connection error
    WebSocketError(String),

    /// Discord answered with a non-2xx status
    Upstream { status: u16, message: String },

    /// The gateway closed with a code that must not be retried
    Fatal { code: u16, reason: String },
}

impl fmt::Display for DiscordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscordError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            DiscordError::JsonError(msg) => write!(f, "JSON error: {}", msg),
            DiscordError::WebSocketError(msg) => write!(f, "WebSocket error: {}", msg),
            DiscordError::Upstream { status, message } => {
                write!(f, "Discord returned {}: {}", status, message)
            }
            DiscordError::Fatal { code, reason } => {
                write!(f, "Gateway closed with {}: {}", code, reason)
            }
        }
    }
}

impl std::error::Error for DiscordError {}

impl From<serde_json::Error> for DiscordError {
    fn from(err: serde_json::Error) -> Self {
        DiscordError::JsonError(err.to_string())
    }
}

impl From<reqwest::Error> for DiscordError {
    fn from(err: reqwest::Error) -> Self {
        DiscordError::HttpError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DiscordError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        DiscordError::WebSocketError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DiscordError>;
