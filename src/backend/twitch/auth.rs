use async_trait::async_trait;

use super::error::AuthError;
use super::tokens::{DeviceCodeSession, TokenInfo, TokenPair, TokenResponse};

pub const TWITCH_ID_URL: &str = "https://id.twitch.tv/oauth2";
pub const HELIX_URL: &str = "https://api.twitch.tv/helix";

const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Base URLs of the Twitch identity and Helix services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchEndpoints {
    pub id_base: String,
    pub helix_base: String,
}

impl Default for TwitchEndpoints {
    fn default() -> Self {
        Self {
            id_base: TWITCH_ID_URL.to_string(),
            helix_base: HELIX_URL.to_string(),
        }
    }
}

/// Application credentials registered with Twitch
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Redirect URI for the local callback server
pub fn localhost_redirect_uri(port: u16) -> String {
    format!("http://localhost:{}", port)
}

/// Build the URL a human opens to grant the bot access
pub fn build_authorization_url(
    id_base: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: Option<&str>,
) -> String {
    let mut url = format!(
        "{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}",
        id_base,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes.join(" ")),
    );
    if let Some(state) = state {
        url.push_str("&state=");
        url.push_str(&urlencoding::encode(state));
    }
    url
}

/// A form POST against the device endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCodeRequest {
    pub url: String,
    pub form: Vec<(String, String)>,
}

pub fn build_device_code_request(
    id_base: &str,
    client_id: &str,
    scopes: &[String],
) -> DeviceCodeRequest {
    DeviceCodeRequest {
        url: format!("{}/device", id_base),
        form: vec![
            ("client_id".to_string(), client_id.to_string()),
            ("scopes".to_string(), scopes.join(" ")),
        ],
    }
}

/// Network operations against the Twitch identity service.
///
/// None of these touch stored state; persisting the result is up to the
/// caller.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn validate(&self, access_token: &str) -> Result<TokenInfo, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenPair, AuthError>;

    async fn request_device_code(&self, scopes: &[String]) -> Result<DeviceCodeSession, AuthError>;

    async fn exchange_device_code(
        &self,
        device_code: &str,
        scopes: &[String],
    ) -> Result<TokenPair, AuthError>;
}

/// reqwest-backed client for `id.twitch.tv`
pub struct TwitchAuthClient {
    client: reqwest::Client,
    credentials: ClientCredentials,
    id_base: String,
}

impl TwitchAuthClient {
    pub fn new(credentials: ClientCredentials, id_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            id_base: id_base.into(),
        }
    }

    fn token_url(&self) -> String {
        format!("{}/token", self.id_base)
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
    ) -> Result<(u16, reqwest::Response), AuthError> {
        let response = self
            .client
            .post(self.token_url())
            .form(params)
            .send()
            .await?;
        Ok((response.status().as_u16(), response))
    }
}

async fn error_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string())
}

async fn parse_token_response(response: reqwest::Response) -> Result<TokenPair, AuthError> {
    let token_response = response.json::<TokenResponse>().await?;
    Ok(token_response.into())
}

#[async_trait]
impl AuthApi for TwitchAuthClient {
    async fn validate(&self, access_token: &str) -> Result<TokenInfo, AuthError> {
        let response = self
            .client
            .get(format!("{}/validate", self.id_base))
            .header("Authorization", format!("OAuth {}", access_token))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(AuthError::Expired);
        }
        if !status.is_success() {
            return Err(AuthError::Other {
                status: status.as_u16(),
                message: error_text(response).await,
            });
        }

        Ok(response.json::<TokenInfo>().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let (status, response) = self.post_token_form(&params).await?;
        if !(200..300).contains(&status) {
            return Err(AuthError::RefreshFailed {
                status,
                message: error_text(response).await,
            });
        }

        parse_token_response(response).await
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenPair, AuthError> {
        let mut params = vec![
            ("client_id", self.credentials.client_id.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];
        if !self.credentials.client_secret.is_empty() {
            params.push(("client_secret", self.credentials.client_secret.as_str()));
        }

        let (status, response) = self.post_token_form(&params).await?;
        if !(200..300).contains(&status) {
            return Err(AuthError::Denied {
                status,
                message: error_text(response).await,
            });
        }

        parse_token_response(response).await
    }

    async fn request_device_code(&self, scopes: &[String]) -> Result<DeviceCodeSession, AuthError> {
        let request = build_device_code_request(&self.id_base, &self.credentials.client_id, scopes);
        let response = self
            .client
            .post(&request.url)
            .form(&request.form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Denied {
                status: status.as_u16(),
                message: error_text(response).await,
            });
        }

        Ok(response.json::<DeviceCodeSession>().await?)
    }

    async fn exchange_device_code(
        &self,
        device_code: &str,
        scopes: &[String],
    ) -> Result<TokenPair, AuthError> {
        let scopes = scopes.join(" ");
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("scopes", scopes.as_str()),
            ("device_code", device_code),
            ("grant_type", DEVICE_CODE_GRANT_TYPE),
        ];

        let (status, response) = self.post_token_form(&params).await?;
        match status {
            200..=299 => parse_token_response(response).await,
            // authorization_pending and slow_down both come back as 400
            400 => Err(AuthError::Pending),
            _ => Err(AuthError::Denied {
                status,
                message: error_text(response).await,
            }),
        }
    }
}
