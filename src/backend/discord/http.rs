use reqwest::Method;
use serde_json::json;

use super::error::{DiscordError, Result};

pub const DISCORD_API_URL: &str = "https://discord.com/api/v10";

/// Message flag that hides a reply from everyone but the invoker
const EPHEMERAL_FLAG: u64 = 64;
const MAX_CONTENT_LEN: usize = 2000;

const DEFERRED_CHANNEL_MESSAGE: u8 = 5;
const CHANNEL_MESSAGE: u8 = 4;

/// REST calls the bot makes against Discord
#[derive(Clone)]
pub struct DiscordHttp {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

impl DiscordHttp {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            api_base: api_base.into(),
        }
    }

    async fn send(&self, method: Method, path: &str, body: &serde_json::Value) -> Result<()> {
        let response = self
            .client
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.token))
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    /// Replace the global slash commands of the application
    pub async fn register_commands(
        &self,
        application_id: &str,
        commands: &serde_json::Value,
    ) -> Result<()> {
        self.send(
            Method::PUT,
            &format!("/applications/{}/commands", application_id),
            commands,
        )
        .await
    }

    /// Acknowledge an interaction; the answer follows via [`Self::edit_reply`]
    pub async fn defer_reply(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        ephemeral: bool,
    ) -> Result<()> {
        let body = json!({
            "type": DEFERRED_CHANNEL_MESSAGE,
            "data": { "flags": flags(ephemeral) }
        });
        self.send(
            Method::POST,
            &format!("/interactions/{}/{}/callback", interaction_id, interaction_token),
            &body,
        )
        .await
    }

    /// Answer an interaction right away
    pub async fn reply(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<()> {
        let body = json!({
            "type": CHANNEL_MESSAGE,
            "data": { "content": truncate(content), "flags": flags(ephemeral) }
        });
        self.send(
            Method::POST,
            &format!("/interactions/{}/{}/callback", interaction_id, interaction_token),
            &body,
        )
        .await
    }

    pub async fn edit_reply(
        &self,
        application_id: &str,
        interaction_token: &str,
        content: &str,
    ) -> Result<()> {
        self.send(
            Method::PATCH,
            &format!(
                "/webhooks/{}/{}/messages/@original",
                application_id, interaction_token
            ),
            &json!({ "content": truncate(content) }),
        )
        .await
    }

    /// Post to a channel webhook. The URL carries its own credentials.
    pub async fn execute_webhook(&self, url: &str, content: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(&json!({ "content": truncate(content) }))
            .send()
            .await?;
        check_status(response).await
    }
}

fn flags(ephemeral: bool) -> u64 {
    if ephemeral {
        EPHEMERAL_FLAG
    } else {
        0
    }
}

/// Discord rejects messages over 2000 characters
fn truncate(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_LEN {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(MAX_CONTENT_LEN - 1).collect();
    cut.push('…');
    cut
}

async fn check_status(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(DiscordError::Upstream {
        status: status.as_u16(),
        message,
    })
}
