use reqwest::Method;
use std::collections::HashSet;

use super::error::{Result, TwitchError};
use super::manager::TokenManager;
use super::models::{
    ChannelFollowers, ChoiceTitle, CreatePoll, CreatePrediction, DataResponse, EndPoll,
    EndPrediction, FollowersPage, Poll, Prediction, UserData,
};

const FOLLOWERS_PAGE_SIZE: &str = "100";

/// How to look up a Twitch user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Login(String),
    Id(String),
    /// The user the access token belongs to
    TokenOwner,
}

/// Options for a new poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub title: String,
    pub choices: Vec<String>,
    pub duration_secs: u64,
    pub channel_points_voting_enabled: Option<bool>,
    pub channel_points_per_vote: Option<u64>,
}

/// Options for a new prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrediction {
    pub title: String,
    pub outcomes: Vec<String>,
    pub window_secs: u64,
}

/// Helix client for the broadcaster's polls, predictions and followers.
///
/// Every request gets its token from the [`TokenManager`]. A 401 from
/// Helix is retried exactly once with whatever token the manager recovers.
pub struct TwitchApi {
    client: reqwest::Client,
    helix_base: String,
    tokens: TokenManager,
}

impl TwitchApi {
    pub fn new(helix_base: impl Into<String>, tokens: TokenManager) -> Self {
        Self {
            client: reqwest::Client::new(),
            helix_base: helix_base.into(),
            tokens,
        }
    }

    pub fn broadcaster_id(&self) -> &str {
        self.tokens.broadcaster_id()
    }

    async fn send(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        access_token: &str,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .request(method.clone(), format!("{}{}", self.helix_base, path))
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Client-Id", self.tokens.client_id())
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let pair = self.tokens.ensure_valid().await?;
        let response = self
            .send(&method, path, query, body.as_ref(), &pair.access_token)
            .await?;
        if response.status().as_u16() != 401 {
            return check_status(response).await;
        }

        log::warn!("Twitch rejected the access token for {}, retrying once", path);
        let pair = self.tokens.recover_rejected(&pair.access_token).await?;
        let response = self
            .send(&method, path, query, body.as_ref(), &pair.access_token)
            .await?;
        check_status(response).await
    }

    async fn first<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let response = self.execute(method, path, query, body).await?;
        let parsed = response.json::<DataResponse<T>>().await?;
        parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| TwitchError::NotFound(format!("{} returned no data", path)))
    }

    fn lookup_query(&self, id: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![("broadcaster_id", self.broadcaster_id().to_string())];
        match id {
            Some(id) => query.push(("id", id.to_string())),
            None => query.push(("first", "1".to_string())),
        }
        query
    }

    /// The poll with `id`, or the most recent one
    pub async fn get_poll(&self, id: Option<&str>) -> Result<Poll> {
        let query = self.lookup_query(id);
        self.first(Method::GET, "/polls", &query, None).await
    }

    pub async fn create_poll(&self, poll: NewPoll) -> Result<Poll> {
        let body = CreatePoll {
            broadcaster_id: self.broadcaster_id().to_string(),
            title: poll.title,
            choices: titles(poll.choices),
            duration: poll.duration_secs,
            channel_points_voting_enabled: poll.channel_points_voting_enabled,
            channel_points_per_vote: poll.channel_points_per_vote,
        };
        let body = serde_json::to_value(body)?;
        self.first(Method::POST, "/polls", &[], Some(body)).await
    }

    pub async fn end_poll(&self, id: &str, status: &str) -> Result<Poll> {
        let body = EndPoll {
            broadcaster_id: self.broadcaster_id().to_string(),
            id: id.to_string(),
            status: status.to_string(),
        };
        let body = serde_json::to_value(body)?;
        self.first(Method::PATCH, "/polls", &[], Some(body)).await
    }

    /// The prediction with `id`, or the most recent one
    pub async fn get_prediction(&self, id: Option<&str>) -> Result<Prediction> {
        let query = self.lookup_query(id);
        self.first(Method::GET, "/predictions", &query, None).await
    }

    pub async fn create_prediction(&self, prediction: NewPrediction) -> Result<Prediction> {
        let body = CreatePrediction {
            broadcaster_id: self.broadcaster_id().to_string(),
            title: prediction.title,
            outcomes: titles(prediction.outcomes),
            prediction_window: prediction.window_secs,
        };
        let body = serde_json::to_value(body)?;
        self.first(Method::POST, "/predictions", &[], Some(body))
            .await
    }

    pub async fn end_prediction(
        &self,
        id: &str,
        status: &str,
        winning_outcome_id: Option<&str>,
    ) -> Result<Prediction> {
        let body = EndPrediction {
            broadcaster_id: self.broadcaster_id().to_string(),
            id: id.to_string(),
            status: status.to_string(),
            winning_outcome_id: winning_outcome_id.map(str::to_string),
        };
        let body = serde_json::to_value(body)?;
        self.first(Method::PATCH, "/predictions", &[], Some(body))
            .await
    }

    pub async fn get_user(&self, lookup: UserLookup) -> Result<UserData> {
        let query = match lookup {
            UserLookup::Login(login) => vec![("login", login)],
            UserLookup::Id(id) => vec![("id", id)],
            UserLookup::TokenOwner => Vec::new(),
        };
        self.first(Method::GET, "/users", &query, None).await
    }

    /// Walk every page of the follower listing.
    ///
    /// A 401 on any page restarts the listing from the first page once, with
    /// the token the manager recovers.
    pub async fn get_channel_followers(&self) -> Result<ChannelFollowers> {
        let mut access_token = self.tokens.ensure_valid().await?.access_token;
        let mut retried = false;

        'listing: loop {
            let mut cursor: Option<String> = None;
            let mut total = None;
            let mut seen = HashSet::new();
            let mut followers = Vec::new();

            loop {
                let mut query = vec![
                    ("broadcaster_id", self.broadcaster_id().to_string()),
                    ("first", FOLLOWERS_PAGE_SIZE.to_string()),
                ];
                if let Some(after) = &cursor {
                    query.push(("after", after.clone()));
                }

                let response = self
                    .send(&Method::GET, "/channels/followers", &query, None, &access_token)
                    .await?;
                if response.status().as_u16() == 401 && !retried {
                    log::warn!("Twitch rejected the access token while listing followers");
                    retried = true;
                    access_token = self.tokens.recover_rejected(&access_token).await?.access_token;
                    continue 'listing;
                }

                let page = check_status(response).await?.json::<FollowersPage>().await?;
                total.get_or_insert(page.total);
                for follower in page.data {
                    if seen.insert(follower.user_id.clone()) {
                        followers.push(follower);
                    }
                }

                match page.pagination.cursor.filter(|c| !c.is_empty()) {
                    Some(next) => {
                        log::trace!("Following follower cursor {}", next);
                        cursor = Some(next);
                    }
                    None => break,
                }
            }

            return Ok(ChannelFollowers {
                total: total.unwrap_or_default(),
                followers,
            });
        }
    }
}

fn titles(values: Vec<String>) -> Vec<ChoiceTitle> {
    values
        .into_iter()
        .map(|title| ChoiceTitle { title })
        .collect()
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| body.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(text);

    Err(TwitchError::Upstream {
        status: status.as_u16(),
        message,
    })
}
