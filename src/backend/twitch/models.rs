use serde::{Deserialize, Serialize};

use crate::backend::storage::FollowerRecord;

/// Envelope used by every Helix endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PollChoice {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub votes: u64,
    #[serde(default)]
    pub channel_points_votes: u64,
    #[serde(default)]
    pub bits_votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Poll {
    pub id: String,
    pub broadcaster_id: String,
    pub broadcaster_name: String,
    #[allow(dead_code)] // Part of Twitch API response
    pub broadcaster_login: String,
    pub title: String,
    pub choices: Vec<PollChoice>,
    #[serde(default)]
    pub bits_voting_enabled: bool,
    #[serde(default)]
    pub bits_per_vote: u64,
    #[serde(default)]
    pub channel_points_voting_enabled: bool,
    #[serde(default)]
    pub channel_points_per_vote: u64,
    pub status: String,
    pub duration: u64,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopPredictor {
    pub user_id: String,
    pub user_name: String,
    #[allow(dead_code)] // Part of Twitch API response
    pub user_login: String,
    #[serde(default)]
    pub channel_points_used: u64,
    #[serde(default)]
    pub channel_points_won: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PredictionOutcome {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub users: u64,
    #[serde(default)]
    pub channel_points: u64,
    #[serde(default)]
    pub top_predictors: Option<Vec<TopPredictor>>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub broadcaster_id: String,
    pub broadcaster_name: String,
    #[allow(dead_code)] // Part of Twitch API response
    pub broadcaster_login: String,
    pub title: String,
    #[serde(default)]
    pub winning_outcome_id: Option<String>,
    pub outcomes: Vec<PredictionOutcome>,
    pub prediction_window: u64,
    pub status: String,
    pub created_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub locked_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserData {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    #[allow(dead_code)] // Part of Twitch API response
    pub broadcaster_type: String,
    #[serde(default)]
    #[allow(dead_code)] // Part of Twitch API response
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub cursor: Option<String>,
}

/// One page of `GET /channels/followers`
#[derive(Debug, Clone, Deserialize)]
pub struct FollowersPage {
    #[serde(default)]
    pub data: Vec<FollowerRecord>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub total: u64,
}

/// Every follower of the channel, in the order Twitch listed them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFollowers {
    pub total: u64,
    pub followers: Vec<FollowerRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceTitle {
    pub title: String,
}

/// Body of `POST /polls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatePoll {
    pub broadcaster_id: String,
    pub title: String,
    pub choices: Vec<ChoiceTitle>,
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_points_voting_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_points_per_vote: Option<u64>,
}

/// Body of `PATCH /polls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndPoll {
    pub broadcaster_id: String,
    pub id: String,
    pub status: String,
}

/// Body of `POST /predictions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatePrediction {
    pub broadcaster_id: String,
    pub title: String,
    pub outcomes: Vec<ChoiceTitle>,
    pub prediction_window: u64,
}

/// Body of `PATCH /predictions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndPrediction {
    pub broadcaster_id: String,
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_outcome_id: Option<String>,
}
