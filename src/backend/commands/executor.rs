use std::sync::Arc;

use super::format::{poll_reply, prediction_reply, Outcome};
use super::parser::BotCommand;
use crate::backend::twitch::{Poll, Prediction, Result, TwitchApi};

/// Result of a command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Reply text for a command Twitch accepted
    Success(String),
    /// Reply text explaining what went wrong
    Error(String),
}

impl CommandResult {
    pub fn text(&self) -> &str {
        match self {
            CommandResult::Success(text) | CommandResult::Error(text) => text,
        }
    }
}

/// Runs parsed commands against the Helix API
#[derive(Clone)]
pub struct CommandExecutor {
    api: Arc<TwitchApi>,
}

impl CommandExecutor {
    pub fn new(api: Arc<TwitchApi>) -> Self {
        Self { api }
    }

    pub async fn execute(&self, command: BotCommand) -> CommandResult {
        match command {
            BotCommand::GetPoll { id } => reply(
                self.api.get_poll(id.as_deref()).await,
                "Error getting Poll from Twitch",
                |poll| poll_reply(poll, Outcome::Fetched),
            ),
            BotCommand::CreatePoll(poll) => reply(
                self.api.create_poll(poll).await,
                "Error creating Poll on Twitch",
                |poll| poll_reply(poll, Outcome::Started),
            ),
            BotCommand::EndPoll { id, status } => reply(
                self.end_poll(id, &status).await,
                "Error ending Poll on Twitch",
                |poll| poll_reply(poll, Outcome::Ended),
            ),
            BotCommand::GetPrediction { id } => reply(
                self.api.get_prediction(id.as_deref()).await,
                "Error getting Prediction from Twitch",
                |prediction| prediction_reply(prediction, Outcome::Fetched),
            ),
            BotCommand::CreatePrediction(prediction) => reply(
                self.api.create_prediction(prediction).await,
                "Error creating Prediction on Twitch",
                |prediction| prediction_reply(prediction, Outcome::Started),
            ),
            BotCommand::EndPrediction {
                id,
                status,
                winning_outcome_id,
            } => reply(
                self.end_prediction(id, &status, winning_outcome_id.as_deref())
                    .await,
                "Error ending Prediction on Twitch",
                |prediction| prediction_reply(prediction, Outcome::Ended),
            ),
        }
    }

    async fn end_poll(&self, id: Option<String>, status: &str) -> Result<Poll> {
        let id = match id {
            Some(id) => id,
            None => self.api.get_poll(None).await?.id,
        };
        self.api.end_poll(&id, status).await
    }

    async fn end_prediction(
        &self,
        id: Option<String>,
        status: &str,
        winning_outcome_id: Option<&str>,
    ) -> Result<Prediction> {
        let id = match id {
            Some(id) => id,
            None => self.api.get_prediction(None).await?.id,
        };
        self.api.end_prediction(&id, status, winning_outcome_id).await
    }
}

fn reply<T>(result: Result<T>, context: &str, render: impl FnOnce(&T) -> String) -> CommandResult {
    match result {
        Ok(value) => CommandResult::Success(render(&value)),
        Err(e) => {
            log::error!("{}: {}", context, e);
            CommandResult::Error(format!("{}: {}", context, e))
        }
    }
}
