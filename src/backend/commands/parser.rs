use super::context::CommandContext;
use crate::backend::twitch::{NewPoll, NewPrediction};

const POLL_CHOICES: (usize, usize) = (2, 5);
const POLL_DURATION: (u64, u64) = (15, 1800);
const PREDICTION_OUTCOMES: (usize, usize) = (2, 10);
const PREDICTION_WINDOW: (u64, u64) = (30, 1800);

/// The six commands the bot understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    GetPoll {
        id: Option<String>,
    },
    CreatePoll(NewPoll),
    EndPoll {
        id: Option<String>,
        status: String,
    },
    GetPrediction {
        id: Option<String>,
    },
    CreatePrediction(NewPrediction),
    EndPrediction {
        id: Option<String>,
        status: String,
        winning_outcome_id: Option<String>,
    },
}

/// Split a `;`-separated list, dropping empty entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Convert a duration to seconds; only `minutes` changes the value
pub fn duration_seconds(value: i64, unit: Option<&str>) -> Result<u64, String> {
    if value <= 0 {
        return Err("The duration has to be a positive number".to_string());
    }
    let multiplier = match unit {
        Some(unit) if unit.eq_ignore_ascii_case("minutes") => 60,
        _ => 1,
    };
    Ok(value as u64 * multiplier)
}

/// `"TERMINATED (End the poll ...)"` becomes `"TERMINATED"`
pub fn status_keyword(value: &str) -> String {
    let value = value.trim();
    match value.find(' ') {
        Some(index) => value[..index].to_string(),
        None => value.to_string(),
    }
}

fn required<'a>(context: &'a CommandContext, name: &str) -> Result<&'a str, String> {
    context
        .string(name)
        .ok_or_else(|| format!("Missing option `{}`", name))
}

fn check_count(what: &str, count: usize, (min, max): (usize, usize)) -> Result<(), String> {
    if count < min || count > max {
        return Err(format!(
            "A {} needs between {} and {} entries (separated by `;`), got {}",
            what, min, max, count
        ));
    }
    Ok(())
}

fn check_seconds(what: &str, seconds: u64, (min, max): (u64, u64)) -> Result<(), String> {
    if seconds < min || seconds > max {
        return Err(format!(
            "The {} has to be between {} and {} seconds, got {}",
            what, min, max, seconds
        ));
    }
    Ok(())
}

impl BotCommand {
    /// Turn the options of an invocation into a command, or a message
    /// explaining what is wrong with them
    pub fn parse(context: &CommandContext) -> Result<Self, String> {
        let id = context.string("id").map(str::to_string);

        match context.command_name.as_str() {
            "getpoll" => Ok(BotCommand::GetPoll { id }),
            "getprediction" => Ok(BotCommand::GetPrediction { id }),
            "poll" => {
                let title = required(context, "title")?.to_string();
                let choices = split_list(required(context, "choices")?);
                check_count("poll", choices.len(), POLL_CHOICES)?;

                let duration = context
                    .integer("duration")
                    .ok_or_else(|| "Missing option `duration`".to_string())?;
                let duration_secs = duration_seconds(duration, context.string("unit"))?;
                check_seconds("poll duration", duration_secs, POLL_DURATION)?;

                let channel_points_per_vote = match context.integer("cpnumber") {
                    Some(points) if points <= 0 => {
                        return Err("The number of Channel Points has to be positive".to_string())
                    }
                    Some(points) => Some(points as u64),
                    None => None,
                };

                Ok(BotCommand::CreatePoll(NewPoll {
                    title,
                    choices,
                    duration_secs,
                    channel_points_voting_enabled: context.boolean("channelpoints"),
                    channel_points_per_vote,
                }))
            }
            "endpoll" => Ok(BotCommand::EndPoll {
                id,
                status: status_keyword(required(context, "status")?),
            }),
            "prediction" => {
                let title = required(context, "title")?.to_string();
                let outcomes = split_list(required(context, "outcomes")?);
                check_count("prediction", outcomes.len(), PREDICTION_OUTCOMES)?;

                let duration = context
                    .integer("duration")
                    .ok_or_else(|| "Missing option `duration`".to_string())?;
                let window_secs = duration_seconds(duration, context.string("unit"))?;
                check_seconds("prediction window", window_secs, PREDICTION_WINDOW)?;

                Ok(BotCommand::CreatePrediction(NewPrediction {
                    title,
                    outcomes,
                    window_secs,
                }))
            }
            "endprediction" => {
                let status = status_keyword(required(context, "status")?);
                let winning_outcome_id = context.string("winning_outcome_id").map(str::to_string);
                if status == "RESOLVED" && winning_outcome_id.is_none() {
                    return Err(
                        "`winning_outcome_id` is required to resolve a prediction".to_string()
                    );
                }
                Ok(BotCommand::EndPrediction {
                    id,
                    status,
                    winning_outcome_id,
                })
            }
            other => Err(format!("Unknown command `{}`", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn context(name: &str, options: serde_json::Value) -> CommandContext {
        let options: HashMap<String, serde_json::Value> =
            serde_json::from_value(options).unwrap();
        CommandContext {
            command_name: name.to_string(),
            options,
            channel_id: Some("42".to_string()),
            channel_name: None,
            invoker: None,
        }
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" Heads ; Tails;;  "), vec!["Heads", "Tails"]);
        assert!(split_list(" ; ").is_empty());
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(duration_seconds(5, Some("minutes")), Ok(300));
        assert_eq!(duration_seconds(5, Some("Minutes")), Ok(300));
        assert_eq!(duration_seconds(45, Some("seconds")), Ok(45));
        assert_eq!(duration_seconds(45, None), Ok(45));
        assert!(duration_seconds(0, None).is_err());
    }

    #[test]
    fn test_status_keyword() {
        assert_eq!(status_keyword("TERMINATED (End the poll manually)"), "TERMINATED");
        assert_eq!(status_keyword("ARCHIVED"), "ARCHIVED");
        assert_eq!(status_keyword("  LOCKED "), "LOCKED");
    }

    #[test]
    fn test_parse_poll() {
        let command = BotCommand::parse(&context(
            "poll",
            serde_json::json!({
                "title": "Heads or Tails?",
                "choices": "Heads;Tails",
                "duration": 5,
                "unit": "minutes",
                "channelpoints": true,
                "cpnumber": 100
            }),
        ))
        .unwrap();

        assert_eq!(
            command,
            BotCommand::CreatePoll(NewPoll {
                title: "Heads or Tails?".to_string(),
                choices: vec!["Heads".to_string(), "Tails".to_string()],
                duration_secs: 300,
                channel_points_voting_enabled: Some(true),
                channel_points_per_vote: Some(100),
            })
        );
    }

    #[test]
    fn test_poll_limits() {
        let one_choice = context(
            "poll",
            serde_json::json!({"title": "t", "choices": "only", "duration": 60}),
        );
        assert!(BotCommand::parse(&one_choice).unwrap_err().contains("between 2 and 5"));

        let too_long = context(
            "poll",
            serde_json::json!({"title": "t", "choices": "a;b", "duration": 31, "unit": "minutes"}),
        );
        assert!(BotCommand::parse(&too_long).unwrap_err().contains("1800"));
    }

    #[test]
    fn test_parse_prediction_and_end() {
        let command = BotCommand::parse(&context(
            "prediction",
            serde_json::json!({"title": "Win?", "outcomes": "Yes; No", "duration": 2, "unit": "minutes"}),
        ))
        .unwrap();
        assert_eq!(
            command,
            BotCommand::CreatePrediction(NewPrediction {
                title: "Win?".to_string(),
                outcomes: vec!["Yes".to_string(), "No".to_string()],
                window_secs: 120,
            })
        );

        let missing_winner = context("endprediction", serde_json::json!({"status": "RESOLVED"}));
        assert!(BotCommand::parse(&missing_winner).is_err());

        let end = BotCommand::parse(&context(
            "endprediction",
            serde_json::json!({"status": "CANCELED", "id": "pr1"}),
        ))
        .unwrap();
        assert_eq!(
            end,
            BotCommand::EndPrediction {
                id: Some("pr1".to_string()),
                status: "CANCELED".to_string(),
                winning_outcome_id: None,
            }
        );
    }

    #[test]
    fn test_get_commands_default_to_most_recent() {
        assert_eq!(
            BotCommand::parse(&context("getpoll", serde_json::json!({}))),
            Ok(BotCommand::GetPoll { id: None })
        );
        assert!(BotCommand::parse(&context("dance", serde_json::json!({}))).is_err());
    }
}
