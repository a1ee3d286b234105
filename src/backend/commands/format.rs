use chrono::DateTime;

use crate::backend::twitch::{Poll, Prediction};

/// What happened to the poll or prediction being shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fetched,
    Started,
    Ended,
}

/// Render a Twitch RFC 3339 time as a Discord timestamp (`<t:unix>`)
pub fn to_discord_timestamp(twitch_time: &str) -> String {
    match DateTime::parse_from_rfc3339(twitch_time) {
        Ok(time) => format!("<t:{}>", time.timestamp()),
        Err(_) => twitch_time.to_string(),
    }
}

fn headline(kind: &str, title: &str, outcome: Outcome) -> String {
    match outcome {
        Outcome::Fetched => format!("Got {} ``{}`` successfully!", kind, title),
        Outcome::Started => format!("{} ``{}`` successfully started!", kind, title),
        Outcome::Ended => format!("{} ``{}`` successfully ended!", kind, title),
    }
}

pub fn poll_reply(poll: &Poll, outcome: Outcome) -> String {
    let mut lines = vec![
        headline("Poll", &poll.title, outcome),
        format!("Title: {}", poll.title),
        format!("Poll-ID: {}", poll.id),
        format!("Broadcaster: {}", poll.broadcaster_name),
        "Choices:".to_string(),
    ];

    for choice in &poll.choices {
        lines.push(format!("> {}", choice.title));
        lines.push(format!("> > Choice-ID: {}", choice.id));
        // A fresh poll has no votes yet
        if outcome != Outcome::Started {
            lines.push(format!("> > Votes: {}", choice.votes));
            lines.push(format!("> > Channel Points Votes: {}", choice.channel_points_votes));
            lines.push(format!("> > Bits Votes: {}", choice.bits_votes));
        }
    }

    let voting = if poll.channel_points_voting_enabled {
        "enabled"
    } else {
        "disabled"
    };
    lines.push(format!("Channel Points Voting {}", voting));
    lines.push(format!("Poll Status: {}", poll.status));
    lines.push(format!("Poll Duration: {} seconds", poll.duration));
    lines.push(format!("Started at {}", to_discord_timestamp(&poll.started_at)));
    if let Some(ended_at) = &poll.ended_at {
        lines.push(format!("Ended at {}", to_discord_timestamp(ended_at)));
    }

    lines.join("\n")
}

pub fn prediction_reply(prediction: &Prediction, outcome: Outcome) -> String {
    let mut lines = vec![
        headline("Prediction", &prediction.title, outcome),
        format!("Title: {}", prediction.title),
        format!("Prediction-ID: {}", prediction.id),
        format!("Broadcaster: {}", prediction.broadcaster_name),
        "Outcomes:".to_string(),
    ];

    for item in &prediction.outcomes {
        let winner = prediction.winning_outcome_id.as_deref() == Some(item.id.as_str());
        lines.push(if winner {
            format!("> {} (winner)", item.title)
        } else {
            format!("> {}", item.title)
        });
        lines.push(format!("> > Outcome-ID: {}", item.id));
        lines.push(format!("> > Color: {}", item.color));
        if outcome == Outcome::Started {
            continue;
        }

        lines.push(format!("> > Users: {}", item.users));
        lines.push(format!("> > Channel Points: {}", item.channel_points));
        let predictors = item.top_predictors.as_deref().unwrap_or_default();
        if !predictors.is_empty() {
            lines.push("> > Top Predictors:".to_string());
        }
        for predictor in predictors {
            lines.push(format!(
                "> > > User: {} ({})",
                predictor.user_name, predictor.user_id
            ));
            lines.push(format!(
                "> > > > Channel Points used: {}",
                predictor.channel_points_used
            ));
            lines.push(format!(
                "> > > > Channel Points won: {}",
                predictor.channel_points_won
            ));
        }
    }

    lines.push(format!(
        "Prediction Window: {} seconds",
        prediction.prediction_window
    ));
    lines.push(format!("Prediction-Status: {}", prediction.status));
    lines.push(format!(
        "Created at {}",
        to_discord_timestamp(&prediction.created_at)
    ));
    if let Some(locked_at) = &prediction.locked_at {
        lines.push(format!("Locked at {}", to_discord_timestamp(locked_at)));
    }
    if let Some(ended_at) = &prediction.ended_at {
        lines.push(format!("Ended at {}", to_discord_timestamp(ended_at)));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::twitch::{PollChoice, PredictionOutcome, TopPredictor};

    fn poll(ended_at: Option<&str>) -> Poll {
        Poll {
            id: "p1".to_string(),
            broadcaster_id: "1001".to_string(),
            broadcaster_name: "Streamer".to_string(),
            broadcaster_login: "streamer".to_string(),
            title: "Heads or Tails?".to_string(),
            choices: vec![PollChoice {
                id: "c1".to_string(),
                title: "Heads".to_string(),
                votes: 3,
                channel_points_votes: 1,
                bits_votes: 0,
            }],
            bits_voting_enabled: false,
            bits_per_vote: 0,
            channel_points_voting_enabled: true,
            channel_points_per_vote: 100,
            status: "ACTIVE".to_string(),
            duration: 300,
            started_at: "2024-01-01T00:00:00Z".to_string(),
            ended_at: ended_at.map(str::to_string),
        }
    }

    #[test]
    fn test_discord_timestamp() {
        assert_eq!(to_discord_timestamp("2024-01-01T00:00:00Z"), "<t:1704067200>");
        assert_eq!(
            to_discord_timestamp("2024-01-01T00:00:00.123456789Z"),
            "<t:1704067200>"
        );
        assert_eq!(to_discord_timestamp("not a time"), "not a time");
    }

    #[test]
    fn test_started_poll_hides_votes() {
        let reply = poll_reply(&poll(None), Outcome::Started);
        assert!(reply.starts_with("Poll ``Heads or Tails?`` successfully started!"));
        assert!(reply.contains("> > Choice-ID: c1"));
        assert!(!reply.contains("Votes:"));
        assert!(reply.contains("Channel Points Voting enabled"));
        assert!(reply.contains("Started at <t:1704067200>"));
        assert!(!reply.contains("Ended at"));
    }

    #[test]
    fn test_ended_poll_lists_votes() {
        let reply = poll_reply(&poll(Some("2024-01-01T00:05:00Z")), Outcome::Ended);
        assert!(reply.contains("> > Votes: 3"));
        assert!(reply.contains("> > Channel Points Votes: 1"));
        assert!(reply.contains("Ended at <t:1704067500>"));
    }

    #[test]
    fn test_prediction_lists_top_predictors() {
        let prediction = Prediction {
            id: "pr1".to_string(),
            broadcaster_id: "1001".to_string(),
            broadcaster_name: "Streamer".to_string(),
            broadcaster_login: "streamer".to_string(),
            title: "Win?".to_string(),
            winning_outcome_id: Some("o1".to_string()),
            outcomes: vec![PredictionOutcome {
                id: "o1".to_string(),
                title: "Yes".to_string(),
                users: 2,
                channel_points: 500,
                top_predictors: Some(vec![TopPredictor {
                    user_id: "7".to_string(),
                    user_name: "Viewer".to_string(),
                    user_login: "viewer".to_string(),
                    channel_points_used: 400,
                    channel_points_won: 800,
                }]),
                color: "BLUE".to_string(),
            }],
            prediction_window: 120,
            status: "RESOLVED".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            ended_at: Some("2024-01-01T00:10:00Z".to_string()),
            locked_at: None,
        };

        let reply = prediction_reply(&prediction, Outcome::Ended);
        assert!(reply.starts_with("Prediction ``Win?`` successfully ended!"));
        assert!(reply.contains("> Yes (winner)"));
        assert!(reply.contains("> > > User: Viewer (7)"));
        assert!(reply.contains("> > > > Channel Points won: 800"));
        assert!(reply.contains("Prediction Window: 120 seconds"));
        assert!(!reply.contains("Locked at"));
    }
}
