mod context;
mod executor;
mod format;
mod parser;

pub use context::CommandContext;
pub use executor::{CommandExecutor, CommandResult};
pub use format::{poll_reply, prediction_reply, to_discord_timestamp, Outcome};
pub use parser::{duration_seconds, split_list, status_keyword, BotCommand};
