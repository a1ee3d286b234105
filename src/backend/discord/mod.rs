/// Minimal Discord integration: the gateway connection that delivers slash
/// command interactions, and the REST calls needed to answer them
mod commands;
mod error;
mod gateway;
mod http;
mod messages;

// Re-export public types
pub use commands::slash_commands;
pub use error::{DiscordError, Result};
pub use gateway::{run_gateway, GatewayEvent, GATEWAY_URL};
pub use http::{DiscordHttp, DISCORD_API_URL};
pub use messages::{
    ChannelRef, CommandData, CommandOption, Interaction, Ready, User, APPLICATION_COMMAND,
};
