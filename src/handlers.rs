use crate::backend::commands::{BotCommand, CommandContext, CommandExecutor, CommandResult};
use crate::backend::discord::{slash_commands, DiscordHttp, GatewayEvent, Interaction, Ready, APPLICATION_COMMAND};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

/// How the bot answers slash commands
#[derive(Debug, Clone, Default)]
pub struct HandlerSettings {
    pub allowed_channel_id: Option<String>,
    pub ephemeral: bool,
    pub register_commands: bool,
    /// Used for command registration instead of the id from READY
    pub application_id: Option<String>,
}

/// The reply for an invocation outside the allowed channel, `None` when the
/// command may run
pub fn channel_gate(
    allowed: Option<&str>,
    channel_id: Option<&str>,
    channel_name: Option<&str>,
) -> Option<String> {
    let channel_id = channel_id.unwrap_or("unknown");
    let channel_name = channel_name.unwrap_or(channel_id);

    match allowed {
        None => Some(format!(
            "Please first set a channel where you want me to accept the commands! \
             For <#{id}> ({name}) just set `allowed_channel_id = \"{id}\"` in the \
             [discord] section of config.toml or `ALLOWED_CHANNEL_ID={id}` in the environment!",
            id = channel_id,
            name = channel_name
        )),
        Some(allowed) if allowed == channel_id => None,
        Some(_) => Some(format!(
            "<#{}> ({}) is not allowed to accept commands!",
            channel_id, channel_name
        )),
    }
}

/// Answers interactions forwarded by the gateway
#[derive(Clone)]
pub struct InteractionHandler {
    http: DiscordHttp,
    executor: CommandExecutor,
    settings: Arc<HandlerSettings>,
}

impl InteractionHandler {
    pub fn new(http: DiscordHttp, executor: CommandExecutor, settings: HandlerSettings) -> Self {
        Self {
            http,
            executor,
            settings: Arc::new(settings),
        }
    }

    async fn on_ready(&self, ready: &Ready) {
        info!("Discord session {} ready", ready.session_id);
        if !self.settings.register_commands {
            return;
        }

        let application_id = self
            .settings
            .application_id
            .as_deref()
            .unwrap_or(&ready.application.id);
        match self
            .http
            .register_commands(application_id, &slash_commands())
            .await
        {
            Ok(_) => info!("Registered slash commands"),
            Err(e) => error!("Failed to register slash commands: {}", e),
        }
    }

    /// Answer one interaction. Failures are logged and never propagate.
    pub async fn handle_interaction(&self, interaction: Interaction) {
        if interaction.kind != APPLICATION_COMMAND {
            return;
        }
        let Some(context) = CommandContext::from_interaction(&interaction) else {
            return;
        };

        info!(
            "/{} from {} in {}",
            context.command_name,
            context.invoker.as_deref().unwrap_or("unknown"),
            context.channel_id.as_deref().unwrap_or("unknown")
        );

        if let Some(refusal) = channel_gate(
            self.settings.allowed_channel_id.as_deref(),
            context.channel_id.as_deref(),
            context.channel_name.as_deref(),
        ) {
            warn!("Refused /{} outside the allowed channel", context.command_name);
            if let Err(e) = self
                .http
                .reply(&interaction.id, &interaction.token, &refusal, true)
                .await
            {
                error!("Failed to answer interaction: {}", e);
            }
            return;
        }

        if let Err(e) = self
            .http
            .defer_reply(&interaction.id, &interaction.token, self.settings.ephemeral)
            .await
        {
            error!("Failed to defer interaction: {}", e);
            return;
        }

        let result = match BotCommand::parse(&context) {
            Ok(command) => self.executor.execute(command).await,
            Err(message) => CommandResult::Error(message),
        };

        if let Err(e) = self
            .http
            .edit_reply(&interaction.application_id, &interaction.token, result.text())
            .await
        {
            error!("Failed to send the command reply: {}", e);
        }
    }
}

/// Consume gateway events until the gateway side of the channel closes
pub async fn handle_gateway_events(handler: InteractionHandler, mut rx: mpsc::Receiver<GatewayEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            GatewayEvent::Ready(ready) => handler.on_ready(&ready).await,
            GatewayEvent::InteractionCreate(interaction) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler.handle_interaction(*interaction).await;
                });
            }
        }
    }
}
