use crate::backend::commands::CommandExecutor;
use crate::backend::config::{load_config, AppConfig, AuthMode};
use crate::backend::discord::{run_gateway, DiscordHttp, DISCORD_API_URL, GATEWAY_URL};
use crate::backend::followers::{FollowerWatcher, WebhookAnnouncer};
use crate::backend::oauth::start_callback_server;
use crate::backend::storage::{migrate::migrate_legacy_files, open_stores, Stores};
use crate::backend::twitch::{
    ClientCredentials, ManagerSettings, ReauthMode, TokenManager, TwitchApi, TwitchAuthClient,
    TwitchEndpoints, UserLookup,
};
use env_logger::Env;
use handlers::{handle_gateway_events, HandlerSettings, InteractionHandler};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod backend;
mod handlers;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const STARTUP_MAX_BACKOFF: Duration = Duration::from_secs(64);

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let config = load_config()?;
    let stores = open_stores(&config.storage)?;

    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("migrate") {
        let dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        return migrate(&config, &dir, &stores).await;
    }

    let endpoints = TwitchEndpoints::default();
    let manager = token_manager(&config, &endpoints, &stores);

    let server_manager = manager.clone();
    let host = config.server.host.clone();
    let port = config.server.port;
    tokio::spawn(async move {
        if let Err(e) = start_callback_server(&host, port, server_manager).await {
            error!("OAuth callback server stopped: {}", e);
        }
    });

    // Nothing works without a token, so wait for one before going online
    tokio::select! {
        result = manager.wait_until_valid(STARTUP_MAX_BACKOFF) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            return Ok(());
        }
    }
    info!("Twitch authorization is {}", manager.state());

    let api = Arc::new(TwitchApi::new(endpoints.helix_base.clone(), manager));
    check_token_owner(&api, &config.twitch.broadcaster_id).await;

    let http = DiscordHttp::new(config.discord.token.clone(), DISCORD_API_URL);
    spawn_follower_watcher(&config, &api, &stores, &http);

    let handler = InteractionHandler::new(
        http,
        CommandExecutor::new(api),
        HandlerSettings {
            allowed_channel_id: config.discord.allowed_channel_id.clone(),
            ephemeral: config.discord.ephemeral,
            register_commands: config.discord.register_commands,
            application_id: config.discord.application_id.clone(),
        },
    );
    if config.discord.allowed_channel_id.is_none() {
        warn!("No allowed channel configured, every command will be refused");
    }

    let (tx, rx) = tokio::sync::mpsc::channel(100);
    tokio::spawn(handle_gateway_events(handler, rx));

    info!("Starting twitchcord");
    tokio::select! {
        result = run_gateway(GATEWAY_URL, &config.discord.token, tx) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}

async fn check_token_owner(api: &TwitchApi, broadcaster_id: &str) {
    let owner = match api.get_user(UserLookup::TokenOwner).await {
        Ok(owner) => owner,
        Err(e) => {
            warn!("Could not look up the token owner: {}", e);
            return;
        }
    };
    if owner.id == broadcaster_id {
        info!("Acting for {} ({})", owner.display_name, owner.login);
        return;
    }

    let broadcaster = match api.get_user(UserLookup::Id(broadcaster_id.to_string())).await {
        Ok(user) => format!("{} ({})", user.display_name, user.id),
        Err(_) => broadcaster_id.to_string(),
    };
    warn!(
        "The token belongs to {} ({}), not to broadcaster {}",
        owner.display_name, owner.id, broadcaster
    );
}

async fn migrate(config: &AppConfig, dir: &std::path::Path, stores: &Stores) -> Result<(), BoxError> {
    let report = migrate_legacy_files(dir, &config.twitch.broadcaster_id, stores).await?;
    info!(
        "Migration finished: tokens {}, {} followers",
        if report.tokens_migrated {
            "imported"
        } else {
            "not found"
        },
        report.followers_migrated
    );
    Ok(())
}

fn token_manager(config: &AppConfig, endpoints: &TwitchEndpoints, stores: &Stores) -> TokenManager {
    let credentials = ClientCredentials {
        client_id: config.twitch.client_id.clone(),
        client_secret: config.twitch.client_secret.clone(),
    };
    let auth = Arc::new(TwitchAuthClient::new(credentials, endpoints.id_base.clone()));

    let mode = match config.twitch.auth_mode {
        AuthMode::Redirect => ReauthMode::Redirect,
        AuthMode::DeviceCode => ReauthMode::DeviceCode,
    };

    TokenManager::new(
        auth,
        stores.tokens.clone(),
        ManagerSettings {
            broadcaster_id: config.twitch.broadcaster_id.clone(),
            client_id: config.twitch.client_id.clone(),
            scopes: config.twitch.scopes.clone(),
            redirect_uri: config.redirect_uri(),
            id_base: endpoints.id_base.clone(),
            mode,
            device_code_timeout: Duration::from_secs(config.twitch.device_code_timeout_secs),
            open_browser: config.twitch.open_browser,
        },
    )
}

fn spawn_follower_watcher(config: &AppConfig, api: &Arc<TwitchApi>, stores: &Stores, http: &DiscordHttp) {
    if !config.followers.enabled {
        return;
    }
    let Some(url) = config.discord.follower_webhook_url.clone() else {
        warn!("Follower announcements are enabled but no webhook URL is configured");
        return;
    };

    let watcher = FollowerWatcher::new(
        api.clone(),
        stores.followers.clone(),
        Arc::new(WebhookAnnouncer::new(http.clone(), url)),
        config.followers.poll_interval(),
    );
    tokio::spawn(watcher.run());
}
