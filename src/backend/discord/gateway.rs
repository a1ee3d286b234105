use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, Duration, Instant, Interval};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::error::{DiscordError, Result};
use super::messages::{
    GatewayPayload, Hello, Interaction, Ready, OP_DISPATCH, OP_HEARTBEAT, OP_HEARTBEAT_ACK,
    OP_HELLO, OP_INVALID_SESSION, OP_RECONNECT,
};

pub const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

const MAX_BACKOFF: Duration = Duration::from_secs(64);

/// Events forwarded from the gateway
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready(Ready),
    InteractionCreate(Box<Interaction>),
}

/// What the connection loop has to do after a payload
#[derive(Debug)]
enum Action {
    None,
    Identify { heartbeat: Duration },
    Heartbeat,
    Dispatch(GatewayEvent),
    Reconnect,
}

/// Sequence and heartbeat bookkeeping of one gateway connection
#[derive(Debug, Default)]
struct SessionState {
    sequence: Option<u64>,
    awaiting_ack: bool,
}

impl SessionState {
    fn handle_payload(&mut self, payload: GatewayPayload) -> Result<Action> {
        if let Some(sequence) = payload.s {
            self.sequence = Some(sequence);
        }

        log::trace!("Gateway op {} {:?}", payload.op, payload.t);

        match payload.op {
            OP_HELLO => {
                let hello: Hello = serde_json::from_value(payload.d)?;
                Ok(Action::Identify {
                    heartbeat: Duration::from_millis(hello.heartbeat_interval),
                })
            }
            OP_HEARTBEAT => Ok(Action::Heartbeat),
            OP_HEARTBEAT_ACK => {
                self.awaiting_ack = false;
                Ok(Action::None)
            }
            OP_RECONNECT => {
                log::info!("Gateway requested a reconnect");
                Ok(Action::Reconnect)
            }
            OP_INVALID_SESSION => {
                log::warn!("Gateway invalidated the session");
                Ok(Action::Reconnect)
            }
            OP_DISPATCH => self.handle_dispatch(payload.t.as_deref(), payload.d),
            other => {
                log::debug!("Ignoring gateway op {}", other);
                Ok(Action::None)
            }
        }
    }

    fn handle_dispatch(&self, event: Option<&str>, data: serde_json::Value) -> Result<Action> {
        match event {
            Some("READY") => {
                let ready: Ready = serde_json::from_value(data)?;
                Ok(Action::Dispatch(GatewayEvent::Ready(ready)))
            }
            Some("INTERACTION_CREATE") => {
                let interaction: Interaction = serde_json::from_value(data)?;
                Ok(Action::Dispatch(GatewayEvent::InteractionCreate(Box::new(
                    interaction,
                ))))
            }
            _ => Ok(Action::None),
        }
    }

    /// Returns false when the previous heartbeat was never acknowledged
    fn heartbeat_due(&mut self) -> bool {
        if self.awaiting_ack {
            return false;
        }
        self.awaiting_ack = true;
        true
    }
}

/// Close codes after which reconnecting cannot help
fn is_fatal_close(code: u16) -> bool {
    matches!(code, 4004 | 4010..=4014)
}

enum Step {
    Frame(Option<std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>),
    Heartbeat,
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// One gateway connection, from HELLO until the socket ends.
///
/// Returns `Ok(true)` when READY was received, so the caller can reset its
/// backoff.
async fn run_session(url: &str, token: &str, tx: &mpsc::Sender<GatewayEvent>) -> Result<bool> {
    let (ws_stream, _) = connect_async(url).await?;
    log::info!("Connected to the Discord gateway");

    let (mut write, mut read) = ws_stream.split();
    let mut state = SessionState::default();
    let mut heartbeat: Option<Interval> = None;
    let mut ready = false;

    loop {
        let step = tokio::select! {
            frame = read.next() => Step::Frame(frame),
            _ = next_heartbeat(&mut heartbeat) => Step::Heartbeat,
        };

        let text = match step {
            Step::Heartbeat => {
                if !state.heartbeat_due() {
                    log::warn!("Heartbeat was not acknowledged, reconnecting");
                    return Ok(ready);
                }
                let payload = serde_json::to_string(&GatewayPayload::heartbeat(state.sequence))?;
                write.send(Message::Text(payload.into())).await?;
                continue;
            }
            Step::Frame(None) => {
                log::warn!("Gateway stream ended");
                return Ok(ready);
            }
            Step::Frame(Some(Err(e))) => return Err(e.into()),
            Step::Frame(Some(Ok(Message::Text(text)))) => text,
            Step::Frame(Some(Ok(Message::Close(frame)))) => {
                let code: u16 = frame.as_ref().map(|f| f.code.into()).unwrap_or(1000);
                let reason = frame
                    .as_ref()
                    .map(|f| f.reason.to_string())
                    .unwrap_or_else(|| "Unknown".to_string());

                log::warn!("Gateway closed: code={}, reason={}", code, reason);
                if is_fatal_close(code) {
                    return Err(DiscordError::Fatal { code, reason });
                }
                return Ok(ready);
            }
            Step::Frame(Some(Ok(Message::Ping(payload)))) => {
                write.send(Message::Pong(payload)).await?;
                continue;
            }
            Step::Frame(Some(Ok(_))) => continue,
        };

        let payload: GatewayPayload = match serde_json::from_str(&text) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Error parsing gateway payload: {}", e);
                continue;
            }
        };

        let action = match state.handle_payload(payload) {
            Ok(action) => action,
            Err(e) => {
                log::error!("Error handling gateway payload: {}", e);
                continue;
            }
        };

        match action {
            Action::None => {}
            Action::Identify { heartbeat: period } => {
                heartbeat = Some(interval_at(Instant::now() + period, period));
                let identify = serde_json::to_string(&GatewayPayload::identify(token))?;
                write.send(Message::Text(identify.into())).await?;
            }
            Action::Heartbeat => {
                let payload = serde_json::to_string(&GatewayPayload::heartbeat(state.sequence))?;
                write.send(Message::Text(payload.into())).await?;
            }
            Action::Dispatch(event) => {
                if let GatewayEvent::Ready(info) = &event {
                    log::info!("Logged in as {}", info.user.username);
                    ready = true;
                }
                if tx.send(event).await.is_err() {
                    log::info!("Event receiver dropped, leaving the gateway");
                    return Ok(ready);
                }
            }
            Action::Reconnect => return Ok(ready),
        }
    }
}

/// Stay connected to the gateway until a fatal close code or until the
/// receiving side of `tx` is dropped
pub async fn run_gateway(url: &str, token: &str, tx: mpsc::Sender<GatewayEvent>) -> Result<()> {
    let base_delay = Duration::from_secs(1);
    let mut delay = base_delay;

    loop {
        match run_session(url, token, &tx).await {
            Ok(true) => delay = base_delay,
            Ok(false) => {}
            Err(e @ DiscordError::Fatal { .. }) => return Err(e),
            Err(e) => log::error!("Gateway connection failed: {}", e),
        }

        if tx.is_closed() {
            return Ok(());
        }

        log::info!("Reconnecting to the gateway in {}s", delay.as_secs());
        sleep(delay).await;
        delay = (delay * 2).min(MAX_BACKOFF);
    }
}
