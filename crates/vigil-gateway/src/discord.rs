//! Discord-backed gateway sessions.
//!
//! A session validates its token against the Discord REST API and then
//! keeps polling on an interval as a liveness check. Failures are reported
//! once and the session stops; reconnection policy belongs to the operator,
//! not this layer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use vigil_core::gateway::{
    Gateway, GatewayError, GatewayErrorCode, GatewayEvent, GatewayFactory,
};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const EVENT_BUFFER: usize = 16;

#[derive(Clone, Debug)]
pub struct DiscordGatewayConfig {
    pub api_base: String,
    pub poll_interval: Duration,
}

impl Default for DiscordGatewayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct DiscordGatewayFactory {
    client: reqwest::Client,
    config: DiscordGatewayConfig,
}

impl DiscordGatewayFactory {
    pub fn new(config: DiscordGatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

impl Default for DiscordGatewayFactory {
    fn default() -> Self {
        Self::new(DiscordGatewayConfig::default())
    }
}

impl GatewayFactory for DiscordGatewayFactory {
    fn create(
        &self,
        token: &str,
    ) -> Result<(Arc<dyn Gateway>, mpsc::Receiver<GatewayEvent>), GatewayError> {
        if token.trim().is_empty() {
            return Err(GatewayError::new("401: Unauthorized"));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let gateway = Arc::new(DiscordGateway {
            client: self.client.clone(),
            config: self.config.clone(),
            token: token.to_string(),
            tx,
            cancel: CancellationToken::new(),
        });
        Ok((gateway, rx))
    }
}

struct DiscordGateway {
    client: reqwest::Client,
    config: DiscordGatewayConfig,
    token: String,
    tx: mpsc::Sender<GatewayEvent>,
    cancel: CancellationToken,
}

impl Gateway for DiscordGateway {
    fn connect(&self) {
        let client = self.client.clone();
        let url = format!("{}/gateway/bot", self.config.api_base);
        let token = self.token.clone();
        let interval = self.config.poll_interval;
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            run_session(client, url, token, interval, tx, cancel).await;
        });
    }

    fn disconnect(&self) {
        self.cancel.cancel();
    }
}

async fn run_session(
    client: reqwest::Client,
    url: String,
    token: String,
    interval: Duration,
    tx: mpsc::Sender<GatewayEvent>,
    cancel: CancellationToken,
) {
    match check_token(&client, &url, &token).await {
        Ok(()) => {
            debug!("gateway session established");
            if tx.send(GatewayEvent::Connected).await.is_err() {
                return;
            }
        }
        Err(err) => {
            warn!(error = %err, "gateway session failed");
            let _ = tx.send(GatewayEvent::Error(err)).await;
            return;
        }
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = tx.send(GatewayEvent::Disconnected(None)).await;
                return;
            }
            _ = tokio::time::sleep(interval) => {
                if let Err(err) = check_token(&client, &url, &token).await {
                    warn!(error = %err, "gateway liveness check failed");
                    let _ = tx.send(GatewayEvent::Error(err)).await;
                    return;
                }
            }
        }
    }
}

/// One authenticated round-trip against the REST API. A 2xx response means
/// the token is valid and Discord is reachable.
async fn check_token(
    client: &reqwest::Client,
    url: &str,
    token: &str,
) -> Result<(), GatewayError> {
    let response = client
        .get(url)
        .header("Authorization", format!("Bot {token}"))
        .send()
        .await
        .map_err(map_transport_error)?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    Err(GatewayError::new(status_message(status)))
}

fn status_message(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{}: {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    let text = err.to_string();
    if err.is_timeout() {
        return GatewayError::with_code(text, GatewayErrorCode::Timeout);
    }
    if err.is_connect() {
        let code = if text.contains("dns") || text.contains("resolve") {
            GatewayErrorCode::ResolutionFailure
        } else {
            GatewayErrorCode::ConnectionRefused
        };
        return GatewayError::with_code(text, code);
    }
    GatewayError::new(text)
}
