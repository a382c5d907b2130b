//! Boundary contract for the underlying Discord gateway client.
//!
//! The supervisor never talks to Discord directly; it drives an opaque
//! [`Gateway`] handle and consumes lifecycle notifications from the event
//! channel returned at construction. Real and mock implementations live in
//! the `vigil-gateway` crate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Low-level failure codes surfaced by the transport layer, mirroring the
/// socket-level errnos the classifier keys on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    ResolutionFailure,
    ConnectionRefused,
    Timeout,
}

/// A raw failure signal from a gateway connection, before classification.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    pub message: String,
    pub code: Option<GatewayErrorCode>,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: GatewayErrorCode) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

/// Lifecycle notification emitted by a gateway connection.
#[derive(Clone, Debug)]
pub enum GatewayEvent {
    Connected,
    Error(GatewayError),
    Disconnected(Option<GatewayError>),
}

impl GatewayEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Error(_) => "error",
            Self::Disconnected(_) => "disconnected",
        }
    }
}

/// One live or pending session against the Discord gateway.
///
/// Both calls are fire-and-forget: outcomes arrive only as [`GatewayEvent`]s
/// on the channel handed out by the factory, never through a return value.
pub trait Gateway: Send + Sync {
    fn connect(&self);
    fn disconnect(&self);
}

/// Constructs gateway handles. Construction is the only point where a
/// connection failure is reported synchronously (e.g. a token the protocol
/// layer rejects outright).
pub trait GatewayFactory: Send + Sync {
    fn create(
        &self,
        token: &str,
    ) -> Result<(Arc<dyn Gateway>, mpsc::Receiver<GatewayEvent>), GatewayError>;
}
