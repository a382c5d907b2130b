use vigil_core::gateway::GatewayError;
use vigil_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// Token failed shape validation before any connection attempt.
    #[error("invalid token format")]
    InvalidToken,

    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("bot not found")]
    NotFound,

    /// The bot exists durably but has no live session to toggle.
    #[error("bot is not running")]
    NotRunning,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
