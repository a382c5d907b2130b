use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::ids::{BotId, UserId};
use crate::status::{BotStatus, StatusCounts};

/// Read-only projection of a managed bot, safe to serialize straight onto
/// the wire. The supervisor never hands out live record references.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotView {
    pub id: BotId,
    pub token_preview: String,
    pub status: BotStatus,
    pub created_at: String,
    pub last_error: Option<String>,
    pub history: Vec<HistoryEntry>,
}

/// Push updates emitted by the supervisor after every completed mutation,
/// including asynchronous lifecycle-driven ones. Scoped to the owning user;
/// the event bridge fans these out only to that user's dashboard clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashboardEvent {
    #[serde(rename = "bots_update")]
    BotsUpdate {
        user_id: UserId,
        bots: Vec<BotView>,
    },

    #[serde(rename = "stats_update")]
    StatsUpdate {
        user_id: UserId,
        stats: StatusCounts,
    },
}

impl DashboardEvent {
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::BotsUpdate { user_id, .. } | Self::StatsUpdate { user_id, .. } => user_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BotsUpdate { .. } => "bots_update",
            Self::StatsUpdate { .. } => "stats_update",
        }
    }
}
