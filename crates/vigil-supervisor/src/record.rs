use std::sync::Arc;

use tokio::task::JoinHandle;

use vigil_core::classify;
use vigil_core::events::BotView;
use vigil_core::gateway::{Gateway, GatewayEvent};
use vigil_core::history::{HistoryEntry, HistoryKind, HistoryRing};
use vigil_core::ids::{BotId, UserId};
use vigil_core::security::BotToken;
use vigil_core::status::BotStatus;

/// Live state of one supervised bot. Never leaves the crate; reads go out
/// as [`BotView`] projections.
pub(crate) struct BotRecord {
    pub id: BotId,
    pub user_id: UserId,
    pub token: BotToken,
    pub token_preview: String,
    pub status: BotStatus,
    pub last_error: Option<String>,
    pub created_at: String,
    pub history: HistoryRing,
    pub gateway: Arc<dyn Gateway>,
    pub pump: Option<JoinHandle<()>>,
}

impl BotRecord {
    pub fn view(&self) -> BotView {
        BotView {
            id: self.id.clone(),
            token_preview: self.token_preview.clone(),
            status: self.status,
            created_at: self.created_at.clone(),
            last_error: self.last_error.clone(),
            history: self.history.iter().cloned().collect(),
        }
    }

    /// Apply one gateway notification: status + last_error + history move
    /// together under the record's mutex. Returns the appended entry so the
    /// caller can mirror it to the store.
    pub fn apply(&mut self, event: &GatewayEvent) -> HistoryEntry {
        let entry = match event {
            GatewayEvent::Connected => {
                self.status = BotStatus::Online;
                self.last_error = None;
                HistoryEntry::now(HistoryKind::Success, "Successfully connected to Discord")
            }
            GatewayEvent::Error(err) => {
                let classified = classify::classify(err);
                self.status = BotStatus::Offline;
                self.last_error = Some(classified.message.clone());
                HistoryEntry::now(HistoryKind::Error, classified.message)
            }
            GatewayEvent::Disconnected(None) => {
                self.status = BotStatus::Offline;
                self.last_error = None;
                HistoryEntry::now(HistoryKind::Disconnect, "Clean disconnect")
            }
            GatewayEvent::Disconnected(Some(err)) => {
                self.status = BotStatus::Offline;
                self.last_error = Some(err.message.clone());
                HistoryEntry::now(HistoryKind::Disconnect, err.message.clone())
            }
        };
        self.history.push(entry.clone());
        entry
    }

    /// Operator-initiated shutdown: status and history move without waiting
    /// for the notification path.
    pub fn mark_stopped(&mut self) -> HistoryEntry {
        self.status = BotStatus::Offline;
        let entry = HistoryEntry::now(HistoryKind::Disconnect, "Manually disconnected");
        self.history.push(entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::gateway::GatewayError;

    struct NullGateway;
    impl Gateway for NullGateway {
        fn connect(&self) {}
        fn disconnect(&self) {}
    }

    fn record() -> BotRecord {
        BotRecord {
            id: BotId::new(),
            user_id: UserId::new(),
            token: BotToken::new("x".repeat(60)),
            token_preview: "****xxxx".into(),
            status: BotStatus::Connecting,
            last_error: None,
            created_at: "2026-08-30T12:00:00+00:00".into(),
            history: HistoryRing::new(),
            gateway: Arc::new(NullGateway),
            pump: None,
        }
    }

    #[test]
    fn connected_goes_online_and_clears_error() {
        let mut rec = record();
        rec.last_error = Some("old".into());
        let entry = rec.apply(&GatewayEvent::Connected);
        assert_eq!(rec.status, BotStatus::Online);
        assert!(rec.last_error.is_none());
        assert_eq!(entry.kind, HistoryKind::Success);
        assert_eq!(entry.message, "Successfully connected to Discord");
        assert_eq!(rec.history.len(), 1);
    }

    #[test]
    fn error_goes_offline_with_classified_message() {
        let mut rec = record();
        let entry = rec.apply(&GatewayEvent::Error(GatewayError::new("401: Unauthorized")));
        assert_eq!(rec.status, BotStatus::Offline);
        assert_eq!(
            rec.last_error.as_deref(),
            Some("Invalid or expired Discord token")
        );
        assert_eq!(entry.kind, HistoryKind::Error);
        assert_eq!(entry.message, "Invalid or expired Discord token");
    }

    #[test]
    fn clean_disconnect_clears_error() {
        let mut rec = record();
        rec.status = BotStatus::Online;
        rec.last_error = Some("old".into());
        let entry = rec.apply(&GatewayEvent::Disconnected(None));
        assert_eq!(rec.status, BotStatus::Offline);
        assert!(rec.last_error.is_none());
        assert_eq!(entry.kind, HistoryKind::Disconnect);
        assert_eq!(entry.message, "Clean disconnect");
    }

    #[test]
    fn faulted_disconnect_records_raw_message() {
        let mut rec = record();
        rec.status = BotStatus::Online;
        let entry = rec.apply(&GatewayEvent::Disconnected(Some(GatewayError::new(
            "connection reset by peer",
        ))));
        assert_eq!(rec.status, BotStatus::Offline);
        assert_eq!(rec.last_error.as_deref(), Some("connection reset by peer"));
        assert_eq!(entry.message, "connection reset by peer");
    }

    #[test]
    fn mark_stopped_keeps_last_error() {
        let mut rec = record();
        rec.status = BotStatus::Online;
        rec.last_error = Some("old".into());
        let entry = rec.mark_stopped();
        assert_eq!(rec.status, BotStatus::Offline);
        assert_eq!(rec.last_error.as_deref(), Some("old"));
        assert_eq!(entry.message, "Manually disconnected");
    }

    #[test]
    fn view_projects_history_in_append_order() {
        let mut rec = record();
        rec.apply(&GatewayEvent::Connected);
        rec.apply(&GatewayEvent::Disconnected(None));
        let view = rec.view();
        assert_eq!(view.history.len(), 2);
        assert_eq!(view.history[0].kind, HistoryKind::Success);
        assert_eq!(view.history[1].kind, HistoryKind::Disconnect);
        assert_eq!(view.token_preview, "****xxxx");
    }
}
