use std::sync::Arc;

use tokio::sync::broadcast;
use vigil_core::events::DashboardEvent;

use crate::client::ClientRegistry;

/// Subscribes to the supervisor's DashboardEvent broadcast and forwards
/// each event to the owning user's connected clients.
pub struct EventBridge {
    registry: Arc<ClientRegistry>,
}

impl EventBridge {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    pub fn start(
        &self,
        mut rx: broadcast::Receiver<DashboardEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(json) = serialize_event(&event) {
                            registry.broadcast_to_user(event.user_id(), &json);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "event bridge lagged, dropped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("event bridge channel closed");
                        break;
                    }
                }
            }
        })
    }
}

pub fn create_bridge(
    registry: Arc<ClientRegistry>,
    rx: broadcast::Receiver<DashboardEvent>,
) -> tokio::task::JoinHandle<()> {
    let bridge = EventBridge::new(registry);
    bridge.start(rx)
}

pub fn serialize_event(event: &DashboardEvent) -> Option<String> {
    serde_json::to_string(event).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ids::UserId;
    use vigil_core::status::StatusCounts;

    #[test]
    fn serialize_stats_update() {
        let event = DashboardEvent::StatsUpdate {
            user_id: UserId::new(),
            stats: StatusCounts {
                total: 1,
                online: 1,
                offline: 0,
                connecting: 0,
            },
        };
        let json = serialize_event(&event).unwrap();
        assert!(json.contains("\"type\":\"stats_update\""));
        assert!(json.contains("\"total\":1"));
    }

    #[tokio::test]
    async fn bridge_forwards_to_owner_clients() {
        let registry = Arc::new(ClientRegistry::new(32));
        let (tx, rx) = broadcast::channel(100);

        let user = UserId::new();
        let (_client_id, mut client_rx) = registry.register(user.clone());

        let handle = create_bridge(Arc::clone(&registry), rx);

        tx.send(DashboardEvent::StatsUpdate {
            user_id: user,
            stats: StatusCounts::default(),
        })
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let msg = client_rx.try_recv().unwrap();
        assert!(msg.contains("stats_update"));

        handle.abort();
    }

    #[tokio::test]
    async fn bridge_ignores_other_users() {
        let registry = Arc::new(ClientRegistry::new(32));
        let (tx, rx) = broadcast::channel(100);

        let (_client_id, mut client_rx) = registry.register(UserId::new());
        let _handle = create_bridge(Arc::clone(&registry), rx);

        tx.send(DashboardEvent::StatsUpdate {
            user_id: UserId::new(),
            stats: StatusCounts::default(),
        })
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(client_rx.try_recv().is_err());
    }
}
