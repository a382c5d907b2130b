use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, instrument, warn};

use vigil_core::events::{BotView, DashboardEvent};
use vigil_core::gateway::{GatewayEvent, GatewayFactory};
use vigil_core::history::{HistoryEntry, HistoryRing, HISTORY_CAPACITY};
use vigil_core::ids::{BotId, UserId};
use vigil_core::security::{mask_token, token_hash, BotToken};
use vigil_core::status::{BotStatus, StatusCounts};
use vigil_store::bots::{BotRepo, BotRow};
use vigil_store::history::HistoryRepo;
use vigil_store::Database;

use crate::error::SupervisorError;
use crate::record::BotRecord;

/// Discord bot tokens are ~59 characters; anything shorter is rejected
/// before any connection attempt.
const MIN_TOKEN_LEN: usize = 50;

/// Owns every live bot session. Cheap to clone; all clones share state.
///
/// Each record sits behind its own `tokio::Mutex`, so gateway notifications
/// serialize against operator calls for the same bot while different bots
/// proceed independently.
#[derive(Clone)]
pub struct BotSupervisor {
    records: Arc<DashMap<BotId, Arc<Mutex<BotRecord>>>>,
    bots: Arc<BotRepo>,
    history: Arc<HistoryRepo>,
    factory: Arc<dyn GatewayFactory>,
    events: broadcast::Sender<DashboardEvent>,
}

impl BotSupervisor {
    pub fn new(
        db: Database,
        factory: Arc<dyn GatewayFactory>,
        events: broadcast::Sender<DashboardEvent>,
    ) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            bots: Arc::new(BotRepo::new(db.clone())),
            history: Arc::new(HistoryRepo::new(db)),
            factory,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    /// Number of live sessions across all users.
    pub fn live_count(&self) -> usize {
        self.records.len()
    }

    /// Validate, persist, and start a new bot. Returns the id immediately;
    /// the connection outcome arrives later as a status transition.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn add_bot(
        &self,
        user_id: &UserId,
        token: &str,
    ) -> Result<BotId, SupervisorError> {
        if token.len() < MIN_TOKEN_LEN {
            return Err(SupervisorError::InvalidToken);
        }

        let (gateway, rx) = self.factory.create(token)?;

        let row = self
            .bots
            .create(user_id, &mask_token(token), &token_hash(token))?;
        let id = row.id.clone();

        let record = Arc::new(Mutex::new(BotRecord {
            id: id.clone(),
            user_id: user_id.clone(),
            token: BotToken::new(token),
            token_preview: row.token_preview,
            status: BotStatus::Connecting,
            last_error: None,
            created_at: row.created_at,
            history: HistoryRing::new(),
            gateway: gateway.clone(),
            pump: None,
        }));
        self.records.insert(id.clone(), record.clone());

        let pump = self.spawn_pump(id.clone(), rx);
        record.lock().await.pump = Some(pump);

        gateway.connect();
        debug!(bot_id = %id, "bot added, connection started");

        self.broadcast_user(user_id).await;
        Ok(id)
    }

    /// Stop and forget a bot. Disconnect is best-effort; the durable row and
    /// its history go with it.
    #[instrument(skip(self), fields(user_id = %user_id, bot_id = %id))]
    pub async fn remove_bot(&self, user_id: &UserId, id: &BotId) -> Result<(), SupervisorError> {
        let live = self.records.get(id).map(|r| Arc::clone(r.value()));

        if let Some(record) = live {
            let mut guard = record.lock().await;
            if &guard.user_id != user_id {
                return Err(SupervisorError::NotFound);
            }
            if let Some(pump) = guard.pump.take() {
                pump.abort();
            }
            guard.gateway.disconnect();
            drop(guard);
            self.records.remove(id);
        } else if self.bots.get(id, user_id)?.is_none() {
            return Err(SupervisorError::NotFound);
        }

        self.bots.delete(id, user_id)?;
        debug!(bot_id = %id, "bot removed");

        self.broadcast_user(user_id).await;
        Ok(())
    }

    /// Flip a bot between running and stopped. Returns the new status.
    #[instrument(skip(self), fields(user_id = %user_id, bot_id = %id))]
    pub async fn toggle_bot(
        &self,
        user_id: &UserId,
        id: &BotId,
    ) -> Result<BotStatus, SupervisorError> {
        let Some(record) = self.records.get(id).map(|r| Arc::clone(r.value())) else {
            // Durable but not live: the plaintext token did not survive a
            // restart, so there is nothing to reconnect with.
            return match self.bots.get(id, user_id)? {
                Some(_) => Err(SupervisorError::NotRunning),
                None => Err(SupervisorError::NotFound),
            };
        };

        let mut guard = record.lock().await;
        if &guard.user_id != user_id {
            return Err(SupervisorError::NotFound);
        }

        if guard.status == BotStatus::Online {
            if let Some(pump) = guard.pump.take() {
                pump.abort();
            }
            guard.gateway.disconnect();
            let entry = guard.mark_stopped();
            self.mirror(id, user_id, guard.status, guard.last_error.as_deref(), &entry);
            drop(guard);

            self.broadcast_user(user_id).await;
            return Ok(BotStatus::Offline);
        }

        // Offline or Connecting: start a fresh session with the retained token
        let (gateway, rx) = self.factory.create(guard.token.expose())?;
        if let Some(pump) = guard.pump.take() {
            pump.abort();
        }
        guard.gateway = gateway.clone();
        guard.status = BotStatus::Connecting;
        guard.pump = Some(self.spawn_pump(id.clone(), rx));
        let last_error = guard.last_error.clone();
        drop(guard);

        gateway.connect();
        if let Err(err) = self
            .bots
            .update_status(id, user_id, BotStatus::Connecting, last_error.as_deref())
        {
            warn!(bot_id = %id, error = %err, "failed to mirror status to store");
        }

        self.broadcast_user(user_id).await;
        Ok(BotStatus::Connecting)
    }

    /// Live record if present, else the durable row. Owner mismatch reads as
    /// absent.
    pub async fn get_bot(&self, user_id: &UserId, id: &BotId) -> Option<BotView> {
        if let Some(record) = self.records.get(id).map(|r| Arc::clone(r.value())) {
            let guard = record.lock().await;
            if &guard.user_id == user_id {
                return Some(guard.view());
            }
            return None;
        }

        match self.bots.get(id, user_id) {
            Ok(Some(row)) => Some(self.durable_view(&row)),
            Ok(None) => None,
            Err(err) => {
                warn!(bot_id = %id, error = %err, "store read failed");
                None
            }
        }
    }

    /// All of a user's bots, newest first, with live state overlaid where a
    /// session exists.
    pub async fn list_bots(&self, user_id: &UserId) -> Result<Vec<BotView>, SupervisorError> {
        let rows = self.bots.list_by_user(user_id)?;
        let mut views = Vec::with_capacity(rows.len());

        for row in rows {
            let live = self.records.get(&row.id).map(|r| Arc::clone(r.value()));
            match live {
                Some(record) => {
                    let guard = record.lock().await;
                    if &guard.user_id == user_id {
                        views.push(guard.view());
                    } else {
                        views.push(self.durable_view(&row));
                    }
                }
                None => views.push(self.durable_view(&row)),
            }
        }

        Ok(views)
    }

    pub fn status_counts(&self, user_id: &UserId) -> Result<StatusCounts, SupervisorError> {
        Ok(self.bots.status_counts(user_id)?)
    }

    /// Counts across all users, for the health endpoint.
    pub fn global_status_counts(&self) -> Result<StatusCounts, SupervisorError> {
        Ok(self.bots.global_status_counts()?)
    }

    /// Recent history for one bot, newest first. Served from the store so it
    /// works for durable-only records too.
    pub fn bot_history(
        &self,
        user_id: &UserId,
        id: &BotId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, SupervisorError> {
        Ok(self.history.list(id, user_id, limit)?)
    }

    fn durable_view(&self, row: &BotRow) -> BotView {
        let mut history = self
            .history
            .list(&row.id, &row.user_id, HISTORY_CAPACITY)
            .unwrap_or_default();
        history.reverse();

        BotView {
            id: row.id.clone(),
            token_preview: row.token_preview.clone(),
            status: row.status,
            created_at: row.created_at.clone(),
            last_error: row.last_error.clone(),
            history,
        }
    }

    /// Consume gateway notifications for one bot. A notification that
    /// arrives after the bot left the registry is discarded.
    fn spawn_pump(
        &self,
        id: BotId,
        mut rx: mpsc::Receiver<GatewayEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let supervisor = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(record) = supervisor.records.get(&id).map(|r| Arc::clone(r.value())) else {
                    debug!(bot_id = %id, event = event.event_type(), "notification for removed bot discarded");
                    continue;
                };

                let (user_id, status, last_error, entry) = {
                    let mut guard = record.lock().await;
                    let entry = guard.apply(&event);
                    (
                        guard.user_id.clone(),
                        guard.status,
                        guard.last_error.clone(),
                        entry,
                    )
                };

                supervisor.mirror(&id, &user_id, status, last_error.as_deref(), &entry);
                supervisor.broadcast_user(&user_id).await;
            }
        })
    }

    /// Mirror a transition to the store. Store failures never stall the
    /// supervisor; the in-memory record stays authoritative.
    fn mirror(
        &self,
        id: &BotId,
        user_id: &UserId,
        status: BotStatus,
        last_error: Option<&str>,
        entry: &HistoryEntry,
    ) {
        if let Err(err) = self.bots.update_status(id, user_id, status, last_error) {
            warn!(bot_id = %id, error = %err, "failed to mirror status to store");
        }
        if let Err(err) = self.history.append(id, entry) {
            warn!(bot_id = %id, error = %err, "failed to mirror history to store");
        }
    }

    /// Push the user's full snapshot after any completed mutation. Send
    /// errors mean no dashboard is listening, which is fine.
    async fn broadcast_user(&self, user_id: &UserId) {
        let bots = match self.list_bots(user_id).await {
            Ok(bots) => bots,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to snapshot bots for broadcast");
                return;
            }
        };
        let stats = match self.bots.status_counts(user_id) {
            Ok(stats) => stats,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to read stats for broadcast");
                return;
            }
        };

        let _ = self.events.send(DashboardEvent::BotsUpdate {
            user_id: user_id.clone(),
            bots,
        });
        let _ = self.events.send(DashboardEvent::StatsUpdate {
            user_id: user_id.clone(),
            stats,
        });
    }
}
