//! Scriptable gateway for deterministic supervisor tests.
//!
//! Each `create` call consumes the next scripted behavior. Tests can also
//! grab the raw event sender for any created session and inject lifecycle
//! events by hand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use vigil_core::gateway::{Gateway, GatewayError, GatewayEvent, GatewayFactory};

const EVENT_BUFFER: usize = 16;

/// What a mock session does when `connect` is called.
#[derive(Clone)]
pub enum MockBehavior {
    /// Emit `Connected`.
    ConnectOk,
    /// Emit `Error` with the given failure.
    ConnectError(GatewayError),
    /// Emit nothing; the test drives events through the handle.
    Manual,
    /// Fail the `create` call itself.
    RejectCreate(GatewayError),
}

/// Test-side view of one created session.
#[derive(Clone)]
pub struct MockHandle {
    pub sender: mpsc::Sender<GatewayEvent>,
    gateway: Arc<MockGateway>,
}

impl MockHandle {
    pub fn connect_count(&self) -> usize {
        self.gateway.connects.load(Ordering::Relaxed)
    }

    pub fn disconnect_count(&self) -> usize {
        self.gateway.disconnects.load(Ordering::Relaxed)
    }
}

pub struct MockGatewayFactory {
    behaviors: Mutex<Vec<MockBehavior>>,
    handles: Mutex<Vec<MockHandle>>,
    create_count: AtomicUsize,
}

impl MockGatewayFactory {
    pub fn new(behaviors: Vec<MockBehavior>) -> Self {
        let mut behaviors = behaviors;
        // Consumed back to front
        behaviors.reverse();
        Self {
            behaviors: Mutex::new(behaviors),
            handles: Mutex::new(Vec::new()),
            create_count: AtomicUsize::new(0),
        }
    }

    /// A factory where every session connects successfully.
    pub fn always_ok() -> Self {
        Self {
            behaviors: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            create_count: AtomicUsize::new(0),
        }
    }

    pub fn create_count(&self) -> usize {
        self.create_count.load(Ordering::Relaxed)
    }

    /// Handle for the nth created session.
    pub fn handle(&self, idx: usize) -> Option<MockHandle> {
        self.handles.lock().get(idx).cloned()
    }
}

impl GatewayFactory for MockGatewayFactory {
    fn create(
        &self,
        _token: &str,
    ) -> Result<(Arc<dyn Gateway>, mpsc::Receiver<GatewayEvent>), GatewayError> {
        self.create_count.fetch_add(1, Ordering::Relaxed);

        let behavior = self
            .behaviors
            .lock()
            .pop()
            .unwrap_or(MockBehavior::ConnectOk);

        if let MockBehavior::RejectCreate(err) = &behavior {
            return Err(err.clone());
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let gateway = Arc::new(MockGateway {
            behavior,
            tx: tx.clone(),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        });

        self.handles.lock().push(MockHandle {
            sender: tx,
            gateway: gateway.clone(),
        });

        Ok((gateway, rx))
    }
}

struct MockGateway {
    behavior: MockBehavior,
    tx: mpsc::Sender<GatewayEvent>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl Gateway for MockGateway {
    fn connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);

        let event = match &self.behavior {
            MockBehavior::ConnectOk => Some(GatewayEvent::Connected),
            MockBehavior::ConnectError(err) => Some(GatewayEvent::Error(err.clone())),
            MockBehavior::Manual => None,
            // Handled in create
            MockBehavior::RejectCreate(_) => None,
        };

        if let Some(event) = event {
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let _ = tx.send(event).await;
            });
        }
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(GatewayEvent::Disconnected(None)).await;
        });
    }
}
