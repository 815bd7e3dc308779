//! Event fan-out for the pool and its task processors.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use pool_core::{EventKind, JobPayload, PoolEvent, ScalingAction, WorkerId};
use serde_json::Value;
use tokio::sync::broadcast;

/// Callback registered with [`EventBus::on`].
pub type Listener = Arc<dyn Fn(&PoolEvent) + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

/// Delivers every event to the registered listeners, then to broadcast subscribers.
///
/// Listeners run synchronously on the emitting task, in registration order. The
/// listener list is copied before dispatch, so a callback may add or remove
/// listeners (including all of them) without affecting the event in flight.
pub struct EventBus {
    tx: broadcast::Sender<PoolEvent>,
    listeners: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            tx,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&PoolEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations().push(Registration {
            id,
            kind,
            listener: Arc::new(listener),
        });
        id
    }

    /// Unregister one listener. Returns whether it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.registrations();
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        listeners.len() != before
    }

    /// Unregister every listener for `kind`.
    pub fn remove_all_listeners(&self, kind: EventKind) {
        self.registrations().retain(|r| r.kind != kind);
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registrations().iter().filter(|r| r.kind == kind).count()
    }

    /// Receive every event as an owned value.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: PoolEvent) {
        let kind = event.kind();
        let snapshot: Vec<Listener> = self
            .registrations()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| Arc::clone(&r.listener))
            .collect();

        for listener in snapshot {
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                tracing::warn!("Listener for {} panicked", kind);
            }
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub(crate) fn internal_error(&self, error: impl ToString) {
        self.emit(PoolEvent::InternalError {
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// A pool-level fault, not tied to one processor.
    pub(crate) fn pool_error(&self, error: impl ToString) {
        self.emit(PoolEvent::Error {
            worker_id: None,
            queue: None,
            job: None,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn scaling_action(
        &self,
        action: ScalingAction,
        utilization: f64,
        backlog: u64,
        workers: usize,
    ) {
        self.emit(PoolEvent::MultiWorkerAction {
            action,
            utilization,
            backlog,
            workers,
            timestamp: Utc::now(),
        });
    }

    fn registrations(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Emits events on behalf of one task processor.
#[derive(Clone)]
pub struct EventSink {
    bus: Arc<EventBus>,
    worker_id: WorkerId,
}

impl EventSink {
    pub fn new(bus: Arc<EventBus>, worker_id: WorkerId) -> Self {
        Self { bus, worker_id }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn start(&self) {
        self.bus.emit(PoolEvent::Start {
            worker_id: self.worker_id.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn end(&self) {
        self.bus.emit(PoolEvent::End {
            worker_id: self.worker_id.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn cleaning_up(&self) {
        self.bus.emit(PoolEvent::CleaningUp {
            worker_id: self.worker_id.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn poll(&self, queue: &str) {
        self.bus.emit(PoolEvent::Poll {
            worker_id: self.worker_id.clone(),
            queue: queue.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn pause(&self) {
        self.bus.emit(PoolEvent::Pause {
            worker_id: self.worker_id.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn job(&self, job: &JobPayload) {
        self.bus.emit(PoolEvent::Job {
            worker_id: self.worker_id.clone(),
            queue: job.queue.clone(),
            job: job.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn success(&self, job: &JobPayload, result: Value, duration_ms: u64) {
        self.bus.emit(PoolEvent::Success {
            worker_id: self.worker_id.clone(),
            queue: job.queue.clone(),
            job: job.clone(),
            result,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn failure(&self, job: &JobPayload, error: String, duration_ms: u64) {
        self.bus.emit(PoolEvent::Failure {
            worker_id: self.worker_id.clone(),
            queue: job.queue.clone(),
            job: job.clone(),
            error,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn error(&self, queue: Option<&str>, error: impl ToString) {
        self.bus.emit(PoolEvent::Error {
            worker_id: Some(self.worker_id.clone()),
            queue: queue.map(str::to_string),
            job: None,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}
