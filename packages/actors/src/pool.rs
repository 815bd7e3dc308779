//! The pool manager: public entry point for running an adaptive pool of task processors.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use db::{JobStore, SurrealStore};
use pool_core::{EventKind, PoolEvent};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::events::{EventBus, ListenerId};
use crate::handler::JobRegistry;
use crate::messages::PoolMessage;
use crate::monitor::{ProcessMonitor, ResourceMonitor};
use crate::pool_actor::{PoolActor, PoolArgs, WorkerView};

struct Running {
    actor: ActorRef<PoolMessage>,
    handle: JoinHandle<()>,
}

/// Runs between `min_task_processors` and `max_task_processors` task processors
/// against a shared store, adding or removing one per scaling check.
///
/// ```ignore
/// let registry = JobRegistry::new().with_job("echo", JobDefinition::new(|args| async move {
///     Ok(serde_json::json!(args))
/// }));
/// let pool = PoolManager::connect(PoolConfig::new(["default"]), registry).await?;
/// pool.on(EventKind::Failure, |event| tracing::warn!("{}", event.description()));
/// pool.start().await?;
/// // ...
/// pool.end().await?;
/// pool.close().await?;
/// ```
pub struct PoolManager {
    config: PoolConfig,
    registry: Arc<JobRegistry>,
    store: Arc<dyn JobStore>,
    monitor: Arc<dyn ResourceMonitor>,
    events: Arc<EventBus>,
    views: watch::Sender<Vec<WorkerView>>,
    processor_counter: Arc<AtomicU64>,
    /// Whether `close()` also releases the store.
    owns_store: bool,
    running: Mutex<Option<Running>>,
}

impl PoolManager {
    /// Build a pool with its own store connection and a process CPU monitor.
    pub async fn connect(config: PoolConfig, registry: JobRegistry) -> PoolResult<Self> {
        config.validate()?;
        let store = SurrealStore::connect(&config.connection).await?;
        let monitor = ProcessMonitor::new().map_err(|e| PoolError::Configuration(e.to_string()))?;

        let mut pool = Self::new(config, registry, Arc::new(store), Arc::new(monitor))?;
        pool.owns_store = true;
        Ok(pool)
    }

    /// Build a pool over existing collaborators. The caller keeps ownership of the store,
    /// so `close()` leaves it open.
    pub fn new(
        config: PoolConfig,
        registry: JobRegistry,
        store: Arc<dyn JobStore>,
        monitor: Arc<dyn ResourceMonitor>,
    ) -> PoolResult<Self> {
        config.validate()?;
        let (views, _) = watch::channel(Vec::new());

        Ok(Self {
            config,
            registry: Arc::new(registry),
            store,
            monitor,
            events: Arc::new(EventBus::new()),
            views,
            processor_counter: Arc::new(AtomicU64::new(0)),
            owns_store: false,
            running: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// The store processors claim from; use it to enqueue work.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Spawn `min_task_processors` processors and begin scaling checks.
    ///
    /// Calling it again while running does nothing. A pool can be started
    /// again after `end()`.
    pub async fn start(&self) -> PoolResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        let args = PoolArgs {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            monitor: Arc::clone(&self.monitor),
            events: Arc::clone(&self.events),
            views: self.views.clone(),
            processor_counter: Arc::clone(&self.processor_counter),
        };
        let (actor, handle) = Actor::spawn(None, PoolActor, args).await?;

        *running = Some(Running { actor, handle });
        Ok(())
    }

    /// Stop every processor and wait for all of them to exit.
    ///
    /// A processor in the middle of a job finishes it first, however long that
    /// takes. Does nothing when the pool is not running.
    pub async fn end(&self) -> PoolResult<()> {
        let mut running = self.running.lock().await;
        let Some(Running { actor, handle }) = running.take() else {
            return Ok(());
        };

        let drained = matches!(
            ractor::rpc::call(&actor, |reply| PoolMessage::Shutdown { reply }, None).await,
            Ok(CallResult::Success(()))
        );
        if !drained {
            // Its post_stop drains instead.
            tracing::warn!("Pool actor did not acknowledge shutdown; stopping it directly");
            actor.stop(None);
        }
        handle
            .await
            .map_err(|e| PoolError::Messaging(format!("pool actor panicked: {}", e)))
    }

    /// End the pool and release the store if the pool opened it.
    pub async fn close(self) -> PoolResult<()> {
        self.end().await?;
        if self.owns_store {
            self.store.end().await?;
        }
        Ok(())
    }

    /// Live task processors, oldest first.
    pub fn workers(&self) -> Vec<WorkerView> {
        self.views.borrow().clone()
    }

    /// Receive a value each time the set of live processors changes.
    pub fn watch_workers(&self) -> watch::Receiver<Vec<WorkerView>> {
        self.views.subscribe()
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&PoolEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn remove_all_listeners(&self, kind: EventKind) {
        self.events.remove_all_listeners(kind)
    }

    /// Receive every event over a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }
}
