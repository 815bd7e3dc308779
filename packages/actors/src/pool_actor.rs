//! Pool actor: owns the task processors and resizes the pool on every check.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use db::JobStore;
use pool_core::{ProcessorState, ScalingAction, WorkerId};
use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::events::{EventBus, EventSink};
use crate::handler::JobRegistry;
use crate::messages::{PoolMessage, ProcessorMessage};
use crate::monitor::{ResourceMonitor, host_name};
use crate::processor_actor::{ProcessorActor, ProcessorArgs, StatusCell};
use crate::scaling::ScalingInput;

/// Read-only view of one live task processor.
#[derive(Debug, Clone)]
pub struct WorkerView {
    worker_id: WorkerId,
    queues: Vec<String>,
    status: StatusCell,
}

impl WorkerView {
    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn queues(&self) -> &[String] {
        &self.queues
    }

    /// Current state, read live from the processor.
    pub fn state(&self) -> ProcessorState {
        self.status.get()
    }
}

/// Pool actor arguments.
pub struct PoolArgs {
    pub config: PoolConfig,
    pub store: Arc<dyn JobStore>,
    pub registry: Arc<JobRegistry>,
    pub monitor: Arc<dyn ResourceMonitor>,
    pub events: Arc<EventBus>,
    pub views: watch::Sender<Vec<WorkerView>>,
    /// Index counter for processor ids; outlives a single start/end cycle.
    pub processor_counter: Arc<AtomicU64>,
}

struct LiveProcessor {
    view: WorkerView,
    actor: ActorRef<ProcessorMessage>,
    handle: JoinHandle<()>,
}

/// State for the pool actor.
pub struct PoolActorState {
    args: PoolArgs,
    host: String,
    pid: u32,
    /// Oldest first.
    live: Vec<LiveProcessor>,
    /// Processors removed by a shrink that may still be finishing a job.
    retiring: Vec<JoinHandle<()>>,
    pending_check: Option<JoinHandle<()>>,
    draining: bool,
}

impl PoolActorState {
    fn new(args: PoolArgs) -> Self {
        Self {
            args,
            host: host_name(),
            pid: std::process::id(),
            live: Vec::new(),
            retiring: Vec::new(),
            pending_check: None,
            draining: false,
        }
    }

    fn next_worker_id(&mut self) -> WorkerId {
        let index = self.args.processor_counter.fetch_add(1, Ordering::Relaxed) + 1;
        WorkerId::new(&self.host, self.pid, index)
    }

    fn publish(&self) {
        self.args
            .views
            .send_replace(self.live.iter().map(|p| p.view.clone()).collect());
    }

    fn has_idle(&self) -> bool {
        self.live
            .iter()
            .any(|p| p.view.state() == ProcessorState::Idle)
    }
}

/// Pool actor that supervises task processors.
pub struct PoolActor;

impl PoolActor {
    async fn spawn_processor(
        myself: &ActorRef<PoolMessage>,
        state: &mut PoolActorState,
    ) -> Result<(), ActorProcessingErr> {
        let worker_id = state.next_worker_id();
        let status = StatusCell::default();
        let args = ProcessorArgs {
            worker_id: worker_id.clone(),
            queues: state.args.config.queues.clone(),
            timeout: state.args.config.timeout(),
            store: Arc::clone(&state.args.store),
            registry: Arc::clone(&state.args.registry),
            events: EventSink::new(Arc::clone(&state.args.events), worker_id.clone()),
            status: status.clone(),
        };

        let (actor, handle) =
            Actor::spawn_linked(None, ProcessorActor, args, myself.get_cell())
                .await
                .map_err(|e| {
                    ActorProcessingErr::from(format!("Failed to spawn {}: {}", worker_id, e))
                })?;

        state.live.push(LiveProcessor {
            view: WorkerView {
                worker_id,
                queues: state.args.config.queues.clone(),
                status,
            },
            actor,
            handle,
        });
        state.publish();
        Ok(())
    }

    /// Remove the most recently added idle processor. It finishes in the background.
    fn retire_idle(state: &mut PoolActorState) -> bool {
        let Some(index) = state
            .live
            .iter()
            .rposition(|p| p.view.state() == ProcessorState::Idle)
        else {
            return false;
        };

        let processor = state.live.remove(index);
        tracing::debug!("Retiring task processor {}", processor.view.worker_id);
        processor.view.status.set(ProcessorState::Stopping);
        processor.actor.stop(None);
        state.retiring.push(processor.handle);
        state.publish();
        true
    }

    fn schedule_check(myself: &ActorRef<PoolMessage>, state: &mut PoolActorState) {
        let myself = myself.clone();
        let delay = state.args.config.check_timeout();
        state.pending_check = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = myself.send_message(PoolMessage::Check);
        }));
    }

    async fn check(myself: &ActorRef<PoolMessage>, state: &mut PoolActorState) {
        state.retiring.retain(|h| !h.is_finished());

        let utilization = match state.args.monitor.sample().await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Scaling check skipped: {}", e);
                state.args.events.pool_error(e);
                return;
            }
        };
        let backlog = match state.args.store.backlog(&state.args.config.queues).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Scaling check skipped: {}", e);
                state.args.events.pool_error(e);
                return;
            }
        };

        let config = &state.args.config;
        let action = config.scaling.decide(ScalingInput {
            current: state.live.len(),
            min: config.min_task_processors,
            max: config.max_task_processors,
            utilization,
            backlog,
            has_idle: state.has_idle(),
        });

        let applied = match action {
            ScalingAction::Grow => match Self::spawn_processor(myself, state).await {
                Ok(()) => ScalingAction::Grow,
                Err(e) => {
                    state.args.events.internal_error(e);
                    ScalingAction::Hold
                }
            },
            ScalingAction::Shrink => {
                if Self::retire_idle(state) {
                    ScalingAction::Shrink
                } else {
                    ScalingAction::Hold
                }
            }
            ScalingAction::Hold => ScalingAction::Hold,
        };

        tracing::debug!(
            "Scaling check: {} (cpu {:.2}, backlog {}, workers {})",
            applied,
            utilization,
            backlog,
            state.live.len()
        );
        state
            .args
            .events
            .scaling_action(applied, utilization, backlog, state.live.len());
    }

    /// Forget a processor that exited on its own and refill to min.
    async fn replace_if_needed(
        myself: &ActorRef<PoolMessage>,
        state: &mut PoolActorState,
        index: usize,
    ) {
        state.live.remove(index);
        state.publish();

        if state.live.len() < state.args.config.min_task_processors
            && let Err(e) = Self::spawn_processor(myself, state).await
        {
            state.args.events.internal_error(e);
        }
    }

    /// Stop every processor and wait until all of them, retired ones included, have exited.
    async fn drain(state: &mut PoolActorState) {
        if let Some(timer) = state.pending_check.take() {
            timer.abort();
        }

        let live = std::mem::take(&mut state.live);
        for processor in &live {
            processor.view.status.set(ProcessorState::Stopping);
            processor.actor.stop(None);
        }
        state.publish();

        let handles: Vec<JoinHandle<()>> = live
            .into_iter()
            .map(|p| p.handle)
            .chain(state.retiring.drain(..))
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Task processor did not shut down cleanly: {}", e);
            }
        }
    }
}

impl Actor for PoolActor {
    type Msg = PoolMessage;
    type State = PoolActorState;
    type Arguments = PoolArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting pool: queues {:?}, {}..={} processors",
            args.config.queues,
            args.config.min_task_processors,
            args.config.max_task_processors
        );

        let mut state = PoolActorState::new(args);
        for _ in 0..state.args.config.min_task_processors {
            Self::spawn_processor(&myself, &mut state).await?;
        }
        // The first check measures load from here on.
        state.args.monitor.reset();
        Self::schedule_check(&myself, &mut state);

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            PoolMessage::Check => {
                state.pending_check = None;
                if state.draining {
                    return Ok(());
                }
                Self::check(&myself, state).await;
                Self::schedule_check(&myself, state);
            }

            PoolMessage::Shutdown { reply } => {
                tracing::info!("Shutting down pool");
                state.draining = true;
                Self::drain(state).await;
                let _ = reply.send(());
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorFailed(cell, err) => {
                let Some(index) = state.live.iter().position(|p| p.actor.get_id() == cell.get_id())
                else {
                    return Ok(());
                };
                let worker_id = state.live[index].view.worker_id.clone();
                tracing::warn!("Task processor {} failed: {}", worker_id, err);

                state.live[index].view.status.set(ProcessorState::Stopped);
                state
                    .args
                    .events
                    .internal_error(format!("Task processor {} failed: {}", worker_id, err));
                if let Err(e) = state.args.store.untrack_worker(&worker_id).await {
                    state.args.events.pool_error(e);
                }
                Self::replace_if_needed(&myself, state, index).await;
            }
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                // Retired processors are already gone from the live set.
                if let Some(index) = state.live.iter().position(|p| p.actor.get_id() == cell.get_id())
                {
                    tracing::warn!(
                        "Task processor {} exited unexpectedly: {:?}",
                        state.live[index].view.worker_id,
                        reason
                    );
                    Self::replace_if_needed(&myself, state, index).await;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        // No-op after a Shutdown message; covers a bare stop of the pool actor.
        Self::drain(state).await;
        tracing::info!("Pool stopped");
        Ok(())
    }
}
