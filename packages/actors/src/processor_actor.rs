//! Task processor actor: polls its queues and performs claimed jobs one at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use db::JobStore;
use pool_core::{ALL_QUEUES, JobPayload, ProcessorState, WorkerId};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::task::JoinHandle;

use crate::events::EventSink;
use crate::handler::JobRegistry;
use crate::messages::ProcessorMessage;

/// A processor's lifecycle state, readable from outside the actor.
#[derive(Debug, Clone, Default)]
pub struct StatusCell(Arc<AtomicU8>);

impl StatusCell {
    pub fn get(&self) -> ProcessorState {
        ProcessorState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ProcessorState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Move `from -> to`; a concurrent stop request wins.
    pub(crate) fn transition(&self, from: ProcessorState, to: ProcessorState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Processor actor arguments.
pub struct ProcessorArgs {
    pub worker_id: WorkerId,
    pub queues: Vec<String>,
    /// Wait after an empty poll or a store error.
    pub timeout: Duration,
    pub store: Arc<dyn JobStore>,
    pub registry: Arc<JobRegistry>,
    pub events: EventSink,
    pub status: StatusCell,
}

/// State for the processor actor.
pub struct ProcessorActorState {
    args: ProcessorArgs,
    /// Delayed poll scheduled after an empty poll.
    pending_poll: Option<JoinHandle<()>>,
}

/// Task processor actor.
pub struct ProcessorActor;

impl ProcessorActor {
    fn schedule_poll(myself: &ActorRef<ProcessorMessage>, state: &mut ProcessorActorState) {
        let myself = myself.clone();
        let delay = state.args.timeout;
        if let Some(previous) = state.pending_poll.take() {
            previous.abort();
        }
        state.pending_poll = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = myself.send_message(ProcessorMessage::Poll);
        }));
    }

    /// Configured queues with the wildcard expanded to the store's current queues.
    async fn resolve_queues(state: &ProcessorActorState) -> Result<Vec<String>, db::DbError> {
        let configured = &state.args.queues;
        if !configured.iter().any(|q| q == ALL_QUEUES) {
            return Ok(configured.clone());
        }

        let known = state.args.store.queues().await?;
        let mut resolved = Vec::new();
        for queue in configured {
            if queue == ALL_QUEUES {
                resolved.extend(known.iter().cloned());
            } else {
                resolved.push(queue.clone());
            }
        }
        let mut seen = std::collections::HashSet::new();
        resolved.retain(|q| seen.insert(q.clone()));
        Ok(resolved)
    }

    async fn perform(state: &ProcessorActorState, job: JobPayload) {
        let args = &state.args;
        args.status.transition(ProcessorState::Idle, ProcessorState::Working);
        args.events.job(&job);

        let started = Instant::now();
        let outcome = match args.registry.lookup(&job.class) {
            Ok(definition) => definition.run(&args.worker_id, &job).await,
            Err(e) => Err(e),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                tracing::debug!("{} completed job {} in {}ms", args.worker_id, job.id, duration_ms);
                args.events.success(&job, result, duration_ms);
            }
            Err(e) => {
                tracing::debug!("{} failed job {}: {}", args.worker_id, job.id, e);
                args.events.failure(&job, e.to_string(), duration_ms);
            }
        }

        args.status.transition(ProcessorState::Working, ProcessorState::Idle);
    }
}

impl Actor for ProcessorActor {
    type Msg = ProcessorMessage;
    type State = ProcessorActorState;
    type Arguments = ProcessorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting task processor: {}", args.worker_id);

        args.status.set(ProcessorState::Idle);
        if let Err(e) = args.store.track_worker(&args.worker_id, &args.queues).await {
            tracing::warn!("Failed to track {}: {}", args.worker_id, e);
            args.events.error(None, &e);
        }
        args.events.start();

        myself.send_message(ProcessorMessage::Poll)?;

        Ok(ProcessorActorState {
            args,
            pending_poll: None,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ProcessorMessage::Poll => {
                state.pending_poll = None;
                if state.args.status.get() != ProcessorState::Idle {
                    return Ok(());
                }

                let queues = match Self::resolve_queues(state).await {
                    Ok(queues) => queues,
                    Err(e) => {
                        state.args.events.error(None, &e);
                        Self::schedule_poll(&myself, state);
                        return Ok(());
                    }
                };

                for queue in &queues {
                    state.args.events.poll(queue);
                    match state.args.store.claim(queue).await {
                        Ok(Some(job)) => {
                            Self::perform(state, job).await;
                            myself.send_message(ProcessorMessage::Poll)?;
                            return Ok(());
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!("{} could not poll {}: {}", state.args.worker_id, queue, e);
                            state.args.events.error(Some(queue.as_str()), &e);
                            Self::schedule_poll(&myself, state);
                            return Ok(());
                        }
                    }
                }

                state.args.events.pause();
                Self::schedule_poll(&myself, state);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(timer) = state.pending_poll.take() {
            timer.abort();
        }

        let args = &state.args;
        args.status.set(ProcessorState::Stopping);
        args.events.cleaning_up();
        if let Err(e) = args.store.untrack_worker(&args.worker_id).await {
            args.events.error(None, &e);
        }
        args.status.set(ProcessorState::Stopped);
        args.events.end();

        tracing::info!("Task processor stopped: {}", args.worker_id);
        Ok(())
    }
}
