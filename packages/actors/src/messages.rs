//! Message types for actor communication.

use ractor::RpcReplyPort;

/// Messages for the task processor actor.
///
/// Stopping goes through the actor's stop signal rather than a message, so a
/// stop never interrupts a job that is already running.
#[derive(Debug)]
pub enum ProcessorMessage {
    /// Try the queues for work.
    Poll,
}

/// Messages for the pool actor.
#[derive(Debug)]
pub enum PoolMessage {
    /// Run one scaling check.
    Check,

    /// Stop every processor, reply once all have exited, then stop the pool.
    Shutdown { reply: RpcReplyPort<()> },
}
