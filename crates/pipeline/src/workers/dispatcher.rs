//! Per-event dispatcher: one task per event, bounded concurrency.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{PipelineError, Result};
use crate::manager::{PipelineManager, PipelineReport};
use crate::signals::RawEvent;

/// Commands accepted by the dispatcher.
pub enum Command {
    /// Process one event. With a reply channel the caller receives the
    /// result; without one the result is only logged.
    Process {
        event: RawEvent,
        reply: Option<oneshot::Sender<Result<PipelineReport>>>,
    },
}

/// Dispatcher limits.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Events processed concurrently. Further commands wait in the channel.
    pub max_in_flight: usize,
    /// Deadline after which an event's cancellation token fires.
    pub event_timeout: Option<Duration>,
    pub command_buffer_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            event_timeout: Some(Duration::from_secs(30)),
            command_buffer_size: 256,
        }
    }
}

/// Background task that fans events out to per-event tasks.
///
/// Events for different players run in parallel. Within one event every
/// stage is sequential. Two events for the same player may overlap; the
/// store's last write wins.
pub struct Dispatcher {
    manager: Arc<PipelineManager>,
    command_rx: mpsc::Receiver<Command>,
    permits: Arc<Semaphore>,
    event_timeout: Option<Duration>,
    shutdown: CancellationToken,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(
        manager: Arc<PipelineManager>,
        command_rx: mpsc::Receiver<Command>,
        config: &DispatchConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            manager,
            command_rx,
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            event_timeout: config.event_timeout,
            shutdown,
            tasks: JoinSet::new(),
        }
    }

    /// Main loop. Returns once the command channel closes or shutdown is
    /// requested, after in-flight events have finished.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    Self::log_join(joined);
                }
                command = self.command_rx.recv() => match command {
                    Some(Command::Process { event, reply }) => {
                        if !self.spawn(event, reply).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        debug!(target: "pipeline::manager", in_flight = self.tasks.len(), "dispatcher draining");
        while let Some(joined) = self.tasks.join_next().await {
            Self::log_join(joined);
        }
        info!(target: "pipeline::manager", "dispatcher stopped");
    }

    /// Wait for a permit, then start the event's task. Returns false if the
    /// dispatcher is shutting down.
    async fn spawn(
        &mut self,
        event: RawEvent,
        reply: Option<oneshot::Sender<Result<PipelineReport>>>,
    ) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(PipelineError::Cancelled));
                }
                return false;
            }
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        let manager = Arc::clone(&self.manager);
        let cancel = self.shutdown.child_token();
        let timeout = self.event_timeout;

        self.tasks.spawn(async move {
            let _permit = permit;
            let deadline = timeout.map(|limit| {
                let token = cancel.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(limit).await;
                    token.cancel();
                })
            });

            let result = manager.process_event(&event, &cancel).await;
            if let Some(deadline) = deadline {
                deadline.abort();
            }

            match reply {
                Some(reply) => {
                    if reply.send(result).is_err() {
                        debug!(
                            target: "pipeline::manager",
                            "reply channel closed (caller dropped)"
                        );
                    }
                }
                None => {
                    if let Err(err) = result {
                        warn!(
                            target: "pipeline::manager",
                            event_type = %event.event_type,
                            error = %err,
                            "event dropped"
                        );
                    }
                }
            }
        });
        true
    }

    fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
        if let Err(err) = joined {
            error!(target: "pipeline::manager", error = %err, "event task failed");
        }
    }
}
