//! Long-running pipeline service.
//!
//! The service owns the dispatcher task and hands out [`PipelineHandle`]s.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{PipelineError, PipelineHandle, Result};
use crate::manager::PipelineManager;
use crate::workers::{Command, DispatchConfig, Dispatcher};

/// Running dispatcher plus the handle used to feed it.
///
/// [`PipelineHandle`] is a cloneable façade for producers.
pub struct PipelineService {
    handle: PipelineHandle,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

impl PipelineService {
    /// Spawn the dispatcher on the current runtime.
    pub fn start(manager: Arc<PipelineManager>, config: DispatchConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel::<Command>(config.command_buffer_size.max(1));
        let shutdown = CancellationToken::new();

        let dispatcher = Dispatcher::new(manager, command_rx, &config, shutdown.clone());
        let worker = tokio::spawn(async move {
            dispatcher.run().await;
        });

        Self {
            handle: PipelineHandle::new(command_tx),
            shutdown,
            worker,
        }
    }

    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// Stop intake once every handle is dropped and wait for queued and
    /// in-flight events to finish.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);
        self.worker.await.map_err(PipelineError::WorkerJoin)
    }

    /// Cancel in-flight events and stop without draining the queue.
    ///
    /// Interrupted events still save what their actions produced.
    pub async fn abort(self) -> Result<()> {
        self.shutdown.cancel();
        drop(self.handle);
        self.worker.await.map_err(PipelineError::WorkerJoin)
    }
}
