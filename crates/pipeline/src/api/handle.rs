//! Cloneable façade for submitting events to the dispatcher.
use tokio::sync::{mpsc, oneshot};

use super::errors::{PipelineError, Result};
use crate::manager::PipelineReport;
use crate::signals::RawEvent;
use crate::workers::Command;

/// Client-facing handle to a running pipeline service.
#[derive(Clone)]
pub struct PipelineHandle {
    command_tx: mpsc::Sender<Command>,
}

impl PipelineHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>) -> Self {
        Self { command_tx }
    }

    /// Queue an event without waiting for it to be processed.
    ///
    /// Waits only while the command buffer is full.
    pub async fn submit(&self, event: RawEvent) -> Result<()> {
        self.command_tx
            .send(Command::Process { event, reply: None })
            .await
            .map_err(|_| PipelineError::CommandChannelClosed)
    }

    /// Queue an event and wait for its report.
    pub async fn process(&self, event: RawEvent) -> Result<PipelineReport> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Process {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| PipelineError::CommandChannelClosed)?;

        reply_rx.await.map_err(PipelineError::ReplyChannelClosed)?
    }
}
