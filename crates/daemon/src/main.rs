//! Churn pipeline daemon.
//!
//! Reads newline-delimited JSON events from stdin and feeds them to the
//! pipeline until end of input or Ctrl-C.
mod fulfillment;
mod logging;

use std::sync::Arc;

use anyhow::Result;
use churn_bootstrap::{ChurnBuilder, PipelineConfig};
use pipeline::{InMemorySessionTracker, PipelineHandle, PipelineService, RawEvent};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::fulfillment::LoggingFulfillment;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    logging::setup_logging()?;

    let config = PipelineConfig::from_env()?;
    let dispatch = config.dispatch_config();

    let setup = ChurnBuilder::new(config)
        .fulfillment(Arc::new(LoggingFulfillment))
        .session_tracker(Arc::new(InMemorySessionTracker::new()))
        .build()?;

    let service = PipelineService::start(Arc::clone(&setup.manager), dispatch);
    let handle = service.handle();

    tokio::select! {
        result = feed_stdin(handle) => {
            result?;
            tracing::info!("input closed, draining queued events");
            service.shutdown().await?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, cancelling in-flight events");
            service.abort().await?;
        }
    }

    tracing::info!("churn daemon stopped");
    Ok(())
}

/// Submit one event per non-empty stdin line. Malformed lines are skipped.
async fn feed_stdin(handle: PipelineHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: RawEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping malformed event");
                continue;
            }
        };
        handle.submit(event).await?;
    }
    Ok(())
}
