//! Run coordinator
//!
//! Top-level sequencing: acquire the session, verify the harness page loaded
//! cleanly, enumerate and group examples, run the capture orchestrator, and
//! persist the timestamped summary. The session is released on every exit
//! path, success or failure, before an error surfaces to the caller.

use crate::capture::{self, SnapshotEntry};
use crate::driver::Driver;
use crate::session::Session;
use crate::store::SnapshotStore;
use crate::{Error, Result, RunConfig};
use jiff::Timestamp;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Persisted summary of one run, overwritten each run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub generated_at: Timestamp,
    pub new_images: Vec<SnapshotEntry>,
    pub diff_images: Vec<SnapshotEntry>,
}

/// Path of the summary artifact inside a snapshot directory
pub fn summary_path(snapshot_dir: &Path) -> PathBuf {
    snapshot_dir.join("summary.json")
}

/// Execute a full capture run.
///
/// The factory runs on the driver's worker thread and is expected to start
/// the browser and navigate to the harness page; see
/// [`crate::cdp::CdpSession`] for the CDP-backed implementation.
pub async fn run<S, F>(config: &RunConfig, factory: F) -> Result<RunSummary>
where
    S: Session,
    F: FnOnce() -> Result<S> + Send + 'static,
{
    let driver = Driver::spawn(factory, Duration::from_millis(config.script_timeout_ms)).await?;

    let outcome = execute(config, &driver).await;
    let close_outcome = driver.close().await;

    let summary = outcome?;
    if let Err(err) = close_outcome {
        warn!("session close failed after a successful run: {}", err);
    }
    Ok(summary)
}

async fn execute(config: &RunConfig, driver: &Driver) -> Result<RunSummary> {
    let errors = driver.initialization_errors().await?;
    if !errors.is_empty() {
        return Err(Error::PageScript(errors));
    }

    let examples = driver.all_examples().await?;
    if examples.is_empty() {
        return Err(Error::NoExamples);
    }
    info!("discovered {} example(s)", examples.len());

    let plan = capture::build_plan(&config.viewports, &examples)?;

    let store = Arc::new(SnapshotStore::new(&config.snapshot_dir));
    store.ensure_dir().await?;

    let result = capture::capture_all(driver, &plan, &store).await?;

    let summary = RunSummary {
        generated_at: Timestamp::now(),
        new_images: result.new_images,
        diff_images: result.diff_images,
    };

    let bytes = serde_json::to_vec_pretty(&summary)
        .map_err(|e| Error::Other(format!("Summary serialization failed: {}", e)))?;
    tokio::fs::write(summary_path(&config.snapshot_dir), bytes).await?;

    info!(
        "run complete: {} new, {} diff",
        summary.new_images.len(),
        summary.diff_images.len()
    );
    Ok(summary)
}
