//! # Read Bundle Sweep
//!
//! Pending bundles are used by a single worker task. Callers send a request
//! over an mpsc queue and await the report on a oneshot; requests that pile
//! up while a sweep runs are answered together by the next one, so two
//! sweeps never overlap.

use super::context::PortContext;
use super::readers::clean_read;
use super::registry::BundleVersionRegistry;
use crate::domain::{PortError, PortResult, SweepReport};
use crate::metrics;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Queue depth of pending sweep requests.
const SWEEP_QUEUE_DEPTH: usize = 64;

/// Handle to the sweep worker.
#[derive(Clone)]
pub struct ReadBundleSweeper {
    requests: mpsc::Sender<oneshot::Sender<SweepReport>>,
}

impl ReadBundleSweeper {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(ctx: PortContext, registry: Arc<BundleVersionRegistry>) -> Self {
        let (requests, queue) = mpsc::channel(SWEEP_QUEUE_DEPTH);
        tokio::spawn(run_worker(queue, ctx, registry));
        Self { requests }
    }

    /// Request a sweep and wait for its report.
    pub async fn sweep(&self) -> PortResult<SweepReport> {
        let (reply, report) = oneshot::channel();
        self.requests
            .send(reply)
            .await
            .map_err(|_| PortError::Storage("sweep worker stopped".to_string()))?;
        report
            .await
            .map_err(|_| PortError::Storage("sweep worker dropped the request".to_string()))
    }
}

async fn run_worker(
    mut queue: mpsc::Receiver<oneshot::Sender<SweepReport>>,
    ctx: PortContext,
    registry: Arc<BundleVersionRegistry>,
) {
    while let Some(first) = queue.recv().await {
        let mut waiters = vec![first];
        while let Ok(next) = queue.try_recv() {
            waiters.push(next);
        }
        debug!(waiters = waiters.len(), "[portline] sweeping pending bundles");
        let report = sweep_once(&ctx, &registry).await;
        for waiter in waiters {
            let _ = waiter.send(report.clone());
        }
    }
    debug!("[portline] sweep worker stopped");
}

async fn sweep_once(ctx: &PortContext, registry: &BundleVersionRegistry) -> SweepReport {
    let mut report = SweepReport::default();
    let records = match ctx.store.list_read().await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "[portline] failed to list pending bundles");
            return report;
        }
    };

    for record in records {
        report.processed += 1;
        let port_id = record.port_id.clone();
        let mut reader = match registry.load_reader(ctx, record.clone()) {
            Ok(reader) => reader,
            Err(e) => {
                warn!(port_id = %port_id, version = %record.version, error = %e, "[portline] discarding unreadable pending bundle");
                clean_read(ctx, &record).await;
                report.failed += 1;
                metrics::record_read_bundle_processed("unsupported");
                continue;
            }
        };
        match reader.use_bundle().await {
            Ok(()) => {
                report.consumed += 1;
                metrics::record_read_bundle_processed("consumed");
            }
            Err(e) if e.is_transient() => {
                report.retained += 1;
                metrics::record_read_bundle_processed("retained");
            }
            Err(e) => {
                debug!(port_id = %port_id, error = %e, "[portline] pending bundle failed");
                report.failed += 1;
                metrics::record_read_bundle_processed("failed");
            }
        }
    }

    if report.processed > 0 {
        info!(
            processed = report.processed,
            consumed = report.consumed,
            retained = report.retained,
            failed = report.failed,
            "[portline] pending bundle sweep finished"
        );
    }
    report
}
