//! Worker pool: fixed lanes draining one shared queue.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::discovery::Artifact;
use crate::harness::{AttemptResult, AttemptRunner};
use crate::observability::metrics;
use crate::pool::lanes::LanePlan;
use crate::pool::queue::WorkQueue;

/// Runs every artifact through an [`AttemptRunner`] on a fixed set of lanes.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    plan: LanePlan,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(plan: LanePlan) -> Self {
        Self {
            plan,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop claiming new work once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Run all artifacts and return one result per claimed artifact.
    ///
    /// Returns only after every lane has finished. Without a shutdown the
    /// result count equals `artifacts.len()`; result order is unspecified.
    pub async fn run_all<R: AttemptRunner>(
        &self,
        runner: &R,
        artifacts: &[Artifact],
    ) -> Vec<AttemptResult> {
        let queue = WorkQueue::new(artifacts);
        if queue.is_empty() {
            tracing::debug!("No artifacts queued, worker pool not started");
            return Vec::new();
        }
        let completed = AtomicUsize::new(0);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let lanes = self.plan.lanes_for(queue.len());
        tracing::info!(
            artifacts = queue.len(),
            lanes,
            first_port = self.plan.start_port(),
            "Starting worker pool"
        );

        let lane_ctx = LaneContext {
            runner,
            queue: &queue,
            completed: &completed,
            shutdown: &self.shutdown,
        };
        join_all((0..lanes).filter_map(|lane| {
            let port = self.plan.port_for(lane)?;
            Some(lane_ctx.run(lane, port, tx.clone()))
        }))
        .await;
        drop(tx);

        let mut results = Vec::with_capacity(queue.len());
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        if queue.remaining() > 0 {
            tracing::warn!(unclaimed = queue.remaining(), "Worker pool stopped before the queue was drained");
        }
        results
    }
}

/// State shared by all lanes of one `run_all` call.
struct LaneContext<'a, R> {
    runner: &'a R,
    queue: &'a WorkQueue<'a, Artifact>,
    completed: &'a AtomicUsize,
    shutdown: &'a CancellationToken,
}

impl<R: AttemptRunner> LaneContext<'_, R> {
    async fn run(&self, lane: usize, port: u16, results: mpsc::UnboundedSender<AttemptResult>) {
        metrics::lane_started();
        let total = self.queue.len();

        while !self.shutdown.is_cancelled() {
            let Some(artifact) = self.queue.claim() else {
                break;
            };

            let span = tracing::info_span!(
                "attempt",
                lane,
                port,
                artifact = %artifact.path.display(),
                behavior = %artifact.behavior,
            );

            let result = async {
                tracing::info!("Testing artifact");
                let result = self.runner.run_one(artifact, port).await;
                let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
                if result.success {
                    tracing::info!(done, total, elapsed_ms = result.elapsed_ms, "PASS");
                } else {
                    tracing::warn!(done, total, elapsed_ms = result.elapsed_ms, "FAIL");
                }
                result
            }
            .instrument(span)
            .await;

            // The receiver lives until every lane is joined.
            let _ = results.send(result);
        }

        metrics::lane_finished();
    }
}
