use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::pipeline::{Pipeline, RunOutcome, RunReport};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the interval to elapse.
    Idle,
    Running,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub runs_completed: u64,
    pub runs_skipped: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_report: Option<RunReport>,
}

#[derive(Debug)]
struct Inner {
    state: SchedulerState,
    stats: SchedulerStats,
}

/// Fixed-interval driver for [`Pipeline::run_once`].
///
/// Runs once immediately, then waits `interval` after each run finishes.
/// The loop has no terminal state; it stops only when its task is aborted.
#[derive(Clone)]
pub struct DealScheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    inner: Arc<RwLock<Inner>>,
}

impl DealScheduler {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            inner: Arc::new(RwLock::new(Inner {
                state: SchedulerState::Idle,
                stats: SchedulerStats::default(),
            })),
        }
    }

    pub async fn state(&self) -> SchedulerState {
        self.inner.read().await.state
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.inner.read().await.stats.clone()
    }

    pub fn spawn(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_forever().await })
    }

    pub async fn run_forever(&self) {
        tracing::info!("Scheduler started, posting every {}s", self.interval.as_secs());

        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One scheduled run, with state and stats bookkeeping around it.
    pub async fn tick(&self) -> RunOutcome {
        self.inner.write().await.state = SchedulerState::Running;

        let outcome = self.pipeline.run_once().await;

        let mut inner = self.inner.write().await;
        inner.state = SchedulerState::Idle;
        inner.stats.last_run = Some(Utc::now());
        match &outcome {
            RunOutcome::Completed(report) => {
                inner.stats.runs_completed += 1;
                inner.stats.last_report = Some(report.clone());
            }
            RunOutcome::Skipped => {
                inner.stats.runs_skipped += 1;
                tracing::warn!("Scheduled run skipped, another run is still in progress");
            }
        }

        outcome
    }
}
