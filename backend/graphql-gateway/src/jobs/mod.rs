//! Background jobs
//!
//! Each job implements [`ScheduledJob`] and is driven by [`run_job_loop`],
//! which sleeps until the next fire time of the job's [`DailySchedule`].
//! Failures are logged and the loop waits for the next slot; there is no retry.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::DynStore;
use crate::services::EmailService;

pub mod inactive_user_reminder;

pub use inactive_user_reminder::InactiveUserReminderJob;

/// Shared handles for a job run
#[derive(Clone)]
pub struct JobContext {
    pub store: DynStore,
    pub email: EmailService,
    pub correlation_id: String,
}

impl JobContext {
    pub fn new(store: DynStore, email: EmailService) -> Self {
        Self {
            store,
            email,
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Fresh correlation id for each run
    pub fn with_new_correlation_id(&self) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }
}

/// Fires once a day at a fixed UTC wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    pub hour: u32,
    pub minute: u32,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self {
            hour: hour.min(23),
            minute: minute.min(59),
        }
    }

    /// Next fire time strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now
            .date_naive()
            .and_hms_opt(self.hour, self.minute, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);

        if today > now {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }
}

/// Counts reported by a job run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    pub sent: usize,
    pub failed: usize,
}

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;

    fn schedule(&self) -> DailySchedule;

    async fn run(&self, ctx: &JobContext) -> Result<JobReport>;
}

/// Run a job on its daily schedule until `shutdown` fires
pub async fn run_job_loop(
    job: Arc<dyn ScheduledJob>,
    ctx: JobContext,
    mut shutdown: broadcast::Receiver<()>,
) {
    let schedule = job.schedule();
    info!(
        job_name = %job.name(),
        hour = schedule.hour,
        minute = schedule.minute,
        "Starting job loop"
    );

    loop {
        let now = Utc::now();
        let next = schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(job_name = %job.name(), next_run = %next, "Job scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                let ctx = ctx.with_new_correlation_id();
                let start = Instant::now();

                match job.run(&ctx).await {
                    Ok(report) => info!(
                        job_name = %job.name(),
                        correlation_id = %ctx.correlation_id,
                        sent = report.sent,
                        failed = report.failed,
                        elapsed_ms = start.elapsed().as_millis(),
                        "Job run completed"
                    ),
                    Err(e) => error!(
                        job_name = %job.name(),
                        correlation_id = %ctx.correlation_id,
                        error = %e,
                        "Job run failed, waiting for next schedule"
                    ),
                }
            }
            _ = shutdown.recv() => {
                info!(job_name = %job.name(), "Shutting down job loop");
                break;
            }
        }
    }
}
