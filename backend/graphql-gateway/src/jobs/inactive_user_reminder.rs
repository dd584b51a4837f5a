//! Daily "we miss you" email for users who stopped logging in

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::{DailySchedule, JobContext, JobReport, ScheduledJob};
use crate::metrics;

pub struct InactiveUserReminderJob {
    schedule: DailySchedule,
    inactivity: Duration,
}

impl InactiveUserReminderJob {
    pub fn new(schedule: DailySchedule, inactivity_days: i64) -> Self {
        Self {
            schedule,
            inactivity: Duration::days(inactivity_days.max(0)),
        }
    }
}

#[async_trait]
impl ScheduledJob for InactiveUserReminderJob {
    fn name(&self) -> &str {
        "inactive_user_reminder"
    }

    fn schedule(&self) -> DailySchedule {
        self.schedule
    }

    async fn run(&self, ctx: &JobContext) -> Result<JobReport> {
        let cutoff = Utc::now() - self.inactivity;
        let users = ctx.store.users_inactive_since(cutoff).await?;

        info!(
            correlation_id = %ctx.correlation_id,
            candidates = users.len(),
            cutoff = %cutoff,
            "Sending login reminders"
        );

        let mut report = JobReport::default();
        for user in users {
            match ctx.email.send_login_reminder(&user.email, &user.username).await {
                Ok(()) => {
                    metrics::record_reminder_email("login", true);
                    report.sent += 1;
                }
                Err(e) => {
                    metrics::record_reminder_email("login", false);
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        user_id = %user.id,
                        error = %e,
                        "Failed to send login reminder"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
