//! Task runner

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use mockall::automock;
use thiserror::Error;
use tracing::{error, info};

use crate::tasks::{ScheduledTask, TaskError, TaskScheduler};

const BASE_RETRY_DELAY: SignedDuration = SignedDuration::from_secs(60);
const MAX_RETRY_DELAY: SignedDuration = SignedDuration::from_hours(24);

/// Why a task attempt failed; kept on the task for the next attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TaskFailure(pub String);

#[automock]
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &ScheduledTask) -> Result<(), TaskFailure>;
}

/// Outcome of one pass over the due tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub completed: usize,
    pub failed: usize,
}

/// Delay before attempt `attempt + 1`, doubling from one minute up to a day.
pub fn retry_delay(attempt: u32) -> SignedDuration {
    let factor = 2_i32.saturating_pow(attempt.saturating_sub(1).min(16));

    BASE_RETRY_DELAY
        .checked_mul(factor)
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

pub struct TaskRunner {
    scheduler: Arc<dyn TaskScheduler>,
    handler: Arc<dyn TaskHandler>,
}

impl TaskRunner {
    pub fn new(scheduler: Arc<dyn TaskScheduler>, handler: Arc<dyn TaskHandler>) -> Self {
        Self { scheduler, handler }
    }

    /// Run every task that is due at `now`.
    ///
    /// Failed tasks are moved back with an increasing delay.
    ///
    /// # Errors
    ///
    /// Returns an error when the task store fails; handler failures are not errors.
    pub async fn run_due(&self, now: Timestamp) -> Result<RunReport, TaskError> {
        let mut report = RunReport::default();

        for task in self.scheduler.due(now).await? {
            match self.handler.handle(&task).await {
                Ok(()) => {
                    self.scheduler.complete(task.uuid).await?;
                    report.completed += 1;

                    info!(task = %task.uuid, kind = task.payload.kind(), "task completed");
                }
                Err(failure) => {
                    let attempt = task.attempts.saturating_add(1);
                    let run_at = now
                        .checked_add(retry_delay(attempt))
                        .unwrap_or(Timestamp::MAX);

                    error!(
                        task = %task.uuid,
                        kind = task.payload.kind(),
                        attempt,
                        error = %failure,
                        "task failed, rescheduled"
                    );

                    self.scheduler
                        .retry_later(task.uuid, run_at, failure.0)
                        .await?;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

impl Debug for TaskRunner {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TaskRunner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};
    use testresult::TestResult;

    use crate::tasks::{MockTaskScheduler, TaskPayload, TaskUuid};

    use super::*;

    fn task(attempts: u32) -> ScheduledTask {
        ScheduledTask {
            uuid: TaskUuid::now_v7(),
            userid: 4,
            payload: TaskPayload::CreateInvoice { identifier: 12 },
            run_at: Timestamp::UNIX_EPOCH,
            attempts,
            last_error: None,
        }
    }

    #[test]
    fn retry_delay_doubles_and_is_capped() {
        assert_eq!(retry_delay(1), SignedDuration::from_secs(60));
        assert_eq!(retry_delay(2), SignedDuration::from_secs(120));
        assert_eq!(retry_delay(4), SignedDuration::from_secs(480));
        assert_eq!(retry_delay(30), SignedDuration::from_hours(24));
    }

    #[tokio::test]
    async fn successful_tasks_are_completed() -> TestResult {
        let due = task(0);
        let uuid = due.uuid;

        let mut scheduler = MockTaskScheduler::new();
        scheduler
            .expect_due()
            .returning(move |_| Ok(vec![due.clone()]));
        scheduler
            .expect_complete()
            .with(eq(uuid))
            .times(1)
            .returning(|_| Ok(()));

        let mut handler = MockTaskHandler::new();
        handler.expect_handle().returning(|_| Ok(()));

        let runner = TaskRunner::new(Arc::new(scheduler), Arc::new(handler));
        let report = runner.run_due(Timestamp::UNIX_EPOCH).await?;

        assert_eq!(report, RunReport { completed: 1, failed: 0 });

        Ok(())
    }

    #[tokio::test]
    async fn failed_tasks_keep_the_reason_and_back_off() -> TestResult {
        let due = task(2);
        let uuid = due.uuid;
        let expected_run_at = Timestamp::UNIX_EPOCH.checked_add(SignedDuration::from_secs(240))?;

        let mut scheduler = MockTaskScheduler::new();
        scheduler
            .expect_due()
            .returning(move |_| Ok(vec![due.clone()]));
        scheduler
            .expect_retry_later()
            .with(eq(uuid), eq(expected_run_at), always())
            .times(1)
            .returning(move |_, run_at, error| {
                let mut retried = task(3);
                retried.run_at = run_at;
                retried.last_error = Some(error);
                Ok(retried)
            });

        let mut handler = MockTaskHandler::new();
        handler
            .expect_handle()
            .returning(|_| Err(TaskFailure("invoice service down".to_string())));

        let runner = TaskRunner::new(Arc::new(scheduler), Arc::new(handler));
        let report = runner.run_due(Timestamp::UNIX_EPOCH).await?;

        assert_eq!(report, RunReport { completed: 0, failed: 1 });

        Ok(())
    }
}
