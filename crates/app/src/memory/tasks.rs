use async_trait::async_trait;
use jiff::Timestamp;

use crate::{
    memory::MemoryStore,
    tasks::{ScheduledTask, TaskError, TaskPayload, TaskScheduler, TaskUuid},
};

#[async_trait]
impl TaskScheduler for MemoryStore {
    async fn reschedule_or_queue(
        &self,
        userid: u64,
        payload: TaskPayload,
        run_at: Timestamp,
    ) -> Result<ScheduledTask, TaskError> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state
            .tasks
            .iter_mut()
            .find(|task| task.userid == userid && task.payload == payload)
        {
            existing.run_at = run_at;

            return Ok(existing.clone());
        }

        let task = ScheduledTask {
            uuid: TaskUuid::now_v7(),
            userid,
            payload,
            run_at,
            attempts: 0,
            last_error: None,
        };

        state.tasks.push(task.clone());

        Ok(task)
    }

    async fn due(&self, now: Timestamp) -> Result<Vec<ScheduledTask>, TaskError> {
        let mut due: Vec<ScheduledTask> = self
            .state
            .lock()
            .await
            .tasks
            .iter()
            .filter(|task| task.run_at <= now)
            .cloned()
            .collect();

        due.sort_by_key(|task| (task.run_at, task.uuid));

        Ok(due)
    }

    async fn complete(&self, uuid: TaskUuid) -> Result<(), TaskError> {
        let mut state = self.state.lock().await;
        let before = state.tasks.len();

        state.tasks.retain(|task| task.uuid != uuid);

        if state.tasks.len() == before {
            return Err(TaskError::NotFound);
        }

        Ok(())
    }

    async fn retry_later(
        &self,
        uuid: TaskUuid,
        run_at: Timestamp,
        error: String,
    ) -> Result<ScheduledTask, TaskError> {
        let mut state = self.state.lock().await;

        let task = state
            .tasks
            .iter_mut()
            .find(|task| task.uuid == uuid)
            .ok_or(TaskError::NotFound)?;

        task.run_at = run_at;
        task.attempts = task.attempts.saturating_add(1);
        task.last_error = Some(error);

        Ok(task.clone())
    }

    async fn pending(&self, userid: u64) -> Result<Vec<ScheduledTask>, TaskError> {
        let mut pending: Vec<ScheduledTask> = self
            .state
            .lock()
            .await
            .tasks
            .iter()
            .filter(|task| task.userid == userid)
            .cloned()
            .collect();

        pending.sort_by_key(|task| (task.run_at, task.uuid));

        Ok(pending)
    }
}
