//! Tasks stored in `PostgreSQL`.

use async_trait::async_trait;
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, postgres::PgRow, query, query_as, types::Json};
use uuid::Uuid;

use crate::{
    database::{Db, from_db_id, to_db_id},
    domain::history::repository::decode_error,
    tasks::{ScheduledTask, TaskError, TaskPayload, TaskScheduler, TaskUuid},
};

const RESCHEDULE_OR_QUEUE_TASK_SQL: &str = include_str!("sql/reschedule_or_queue_task.sql");
const LIST_DUE_TASKS_SQL: &str = include_str!("sql/list_due_tasks.sql");
const DELETE_TASK_SQL: &str = include_str!("sql/delete_task.sql");
const RETRY_TASK_SQL: &str = include_str!("sql/retry_task.sql");
const LIST_TASKS_FOR_USER_SQL: &str = include_str!("sql/list_tasks_for_user.sql");

#[derive(Debug, Clone)]
pub struct PgTaskScheduler {
    db: Db,
}

impl PgTaskScheduler {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskScheduler for PgTaskScheduler {
    async fn reschedule_or_queue(
        &self,
        userid: u64,
        payload: TaskPayload,
        run_at: Timestamp,
    ) -> Result<ScheduledTask, TaskError> {
        let mut tx = self.db.begin().await?;

        let task = query_as::<Postgres, ScheduledTask>(RESCHEDULE_OR_QUEUE_TASK_SQL)
            .bind(TaskUuid::now_v7().into_uuid())
            .bind(payload.kind())
            .bind(to_db_id(userid)?)
            .bind(Json(&payload))
            .bind(SqlxTimestamp::from(run_at))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(task)
    }

    async fn due(&self, now: Timestamp) -> Result<Vec<ScheduledTask>, TaskError> {
        let mut tx = self.db.begin().await?;

        let tasks = query_as::<Postgres, ScheduledTask>(LIST_DUE_TASKS_SQL)
            .bind(SqlxTimestamp::from(now))
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(tasks)
    }

    async fn complete(&self, uuid: TaskUuid) -> Result<(), TaskError> {
        let mut tx = self.db.begin().await?;

        let result = query(DELETE_TASK_SQL)
            .bind(uuid.into_uuid())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TaskError::NotFound);
        }

        tx.commit().await?;

        Ok(())
    }

    async fn retry_later(
        &self,
        uuid: TaskUuid,
        run_at: Timestamp,
        error: String,
    ) -> Result<ScheduledTask, TaskError> {
        let mut tx = self.db.begin().await?;

        let task = query_as::<Postgres, ScheduledTask>(RETRY_TASK_SQL)
            .bind(uuid.into_uuid())
            .bind(SqlxTimestamp::from(run_at))
            .bind(error)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(TaskError::NotFound)?;

        tx.commit().await?;

        Ok(task)
    }

    async fn pending(&self, userid: u64) -> Result<Vec<ScheduledTask>, TaskError> {
        let mut tx = self.db.begin().await?;

        let tasks = query_as::<Postgres, ScheduledTask>(LIST_TASKS_FOR_USER_SQL)
            .bind(to_db_id(userid)?)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(tasks)
    }
}

impl<'r> FromRow<'r, PgRow> for ScheduledTask {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let attempts = u32::try_from(row.try_get::<i32, _>("attempts")?)
            .map_err(|error| decode_error("attempts", error))?;

        Ok(Self {
            uuid: TaskUuid::from_uuid(row.try_get::<Uuid, _>("uuid")?),
            userid: from_db_id(row, "userid")?,
            payload: row.try_get::<Json<TaskPayload>, _>("payload")?.0,
            run_at: row.try_get::<SqlxTimestamp, _>("run_at")?.to_jiff(),
            attempts,
            last_error: row.try_get("last_error")?,
        })
    }
}
