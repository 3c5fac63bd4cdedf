//! Deferred tasks
//!
//! Work that runs after the request that caused it: dropping cart items when their reservation
//! runs out and creating invoices. Tasks are keyed by `(user, kind, payload)`; scheduling the
//! same task again moves it instead of queueing a duplicate.

use std::fmt::{Display, Formatter, Result as FmtResult};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod handler;
mod postgres;
mod runner;

pub use handler::ShopTaskHandler;
pub use postgres::PgTaskScheduler;
pub use runner::{MockTaskHandler, RunReport, TaskFailure, TaskHandler, TaskRunner, retry_delay};

/// Time ordered id of a [`ScheduledTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskUuid(Uuid);

impl TaskUuid {
    #[must_use]
    pub fn now_v7() -> Self {
        Self(Uuid::now_v7())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Display for TaskUuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

/// What a task does, with everything needed to do it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Remove an item from the user's cart once its reservation expired.
    DeleteItem {
        component: String,
        area: String,
        item_id: u64,
    },

    /// Create the invoice of a paid checkout.
    CreateInvoice { identifier: u64 },
}

impl TaskPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeleteItem { .. } => "delete_item",
            Self::CreateInvoice { .. } => "create_invoice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub uuid: TaskUuid,
    pub userid: u64,
    pub payload: TaskPayload,
    pub run_at: Timestamp,
    pub attempts: u32,

    /// Reason the previous attempt failed.
    pub last_error: Option<String>,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found")]
    NotFound,

    #[error("invalid id value")]
    InvalidId(#[from] std::num::TryFromIntError),

    #[error("task payload could not be encoded")]
    Payload(#[from] serde_json::Error),

    #[error("storage error")]
    Sql(#[from] sqlx::Error),
}

#[automock]
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Queue the task, or move an identical queued task to `run_at`.
    async fn reschedule_or_queue(
        &self,
        userid: u64,
        payload: TaskPayload,
        run_at: Timestamp,
    ) -> Result<ScheduledTask, TaskError>;

    /// Tasks whose time has come, oldest first.
    async fn due(&self, now: Timestamp) -> Result<Vec<ScheduledTask>, TaskError>;

    /// Remove a finished task.
    async fn complete(&self, uuid: TaskUuid) -> Result<(), TaskError>;

    /// Record a failed attempt and move the task to `run_at`.
    async fn retry_later(
        &self,
        uuid: TaskUuid,
        run_at: Timestamp,
        error: String,
    ) -> Result<ScheduledTask, TaskError>;

    /// Every queued task of a user.
    async fn pending(&self, userid: u64) -> Result<Vec<ScheduledTask>, TaskError>;
}
