//! Handler running the shop's deferred tasks.

use std::error::Error;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    cart::CartStore,
    context::ShopContext,
    tasks::{ScheduledTask, TaskFailure, TaskHandler, TaskPayload},
};

#[derive(Debug, Clone)]
pub struct ShopTaskHandler {
    context: ShopContext,
}

impl ShopTaskHandler {
    pub fn new(context: ShopContext) -> Self {
        Self { context }
    }
}

/// The error and its sources, outermost first.
fn failure(error: &(dyn Error + 'static)) -> TaskFailure {
    let mut reason = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }

    TaskFailure(reason)
}

#[async_trait]
impl TaskHandler for ShopTaskHandler {
    async fn handle(&self, task: &ScheduledTask) -> Result<(), TaskFailure> {
        match &task.payload {
            TaskPayload::DeleteItem {
                component,
                area,
                item_id,
            } => {
                let expired = CartStore::new(&self.context, task.userid)
                    .expire_item(component, area, *item_id)
                    .await
                    .map_err(|error| failure(&error))?;

                debug!(userid = task.userid, item_id, expired, "expiry task ran");
            }
            TaskPayload::CreateInvoice { identifier } => {
                let created = self
                    .context
                    .invoice_provider
                    .create_invoice(*identifier)
                    .await
                    .map_err(|error| failure(&error))?;

                debug!(identifier, created, "invoice task ran");
            }
        }

        Ok(())
    }
}
