//! Event bus
//!
//! Domain events are fire-and-forget: observers run in registration order and an observer
//! failure is logged, never handed back to the code that triggered the event.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use shopcart::events::DomainEvent;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

#[derive(Debug, Error)]
#[error("event observer {observer} failed")]
pub struct ObserverError {
    pub observer: &'static str,

    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

#[automock]
#[async_trait]
pub trait EventObserver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn observe(&self, event: &DomainEvent) -> Result<(), ObserverError>;
}

#[derive(Clone, Default)]
pub struct EventBus {
    observers: Vec<Arc<dyn EventObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub async fn trigger(&self, event: DomainEvent) {
        for observer in &self.observers {
            if let Err(error) = observer.observe(&event).await {
                error!(
                    event = event.name(),
                    observer = observer.name(),
                    error = %error.source,
                    "event observer failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.observers.iter().map(|observer| observer.name()))
            .finish()
    }
}

/// Logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventObserver;

#[async_trait]
impl EventObserver for TracingEventObserver {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn observe(&self, event: &DomainEvent) -> Result<(), ObserverError> {
        info!(
            event = event.name(),
            userid = event.userid,
            relateduserid = event.relateduserid,
            item_id = event.other.item_id,
            component = event.other.component.as_deref(),
            identifier = event.other.identifier,
            "domain event"
        );

        Ok(())
    }
}

/// Keeps every event it sees.
#[derive(Debug, Default)]
pub struct RecordingEventObserver {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    /// Names of the recorded events in order.
    pub async fn names(&self) -> Vec<&'static str> {
        self.events.lock().await.iter().map(DomainEvent::name).collect()
    }
}

#[async_trait]
impl EventObserver for RecordingEventObserver {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn observe(&self, event: &DomainEvent) -> Result<(), ObserverError> {
        self.events.lock().await.push(event.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[tokio::test]
    async fn failing_observer_does_not_stop_the_others() {
        let mut failing = MockEventObserver::new();
        failing.expect_name().return_const("failing");
        failing.expect_observe().times(1).returning(|_| {
            Err(ObserverError {
                observer: "failing",
                source: Box::new(io::Error::other("down")),
            })
        });

        let recording = Arc::new(RecordingEventObserver::new());
        let bus = EventBus::new()
            .with_observer(Arc::new(failing))
            .with_observer(recording.clone());

        bus.trigger(DomainEvent::checkout_completed(1, 1, 9)).await;

        assert_eq!(recording.names().await, vec!["checkout_completed"]);
    }
}
