//! Domain events published by the forecast service
//!
//! Handlers subscribe to an explicitly constructed [`EventBus`]; a failing
//! handler is logged and does not stop delivery to the others.

use crate::error::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// A forecast run was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastGenerated {
    pub product_id: String,
    pub model_type: String,
    pub fitted_by: String,
    pub horizon_months: usize,
    pub records_created: usize,
}

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DomainEvent {
    ForecastGenerated(ForecastGenerated),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::ForecastGenerated(_) => "forecast_generated",
        }
    }
}

/// Observer of domain events
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &DomainEvent) -> Result<()>;

    /// Whether this handler wants `event`
    fn can_handle(&self, _event: &DomainEvent) -> bool {
        true
    }

    /// Name used when reporting handler failures
    fn name(&self) -> &str {
        "handler"
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::ForecastGenerated(e) => info!(
                event = event.name(),
                product = %e.product_id,
                model = %e.model_type,
                fitted_by = %e.fitted_by,
                horizon = e.horizon_months,
                records = e.records_created,
                "Domain event"
            ),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}

/// Publisher that fans events out to subscribed handlers
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus with a [`LoggingHandler`] subscribed
    pub fn with_logging() -> Self {
        let bus = Self::new();
        bus.subscribe(Arc::new(LoggingHandler));
        bus
    }

    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().push(handler);
    }

    /// Remove a previously subscribed handler instance
    pub fn unsubscribe(&self, handler: &Arc<dyn EventHandler>) {
        self.handlers.write().retain(|h| !Arc::ptr_eq(h, handler));
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Deliver `event` to every interested handler
    pub fn publish(&self, event: &DomainEvent) {
        // Snapshot so handlers may subscribe or unsubscribe while running
        let handlers: Vec<Arc<dyn EventHandler>> = self.handlers.read().clone();

        for handler in handlers.iter().filter(|h| h.can_handle(event)) {
            if let Err(e) = handler.handle(event) {
                error!(handler = handler.name(), event = event.name(), error = %e, "Event handler failed");
            }
        }
    }
}
