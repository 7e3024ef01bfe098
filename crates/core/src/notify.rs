//! Downstream notification seam. The billing engine fires these at most
//! once per work item; delivery transports live behind the trait.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::domain::catalog::WorkItemId;
use crate::domain::invoice::InvoiceId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A customer asked for a binding contract offer.
    ContractRequested { work_item_id: WorkItemId },
    /// The first tranche was settled; downstream scheduling may begin.
    FirstTrancheSettled { work_item_id: WorkItemId, invoice_id: InvoiceId },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Drops every event. Used when notifications are disabled in config.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: NotificationEvent) {}
}

/// Logs the event at info level. The default transport when no webhook is
/// configured but operators still want visibility.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: NotificationEvent) {
        match &event {
            NotificationEvent::ContractRequested { work_item_id } => {
                tracing::info!(work_item_id = %work_item_id.0, "contract requested");
            }
            NotificationEvent::FirstTrancheSettled { work_item_id, invoice_id } => {
                tracing::info!(
                    work_item_id = %work_item_id.0,
                    invoice_id = %invoice_id.0,
                    "first tranche settled"
                );
            }
        }
    }
}

/// Test double that records every delivered event.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: NotificationEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
