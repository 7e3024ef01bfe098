use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::WorkItemId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// One materialized, billable instance of a payment-schedule step.
///
/// `notified` is the persisted idempotency marker for the step-1 downstream
/// kickoff; it survives regeneration so the notification fires at most once
/// per work item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub work_item_id: WorkItemId,
    pub step_number: u32,
    pub number: InvoiceNumber,
    pub label: String,
    pub percentage: Decimal,
    pub amount: Decimal,
    pub status: InvoiceStatus,
    pub proof_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }
}

/// Human-readable invoice number: `INV/<year>/<month>/<4-digit-seq>`, with
/// the sequence monotonically increasing within each year+month scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceNumber {
    pub year: i32,
    pub month: u32,
    pub sequence: u32,
}

impl InvoiceNumber {
    pub fn new(year: i32, month: u32, sequence: u32) -> Self {
        Self { year, month, sequence }
    }
}

impl std::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "INV/{}/{:02}/{:04}", self.year, self.month, self.sequence)
    }
}

/// Commitment/reservation fee paid up front; when settled it reduces the
/// payable base before staged billing starts. Managed outside this engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReservationFee {
    pub amount: Decimal,
    pub paid: bool,
}

/// Per-work-item billing progression. `unlocked_step` starts at 1 and is
/// advanced manually; the final step never goes through it (it is gated by
/// the completion certificate instead).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BillingState {
    pub work_item_id: WorkItemId,
    pub unlocked_step: u32,
}

impl BillingState {
    pub fn initial(work_item_id: WorkItemId) -> Self {
        Self { work_item_id, unlocked_step: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::{InvoiceNumber, InvoiceStatus};

    #[test]
    fn invoice_number_formats_with_zero_padding() {
        assert_eq!(InvoiceNumber::new(2026, 3, 7).to_string(), "INV/2026/03/0007");
        assert_eq!(InvoiceNumber::new(2026, 12, 1042).to_string(), "INV/2026/12/1042");
    }

    #[test]
    fn status_round_trips() {
        assert_eq!(InvoiceStatus::parse("pending"), Some(InvoiceStatus::Pending));
        assert_eq!(InvoiceStatus::parse(InvoiceStatus::Paid.as_str()), Some(InvoiceStatus::Paid));
        assert_eq!(InvoiceStatus::parse("cancelled"), None);
    }
}
