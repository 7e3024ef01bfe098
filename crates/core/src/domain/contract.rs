use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::WorkItemId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    /// Placeholder created when the contract workflow is picked up.
    Response,
    /// Price, duration, and payment schedule have all been supplied.
    Completed,
}

impl ContractState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "response" => Some(Self::Response),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One per work item. The `price` is the authoritative contract total once
/// the contract is completed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub work_item_id: WorkItemId,
    pub state: ContractState,
    pub price: Option<Decimal>,
    pub duration_days: Option<u32>,
    pub schedule_id: Option<ScheduleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    pub fn is_completed(&self) -> bool {
        self.state == ContractState::Completed
    }
}

/// One tranche of a payment schedule: a 1-based step number, a display
/// label, and its share of the remaining payable amount.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStep {
    pub number: u32,
    pub label: String,
    pub percentage: Decimal,
}

/// A named, ordered installment plan, shared across contracts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub id: ScheduleId,
    pub code: String,
    pub name: String,
    pub steps: Vec<ScheduleStep>,
}

impl PaymentSchedule {
    pub fn step(&self, number: u32) -> Option<&ScheduleStep> {
        self.steps.iter().find(|step| step.number == number)
    }

    pub fn last_step_number(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Steps are not required to sum to 100; callers may warn on mismatch.
    pub fn percentage_total(&self) -> Decimal {
        self.steps.iter().map(|step| step.percentage).sum()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{PaymentSchedule, ScheduleId, ScheduleStep};

    fn schedule(percentages: &[(u32, &str, rust_decimal::Decimal)]) -> PaymentSchedule {
        PaymentSchedule {
            id: ScheduleId("T-30-30-40".to_string()),
            code: "T3".to_string(),
            name: "Three tranches".to_string(),
            steps: percentages
                .iter()
                .map(|(number, label, percentage)| ScheduleStep {
                    number: *number,
                    label: (*label).to_string(),
                    percentage: *percentage,
                })
                .collect(),
        }
    }

    #[test]
    fn percentage_total_sums_all_steps() {
        let schedule = schedule(&[
            (1, "Down payment", dec!(30)),
            (2, "Progress", dec!(30)),
            (3, "Handover", dec!(40)),
        ]);
        assert_eq!(schedule.percentage_total(), dec!(100));
        assert_eq!(schedule.last_step_number(), 3);
    }

    #[test]
    fn step_lookup_is_by_number_not_index() {
        let schedule = schedule(&[(1, "DP", dec!(50)), (2, "Final", dec!(50))]);
        assert_eq!(schedule.step(2).map(|step| step.label.as_str()), Some("Final"));
        assert!(schedule.step(3).is_none());
    }
}
