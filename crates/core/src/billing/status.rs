//! Per-step status derivation and the payment summary. Pure functions of a
//! single consistent snapshot of the invoice set, so a reader can never see
//! a step as both available and already invoiced.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::billing::{remaining_payable, step_amount};
use crate::domain::catalog::WorkItemId;
use crate::domain::contract::PaymentSchedule;
use crate::domain::invoice::{Invoice, InvoiceId, ReservationFee};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Paid,
    Pending,
    Available,
    WaitingCertificate,
    Locked,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Pending => "pending",
            Self::Available => "available",
            Self::WaitingCertificate => "waiting_certificate",
            Self::Locked => "locked",
        }
    }
}

/// One tranche as rendered to staff and customers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepView {
    pub number: u32,
    pub label: String,
    pub percentage: Decimal,
    pub amount: Decimal,
    pub status: StepStatus,
    pub invoice: Option<InvoiceId>,
}

/// Aggregated billing position for one work item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub work_item_id: WorkItemId,
    pub contract_price: Decimal,
    pub reservation_fee: Option<ReservationFee>,
    pub remaining_payable: Decimal,
    pub total_invoiced: Decimal,
    pub total_paid: Decimal,
    pub outstanding: Decimal,
    pub steps: Vec<StepView>,
}

fn paid(invoices: &[Invoice], step: u32) -> bool {
    invoices.iter().any(|invoice| invoice.step_number == step && invoice.is_paid())
}

/// Derives the status of every schedule step from the invoice snapshot, the
/// unlock cursor, and the certificate flag.
pub fn derive_step_views(
    schedule: &PaymentSchedule,
    invoices: &[Invoice],
    unlocked_step: u32,
    has_certificate: bool,
    remaining: Decimal,
) -> Vec<StepView> {
    let last = schedule.last_step_number();

    schedule
        .steps
        .iter()
        .map(|tranche| {
            let existing =
                invoices.iter().find(|invoice| invoice.step_number == tranche.number);

            let status = match existing {
                Some(invoice) if invoice.is_paid() => StepStatus::Paid,
                Some(_) => StepStatus::Pending,
                None if tranche.number == last => {
                    let earlier_paid = (1..last).all(|step| paid(invoices, step));
                    if has_certificate && earlier_paid {
                        StepStatus::Available
                    } else if !has_certificate {
                        StepStatus::WaitingCertificate
                    } else {
                        StepStatus::Locked
                    }
                }
                None => {
                    let predecessor_paid =
                        tranche.number == 1 || paid(invoices, tranche.number - 1);
                    if tranche.number <= unlocked_step && predecessor_paid {
                        StepStatus::Available
                    } else {
                        StepStatus::Locked
                    }
                }
            };

            StepView {
                number: tranche.number,
                label: tranche.label.clone(),
                percentage: tranche.percentage,
                amount: existing
                    .map(|invoice| invoice.amount)
                    .unwrap_or_else(|| step_amount(remaining, tranche.percentage)),
                status,
                invoice: existing.map(|invoice| invoice.id.clone()),
            }
        })
        .collect()
}

/// Full billing position: remaining payable, per-step views, and paid/unpaid
/// totals over the issued invoices.
pub fn summarize(
    work_item_id: WorkItemId,
    contract_price: Decimal,
    fee: Option<ReservationFee>,
    schedule: &PaymentSchedule,
    invoices: &[Invoice],
    unlocked_step: u32,
    has_certificate: bool,
) -> PaymentSummary {
    let remaining = remaining_payable(contract_price, fee.as_ref());
    let steps = derive_step_views(schedule, invoices, unlocked_step, has_certificate, remaining);

    let total_invoiced: Decimal = invoices.iter().map(|invoice| invoice.amount).sum();
    let total_paid: Decimal =
        invoices.iter().filter(|invoice| invoice.is_paid()).map(|invoice| invoice.amount).sum();

    PaymentSummary {
        work_item_id,
        contract_price,
        reservation_fee: fee,
        remaining_payable: remaining,
        total_invoiced,
        total_paid,
        outstanding: remaining - total_paid,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::billing::tests::{invoice, schedule};
    use crate::domain::catalog::WorkItemId;
    use crate::domain::invoice::{InvoiceStatus, ReservationFee};

    use super::{derive_step_views, summarize, StepStatus};

    #[test]
    fn fresh_schedule_unlocks_only_step_one() {
        let views = derive_step_views(&schedule(), &[], 1, false, dec!(1_000_000));

        assert_eq!(views[0].status, StepStatus::Available);
        assert_eq!(views[1].status, StepStatus::Locked);
        assert_eq!(views[2].status, StepStatus::WaitingCertificate);
        assert_eq!(views[0].amount, dec!(300_000));
        assert_eq!(views[2].amount, dec!(400_000));
    }

    #[test]
    fn issued_invoices_carry_their_own_status_and_amount() {
        let invoices = vec![invoice(1, InvoiceStatus::Paid), invoice(2, InvoiceStatus::Pending)];
        let views = derive_step_views(&schedule(), &invoices, 2, false, dec!(1_000_000));

        assert_eq!(views[0].status, StepStatus::Paid);
        assert_eq!(views[1].status, StepStatus::Pending);
        // Amount comes off the issued invoice, not recomputed.
        assert_eq!(views[1].amount, dec!(300_000));
        assert!(views[1].invoice.is_some());
    }

    #[test]
    fn final_step_waits_for_certificate_then_for_earlier_payments() {
        let paid_one = vec![invoice(1, InvoiceStatus::Paid)];
        let views = derive_step_views(&schedule(), &paid_one, 2, true, dec!(1_000_000));
        // Certificate present but step 2 unpaid: locked, not waiting.
        assert_eq!(views[2].status, StepStatus::Locked);

        let all_paid = vec![invoice(1, InvoiceStatus::Paid), invoice(2, InvoiceStatus::Paid)];
        let views = derive_step_views(&schedule(), &all_paid, 3, true, dec!(1_000_000));
        assert_eq!(views[2].status, StepStatus::Available);
    }

    #[test]
    fn unlock_cursor_alone_does_not_open_a_step_with_unpaid_predecessor() {
        let pending = vec![invoice(1, InvoiceStatus::Pending)];
        let views = derive_step_views(&schedule(), &pending, 2, false, dec!(1_000_000));

        assert_eq!(views[1].status, StepStatus::Locked);
    }

    #[test]
    fn summary_totals_and_outstanding() {
        let invoices = vec![invoice(1, InvoiceStatus::Paid), invoice(2, InvoiceStatus::Pending)];
        let fee = ReservationFee { amount: dec!(100_000), paid: true };

        let summary = summarize(
            WorkItemId("WI-1".to_string()),
            dec!(1_000_000),
            Some(fee),
            &schedule(),
            &invoices,
            2,
            false,
        );

        assert_eq!(summary.remaining_payable, dec!(900_000));
        assert_eq!(summary.total_invoiced, dec!(600_000));
        assert_eq!(summary.total_paid, dec!(300_000));
        assert_eq!(summary.outstanding, dec!(600_000));
    }

    #[test]
    fn step_amounts_sum_to_remaining_when_percentages_sum_to_one_hundred() {
        let views = derive_step_views(&schedule(), &[], 1, false, dec!(1_000_000));
        let total: Decimal = views.iter().map(|view| view.amount).sum();
        assert_eq!(total, dec!(1_000_000));
    }

    #[test]
    fn permissive_schedule_sums_do_not_reconcile_and_that_is_accepted() {
        let mut lopsided = schedule();
        lopsided.steps[2].percentage = dec!(50);

        let views = derive_step_views(&lopsided, &[], 1, false, dec!(1_000_000));
        let total: Decimal = views.iter().map(|view| view.amount).sum();
        assert_eq!(total, dec!(1_100_000));
    }
}
