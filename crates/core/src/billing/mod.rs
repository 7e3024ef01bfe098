//! Staged billing arithmetic and the invoice-generation gate. Everything
//! here is pure; the persistence engine supplies a consistent snapshot and
//! applies the resulting decision inside one transaction.

pub mod status;

use rust_decimal::Decimal;

use crate::domain::contract::{Contract, PaymentSchedule};
use crate::domain::invoice::{Invoice, ReservationFee};
use crate::errors::DomainError;

/// What is still owed once a paid reservation fee is deducted. An unpaid
/// fee deducts nothing; a fee larger than the price clamps to zero.
pub fn remaining_payable(contract_price: Decimal, fee: Option<&ReservationFee>) -> Decimal {
    match fee {
        Some(fee) if fee.paid => (contract_price - fee.amount).max(Decimal::ZERO),
        _ => contract_price,
    }
}

/// Amount billed for one tranche of the schedule.
pub fn step_amount(remaining: Decimal, percentage: Decimal) -> Decimal {
    remaining * percentage / Decimal::ONE_HUNDRED
}

/// Outcome of the generation gate: either the step was already issued (the
/// caller returns that invoice untouched) or a fresh invoice may be cut for
/// the named tranche.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationDecision<'a> {
    AlreadyIssued(&'a Invoice),
    Issue { label: String, percentage: Decimal },
}

/// Read-only snapshot the gate judges against.
#[derive(Clone, Copy, Debug)]
pub struct GenerationContext<'a> {
    pub contract: Option<&'a Contract>,
    pub has_contract_sheet: bool,
    pub schedule: Option<&'a PaymentSchedule>,
    pub invoices: &'a [Invoice],
    pub has_certificate: bool,
}

/// Preconditions for generating the invoice of step `step`, checked in a
/// fixed order so each failure mode is distinct and stable.
pub fn plan_invoice<'a>(
    step: u32,
    ctx: GenerationContext<'a>,
) -> Result<GenerationDecision<'a>, DomainError> {
    if !ctx.has_contract_sheet {
        return Err(DomainError::missing("contract cost sheet"));
    }
    let contract = ctx.contract.ok_or_else(|| DomainError::missing("contract"))?;
    if contract.schedule_id.is_none() {
        return Err(DomainError::missing("payment schedule on contract"));
    }
    let schedule = ctx.schedule.ok_or_else(|| DomainError::missing("payment schedule"))?;

    let last = schedule.last_step_number();
    if step == 0 || step > last {
        return Err(DomainError::ValidationError {
            field: "step",
            reason: format!("step {step} is outside the schedule (1..={last})"),
        });
    }

    if let Some(existing) = ctx.invoices.iter().find(|invoice| invoice.step_number == step) {
        return Ok(GenerationDecision::AlreadyIssued(existing));
    }

    for earlier in 1..step {
        let paid = ctx
            .invoices
            .iter()
            .any(|invoice| invoice.step_number == earlier && invoice.is_paid());
        if !paid {
            return Err(DomainError::missing(format!(
                "step {earlier} must be paid before step {step}"
            )));
        }
    }

    if step == last && !ctx.has_certificate {
        return Err(DomainError::missing("completion certificate for the final step"));
    }

    let tranche = schedule
        .step(step)
        .ok_or_else(|| DomainError::NotFound { entity: "schedule step", id: step.to_string() })?;
    Ok(GenerationDecision::Issue { label: tranche.label.clone(), percentage: tranche.percentage })
}

/// Settlement gate: the final step may only be settled once the certificate
/// photo (the document, not the boolean flag) is on file.
pub fn ensure_settleable(
    invoice: &Invoice,
    last_step: u32,
    certificate_photo: Option<&str>,
) -> Result<(), DomainError> {
    if invoice.step_number == last_step && certificate_photo.is_none() {
        return Err(DomainError::invalid_state(
            "final step cannot be settled without a certificate photo",
        ));
    }
    Ok(())
}

/// Deletion gate: only pending invoices may be removed.
pub fn ensure_deletable(invoice: &Invoice) -> Result<(), DomainError> {
    if invoice.is_paid() {
        return Err(DomainError::invalid_state("paid invoices cannot be deleted"));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::domain::catalog::WorkItemId;
    use crate::domain::contract::{
        Contract, ContractId, ContractState, PaymentSchedule, ScheduleId, ScheduleStep,
    };
    use crate::domain::invoice::{
        Invoice, InvoiceId, InvoiceNumber, InvoiceStatus, ReservationFee,
    };
    use crate::errors::DomainError;

    use super::{
        ensure_deletable, ensure_settleable, plan_invoice, remaining_payable, step_amount,
        GenerationContext, GenerationDecision,
    };

    pub(crate) fn schedule() -> PaymentSchedule {
        PaymentSchedule {
            id: ScheduleId("SCH-1".to_string()),
            code: "3T-303040".to_string(),
            name: "Three tranches".to_string(),
            steps: vec![
                ScheduleStep { number: 1, label: "Down payment".to_string(), percentage: dec!(30) },
                ScheduleStep { number: 2, label: "Progress".to_string(), percentage: dec!(30) },
                ScheduleStep { number: 3, label: "Handover".to_string(), percentage: dec!(40) },
            ],
        }
    }

    pub(crate) fn contract() -> Contract {
        let now = Utc::now();
        Contract {
            id: ContractId("CT-1".to_string()),
            work_item_id: WorkItemId("WI-1".to_string()),
            state: ContractState::Completed,
            price: Some(dec!(1_000_000)),
            duration_days: Some(45),
            schedule_id: Some(ScheduleId("SCH-1".to_string())),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn invoice(step: u32, status: InvoiceStatus) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: InvoiceId(format!("IV-{step}")),
            work_item_id: WorkItemId("WI-1".to_string()),
            step_number: step,
            number: InvoiceNumber { year: 2026, month: 8, sequence: step },
            label: format!("Step {step}"),
            percentage: dec!(30),
            amount: dec!(300_000),
            status,
            proof_ref: None,
            paid_at: None,
            notified: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn ctx<'a>(
        contract: &'a Contract,
        schedule: &'a PaymentSchedule,
        invoices: &'a [Invoice],
        has_certificate: bool,
    ) -> GenerationContext<'a> {
        GenerationContext {
            contract: Some(contract),
            has_contract_sheet: true,
            schedule: Some(schedule),
            invoices,
            has_certificate,
        }
    }

    #[test]
    fn unpaid_fee_deducts_nothing() {
        let fee = ReservationFee { amount: dec!(100_000), paid: false };
        assert_eq!(remaining_payable(dec!(1_000_000), Some(&fee)), dec!(1_000_000));
    }

    #[test]
    fn paid_fee_deducts_and_clamps_at_zero() {
        let fee = ReservationFee { amount: dec!(100_000), paid: true };
        assert_eq!(remaining_payable(dec!(1_000_000), Some(&fee)), dec!(900_000));

        let oversize = ReservationFee { amount: dec!(2_000_000), paid: true };
        assert_eq!(remaining_payable(dec!(1_000_000), Some(&oversize)), Decimal::ZERO);
    }

    #[test]
    fn step_amounts_split_the_remaining_payable() {
        assert_eq!(step_amount(dec!(1_000_000), dec!(30)), dec!(300_000));
        assert_eq!(step_amount(dec!(1_000_000), dec!(40)), dec!(400_000));
    }

    #[test]
    fn missing_sheet_fails_before_anything_else() {
        let contract = contract();
        let schedule = schedule();
        let mut gate = ctx(&contract, &schedule, &[], false);
        gate.has_contract_sheet = false;

        // Even an absurd step number reports the missing sheet first.
        let error = plan_invoice(99, gate).expect_err("no sheet");
        assert!(matches!(error, DomainError::MissingPrerequisite { .. }));
    }

    #[test]
    fn contract_without_schedule_is_a_missing_prerequisite() {
        let mut contract = contract();
        contract.schedule_id = None;
        let schedule = schedule();

        let error = plan_invoice(1, ctx(&contract, &schedule, &[], false)).expect_err("no schedule");
        assert!(matches!(error, DomainError::MissingPrerequisite { .. }));
    }

    #[test]
    fn step_beyond_schedule_is_a_validation_error() {
        let contract = contract();
        let schedule = schedule();

        let error = plan_invoice(4, ctx(&contract, &schedule, &[], true)).expect_err("step 4 of 3");
        assert!(matches!(error, DomainError::ValidationError { field: "step", .. }));
    }

    #[test]
    fn existing_invoice_is_returned_not_rejected() {
        let contract = contract();
        let schedule = schedule();
        let invoices = vec![invoice(1, InvoiceStatus::Pending)];

        let decision =
            plan_invoice(1, ctx(&contract, &schedule, &invoices, false)).expect("idempotent");
        assert!(matches!(decision, GenerationDecision::AlreadyIssued(existing) if existing.step_number == 1));
    }

    #[test]
    fn step_two_before_step_one_paid_is_rejected() {
        let contract = contract();
        let schedule = schedule();

        let error = plan_invoice(2, ctx(&contract, &schedule, &[], false)).expect_err("out of order");
        assert!(matches!(error, DomainError::MissingPrerequisite { .. }));

        let pending = vec![invoice(1, InvoiceStatus::Pending)];
        let error = plan_invoice(2, ctx(&contract, &schedule, &pending, false))
            .expect_err("pending is not paid");
        assert!(matches!(error, DomainError::MissingPrerequisite { .. }));
    }

    #[test]
    fn final_step_requires_the_certificate_flag() {
        let contract = contract();
        let schedule = schedule();
        let invoices = vec![invoice(1, InvoiceStatus::Paid), invoice(2, InvoiceStatus::Paid)];

        let error = plan_invoice(3, ctx(&contract, &schedule, &invoices, false))
            .expect_err("certificate missing");
        assert!(matches!(error, DomainError::MissingPrerequisite { .. }));

        let decision =
            plan_invoice(3, ctx(&contract, &schedule, &invoices, true)).expect("certified");
        assert!(matches!(
            decision,
            GenerationDecision::Issue { ref label, percentage } if label == "Handover" && percentage == dec!(40)
        ));
    }

    #[test]
    fn final_step_settlement_needs_the_photo_document() {
        let final_invoice = invoice(3, InvoiceStatus::Pending);

        let error = ensure_settleable(&final_invoice, 3, None).expect_err("photo missing");
        assert!(matches!(error, DomainError::InvalidState { .. }));

        ensure_settleable(&final_invoice, 3, Some("photos/bast-wi1.jpg")).expect("photo on file");
        ensure_settleable(&invoice(1, InvoiceStatus::Pending), 3, None)
            .expect("earlier steps never need the photo");
    }

    #[test]
    fn only_pending_invoices_can_be_deleted() {
        ensure_deletable(&invoice(1, InvoiceStatus::Pending)).expect("pending deletes");

        let error = ensure_deletable(&invoice(1, InvoiceStatus::Paid)).expect_err("paid blocks");
        assert!(matches!(error, DomainError::InvalidState { .. }));
    }
}
