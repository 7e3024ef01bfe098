//! Transactional operations over the cost-sheet and billing schema. Every
//! multi-row mutation runs inside one transaction; duplicate creation is
//! resolved by the schema's UNIQUE constraints rather than locks.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use fitout_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use fitout_core::billing::status::PaymentSummary;
use fitout_core::billing::{
    self, ensure_deletable, ensure_settleable, plan_invoice, GenerationContext,
    GenerationDecision,
};
use fitout_core::domain::catalog::{WorkItem, WorkItemId};
use fitout_core::domain::contract::{Contract, ContractId, ContractState, PaymentSchedule, ScheduleId};
use fitout_core::domain::cost_sheet::{
    ContractCostSheet, InternalCostSheet, ResponseStamp, ServiceCostSheet, SheetId,
    VendorCostSheet,
};
use fitout_core::domain::invoice::{
    BillingState, Invoice, InvoiceId, InvoiceNumber, InvoiceStatus,
};
use fitout_core::errors::{ApplicationError, DomainError};
use fitout_core::notify::{NotificationEvent, Notifier};
use fitout_core::pricing::internal::{build_internal_lines, LineInput};
use fitout_core::pricing::views::{
    derive_contract_sheet, derive_service_sheet, derive_vendor_sheet,
};

use crate::repositories::{
    contract as contract_sql, cost_sheet as sheet_sql, invoice as invoice_sql,
    is_unique_violation, CatalogRepository, ContractRepository, CostSheetRepository,
    InvoiceRepository, SqlCatalogRepository, SqlContractRepository, SqlCostSheetRepository,
    SqlInvoiceRepository,
};
use crate::DbPool;

/// Upper bound on monthly invoice-number allocation retries when racing
/// generators for other work items keep taking the next sequence.
const SEQUENCE_ALLOCATION_ATTEMPTS: u32 = 3;

/// Result of invoice generation: a freshly cut invoice, or the one that was
/// already there (informational, not an error).
#[derive(Clone, Debug, PartialEq)]
pub enum InvoiceOutcome {
    Created(Invoice),
    Existing(Invoice),
}

impl InvoiceOutcome {
    pub fn invoice(&self) -> &Invoice {
        match self {
            Self::Created(invoice) | Self::Existing(invoice) => invoice,
        }
    }
}

pub struct BillingEngine {
    pool: DbPool,
    catalog: SqlCatalogRepository,
    sheets: SqlCostSheetRepository,
    contracts: SqlContractRepository,
    invoices: SqlInvoiceRepository,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
}

impl BillingEngine {
    pub fn new(pool: DbPool, audit: Arc<dyn AuditSink>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            catalog: SqlCatalogRepository::new(pool.clone()),
            sheets: SqlCostSheetRepository::new(pool.clone()),
            contracts: SqlContractRepository::new(pool.clone()),
            invoices: SqlInvoiceRepository::new(pool.clone()),
            pool,
            audit,
            notifier,
        }
    }

    /// Creates the internal cost sheet for a work item. Exactly one sheet
    /// may exist per work item; a concurrent duplicate attempt loses on the
    /// schema constraint and surfaces as `AlreadyExists`.
    pub async fn create_internal_sheet(
        &self,
        work_item_id: &WorkItemId,
        actor: &str,
        inputs: &[LineInput],
        now: DateTime<Utc>,
    ) -> Result<InternalCostSheet, ApplicationError> {
        let work_item = self.require_work_item(work_item_id).await?;
        let lines = build_internal_lines(&work_item, inputs)?;

        let sheet = InternalCostSheet {
            id: SheetId(Uuid::new_v4().to_string()),
            work_item_id: work_item_id.clone(),
            response: ResponseStamp::new(actor, now),
            submitted: None,
            lines,
        };

        let mut tx = self.pool.begin().await.map_err(persistence)?;
        sheet_sql::insert_internal_header(&mut tx, &sheet).await.map_err(|error| {
            if is_unique_violation(&error) {
                ApplicationError::Domain(DomainError::AlreadyExists {
                    entity: "internal cost sheet",
                    id: work_item_id.0.clone(),
                })
            } else {
                persistence(error)
            }
        })?;
        sheet_sql::replace_internal_lines(&mut tx, &sheet.id, &sheet.lines)
            .await
            .map_err(persistence)?;
        tx.commit().await.map_err(persistence)?;

        self.emit(
            Some(work_item_id),
            "sheet.internal_created",
            AuditCategory::Sheet,
            actor,
            AuditOutcome::Success,
        );
        Ok(sheet)
    }

    /// Re-saves the full line set from the current catalog and operator
    /// input. The sheet identity and submission stamp are preserved.
    pub async fn update_internal_sheet(
        &self,
        work_item_id: &WorkItemId,
        actor: &str,
        inputs: &[LineInput],
        now: DateTime<Utc>,
    ) -> Result<InternalCostSheet, ApplicationError> {
        let work_item = self.require_work_item(work_item_id).await?;
        let mut sheet = self.require_internal(work_item_id).await?;
        sheet.lines = build_internal_lines(&work_item, inputs)?;
        sheet.response = ResponseStamp::new(actor, now);

        let mut tx = self.pool.begin().await.map_err(persistence)?;
        sheet_sql::update_internal_response(&mut tx, &sheet.id, &sheet.response)
            .await
            .map_err(persistence)?;
        sheet_sql::replace_internal_lines(&mut tx, &sheet.id, &sheet.lines)
            .await
            .map_err(persistence)?;
        tx.commit().await.map_err(persistence)?;

        self.emit(
            Some(work_item_id),
            "sheet.internal_updated",
            AuditCategory::Sheet,
            actor,
            AuditOutcome::Success,
        );
        Ok(sheet)
    }

    /// Marks the internal sheet as submitted and announces the contract
    /// request downstream. All three derived views must exist first; a
    /// second submission returns the sheet unchanged and announces nothing.
    pub async fn submit_internal_sheet(
        &self,
        work_item_id: &WorkItemId,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<InternalCostSheet, ApplicationError> {
        let mut sheet = self.require_internal(work_item_id).await?;
        if sheet.is_submitted() {
            return Ok(sheet);
        }

        if self.sheets.find_contract(work_item_id).await?.is_none() {
            return Err(DomainError::missing("contract cost sheet").into());
        }
        if self.sheets.find_vendor(work_item_id).await?.is_none() {
            return Err(DomainError::missing("vendor cost sheet").into());
        }
        if self.sheets.find_service(work_item_id).await?.is_none() {
            return Err(DomainError::missing("service cost sheet").into());
        }

        let stamp = ResponseStamp::new(actor, now);
        let mut conn = self.pool.acquire().await.map_err(persistence)?;
        sheet_sql::mark_internal_submitted(&mut conn, &sheet.id, &stamp)
            .await
            .map_err(persistence)?;
        sheet.submitted = Some(stamp);

        self.notifier.notify(NotificationEvent::ContractRequested {
            work_item_id: work_item_id.clone(),
        });
        self.emit(
            Some(work_item_id),
            "sheet.internal_submitted",
            AuditCategory::Sheet,
            actor,
            AuditOutcome::Success,
        );
        Ok(sheet)
    }

    /// Derives (or re-derives) the customer-facing contract view from the
    /// current internal sheet. Replacement is atomic: a failed derivation
    /// leaves the previous view intact.
    pub async fn generate_contract_sheet(
        &self,
        work_item_id: &WorkItemId,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ContractCostSheet, ApplicationError> {
        let internal = self.require_internal(work_item_id).await?;
        let work_item = self.require_work_item(work_item_id).await?;

        let derived = derive_contract_sheet(
            &internal,
            &work_item,
            SheetId(Uuid::new_v4().to_string()),
            ResponseStamp::new(actor, now),
        )?;

        let mut tx = self.pool.begin().await.map_err(persistence)?;
        let saved = sheet_sql::save_contract_sheet(&mut tx, derived).await.map_err(persistence)?;
        tx.commit().await.map_err(persistence)?;

        self.emit(
            Some(work_item_id),
            "sheet.contract_generated",
            AuditCategory::Sheet,
            actor,
            AuditOutcome::Success,
        );
        Ok(saved)
    }

    pub async fn generate_vendor_sheet(
        &self,
        work_item_id: &WorkItemId,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<VendorCostSheet, ApplicationError> {
        let internal = self.require_internal(work_item_id).await?;
        let derived = derive_vendor_sheet(
            &internal,
            SheetId(Uuid::new_v4().to_string()),
            ResponseStamp::new(actor, now),
        );

        let mut tx = self.pool.begin().await.map_err(persistence)?;
        let saved = sheet_sql::save_vendor_sheet(&mut tx, derived).await.map_err(persistence)?;
        tx.commit().await.map_err(persistence)?;

        self.emit(
            Some(work_item_id),
            "sheet.vendor_generated",
            AuditCategory::Sheet,
            actor,
            AuditOutcome::Success,
        );
        Ok(saved)
    }

    pub async fn generate_service_sheet(
        &self,
        work_item_id: &WorkItemId,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ServiceCostSheet, ApplicationError> {
        let internal = self.require_internal(work_item_id).await?;
        let derived = derive_service_sheet(
            &internal,
            SheetId(Uuid::new_v4().to_string()),
            ResponseStamp::new(actor, now),
        );

        let mut tx = self.pool.begin().await.map_err(persistence)?;
        let saved = sheet_sql::save_service_sheet(&mut tx, derived).await.map_err(persistence)?;
        tx.commit().await.map_err(persistence)?;

        self.emit(
            Some(work_item_id),
            "sheet.service_generated",
            AuditCategory::Sheet,
            actor,
            AuditOutcome::Success,
        );
        Ok(saved)
    }

    /// Binds price, duration, and payment schedule to the work item's
    /// contract. Re-finalizing overwrites all three.
    pub async fn finalize_contract(
        &self,
        work_item_id: &WorkItemId,
        actor: &str,
        price_override: Option<Decimal>,
        duration_days: Option<u32>,
        schedule_id: &ScheduleId,
        now: DateTime<Utc>,
    ) -> Result<Contract, ApplicationError> {
        let sheet = self
            .sheets
            .find_contract(work_item_id)
            .await?
            .ok_or_else(|| DomainError::missing("contract cost sheet"))?;
        let schedule = self
            .contracts
            .find_schedule(schedule_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "payment schedule",
                id: schedule_id.0.clone(),
            })?;

        if let Some(price) = price_override {
            if price <= Decimal::ZERO {
                return Err(DomainError::ValidationError {
                    field: "price",
                    reason: "contract price override must be positive".to_string(),
                }
                .into());
            }
        }
        let total = schedule.percentage_total();
        if total != Decimal::ONE_HUNDRED {
            warn!(
                schedule = %schedule.code,
                percentage_total = %total,
                "payment schedule percentages do not sum to 100"
            );
        }

        let price = price_override.unwrap_or_else(|| sheet.total());
        let existing = self.contracts.find_by_work_item(work_item_id).await?;
        let contract = Contract {
            id: existing
                .as_ref()
                .map(|contract| contract.id.clone())
                .unwrap_or_else(|| ContractId(Uuid::new_v4().to_string())),
            work_item_id: work_item_id.clone(),
            state: ContractState::Completed,
            price: Some(price),
            duration_days,
            schedule_id: Some(schedule_id.clone()),
            created_at: existing.as_ref().map(|contract| contract.created_at).unwrap_or(now),
            updated_at: now,
        };

        let mut tx = self.pool.begin().await.map_err(persistence)?;
        contract_sql::upsert_contract(&mut tx, &contract).await.map_err(persistence)?;
        let state = invoice_sql::load_billing_state(&mut tx, work_item_id).await?;
        if state.is_none() {
            invoice_sql::upsert_billing_state(
                &mut tx,
                &BillingState::initial(work_item_id.clone()),
            )
            .await
            .map_err(persistence)?;
        }
        tx.commit().await.map_err(persistence)?;

        self.emit(
            Some(work_item_id),
            "contract.finalized",
            AuditCategory::Contract,
            actor,
            AuditOutcome::Success,
        );
        Ok(contract)
    }

    /// Generates the invoice for one schedule step, or returns the existing
    /// one. Preconditions are checked in a fixed order; see
    /// `fitout_core::billing::plan_invoice`.
    pub async fn generate_invoice(
        &self,
        work_item_id: &WorkItemId,
        step: u32,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<InvoiceOutcome, ApplicationError> {
        let has_contract_sheet = self.sheets.find_contract(work_item_id).await?.is_some();
        let contract = self.contracts.find_by_work_item(work_item_id).await?;
        let schedule = match contract.as_ref().and_then(|contract| contract.schedule_id.clone()) {
            Some(schedule_id) => self.contracts.find_schedule(&schedule_id).await?,
            None => None,
        };
        let invoices = self.invoices.list_for_work_item(work_item_id).await?;
        let work_item = self.require_work_item(work_item_id).await?;

        let decision = plan_invoice(
            step,
            GenerationContext {
                contract: contract.as_ref(),
                has_contract_sheet,
                schedule: schedule.as_ref(),
                invoices: &invoices,
                has_certificate: work_item.certificate_issued,
            },
        )?;

        let (label, percentage) = match decision {
            GenerationDecision::AlreadyIssued(existing) => {
                return Ok(InvoiceOutcome::Existing(existing.clone()));
            }
            GenerationDecision::Issue { label, percentage } => (label, percentage),
        };

        let amount = self.step_amount_for(work_item_id, contract.as_ref(), percentage).await?;

        // Two unique constraints can trip here: (work item, step) means a
        // concurrent generator already issued this step, so its row is the
        // answer; (year, month, sequence) means a generator for a different
        // work item took the monthly number first, so the allocation is
        // simply retried.
        let mut attempts = 0;
        let invoice = loop {
            attempts += 1;
            let mut tx = self.pool.begin().await.map_err(persistence)?;
            let sequence = invoice_sql::next_sequence(&mut tx, now.year(), now.month()).await?;
            let candidate = Invoice {
                id: InvoiceId(Uuid::new_v4().to_string()),
                work_item_id: work_item_id.clone(),
                step_number: step,
                number: InvoiceNumber::new(now.year(), now.month(), sequence),
                label: label.clone(),
                percentage,
                amount,
                status: InvoiceStatus::Pending,
                proof_ref: None,
                paid_at: None,
                notified: false,
                created_at: now,
                updated_at: now,
            };

            match invoice_sql::insert_invoice(&mut tx, &candidate).await {
                Ok(()) => {
                    tx.commit().await.map_err(persistence)?;
                    break candidate;
                }
                Err(error) if is_unique_violation(&error) => {
                    drop(tx);
                    if let Some(existing) = self.invoices.find_by_step(work_item_id, step).await? {
                        return Ok(InvoiceOutcome::Existing(existing));
                    }
                    if attempts >= SEQUENCE_ALLOCATION_ATTEMPTS {
                        return Err(persistence(error));
                    }
                }
                Err(error) => return Err(persistence(error)),
            }
        };

        self.emit_with(
            Some(work_item_id),
            "billing.invoice_generated",
            AuditCategory::Billing,
            actor,
            AuditOutcome::Success,
            &[("step", step.to_string()), ("number", invoice.number.to_string())],
        );
        Ok(InvoiceOutcome::Created(invoice))
    }

    /// Records proof of payment and settles the invoice. Settling the final
    /// step requires the certificate photo document; the first successful
    /// settlement of step 1 fires the downstream kickoff exactly once.
    pub async fn settle_invoice(
        &self,
        work_item_id: &WorkItemId,
        step: u32,
        proof_ref: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Invoice, ApplicationError> {
        let mut invoice = self
            .invoices
            .find_by_step(work_item_id, step)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "invoice",
                id: format!("{}/step {step}", work_item_id.0),
            })?;
        if invoice.is_paid() {
            return Ok(invoice);
        }

        let schedule = self.require_schedule(work_item_id).await?;
        let work_item = self.require_work_item(work_item_id).await?;
        ensure_settleable(
            &invoice,
            schedule.last_step_number(),
            work_item.certificate_photo.as_deref(),
        )?;

        invoice.status = InvoiceStatus::Paid;
        invoice.proof_ref = Some(proof_ref.to_string());
        invoice.paid_at = Some(now);
        invoice.updated_at = now;
        let fire_notification = step == 1 && !invoice.notified;
        if fire_notification {
            invoice.notified = true;
        }

        let mut tx = self.pool.begin().await.map_err(persistence)?;
        invoice_sql::update_invoice(&mut tx, &invoice).await.map_err(persistence)?;
        tx.commit().await.map_err(persistence)?;

        // Fired after commit; the persisted `notified` flag keeps a retry
        // of this operation from delivering twice.
        if fire_notification {
            self.notifier.notify(NotificationEvent::FirstTrancheSettled {
                work_item_id: work_item_id.clone(),
                invoice_id: invoice.id.clone(),
            });
        }

        self.emit_with(
            Some(work_item_id),
            "billing.invoice_settled",
            AuditCategory::Billing,
            actor,
            AuditOutcome::Success,
            &[("step", step.to_string())],
        );
        Ok(invoice)
    }

    /// Recomputes the amount from the current contract price and
    /// reservation-fee state, and resets the invoice to pending. Identity,
    /// number, and the notification marker are untouched.
    pub async fn regenerate_invoice(
        &self,
        work_item_id: &WorkItemId,
        step: u32,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Invoice, ApplicationError> {
        let mut invoice = self
            .invoices
            .find_by_step(work_item_id, step)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "invoice",
                id: format!("{}/step {step}", work_item_id.0),
            })?;

        let contract = self.contracts.find_by_work_item(work_item_id).await?;
        invoice.amount =
            self.step_amount_for(work_item_id, contract.as_ref(), invoice.percentage).await?;
        invoice.status = InvoiceStatus::Pending;
        invoice.proof_ref = None;
        invoice.paid_at = None;
        invoice.updated_at = now;

        let mut tx = self.pool.begin().await.map_err(persistence)?;
        invoice_sql::update_invoice(&mut tx, &invoice).await.map_err(persistence)?;
        tx.commit().await.map_err(persistence)?;

        self.emit_with(
            Some(work_item_id),
            "billing.invoice_regenerated",
            AuditCategory::Billing,
            actor,
            AuditOutcome::Success,
            &[("step", step.to_string())],
        );
        Ok(invoice)
    }

    /// Deletes a pending invoice. Paid invoices are immutable history.
    pub async fn delete_invoice(
        &self,
        work_item_id: &WorkItemId,
        step: u32,
        actor: &str,
    ) -> Result<(), ApplicationError> {
        let invoice = self
            .invoices
            .find_by_step(work_item_id, step)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "invoice",
                id: format!("{}/step {step}", work_item_id.0),
            })?;
        ensure_deletable(&invoice)?;

        let mut conn = self.pool.acquire().await.map_err(persistence)?;
        invoice_sql::delete_invoice(&mut conn, &invoice.id).await.map_err(persistence)?;

        self.emit_with(
            Some(work_item_id),
            "billing.invoice_deleted",
            AuditCategory::Billing,
            actor,
            AuditOutcome::Success,
            &[("step", step.to_string())],
        );
        Ok(())
    }

    /// Advances the manual unlock cursor by one intermediate step. The
    /// final step is certificate-gated and never passes through the cursor,
    /// and every step up to the cursor must be paid before it moves.
    pub async fn unlock_next_step(
        &self,
        work_item_id: &WorkItemId,
        actor: &str,
    ) -> Result<BillingState, ApplicationError> {
        let schedule = self.require_schedule(work_item_id).await?;
        let mut state = self
            .invoices
            .find_billing_state(work_item_id)
            .await?
            .unwrap_or_else(|| BillingState::initial(work_item_id.clone()));

        let last_unlockable = schedule.last_step_number().saturating_sub(1);
        if state.unlocked_step >= last_unlockable {
            return Err(DomainError::invalid_state(
                "no further intermediate steps to unlock",
            )
            .into());
        }

        let invoices = self.invoices.list_for_work_item(work_item_id).await?;
        for step in 1..=state.unlocked_step {
            let paid = invoices
                .iter()
                .any(|invoice| invoice.step_number == step && invoice.is_paid());
            if !paid {
                return Err(DomainError::invalid_state(format!(
                    "step {step} must be paid before unlocking the next step"
                ))
                .into());
            }
        }
        state.unlocked_step += 1;
        self.invoices.save_billing_state(state.clone()).await?;

        self.emit_with(
            Some(work_item_id),
            "billing.step_unlocked",
            AuditCategory::Billing,
            actor,
            AuditOutcome::Success,
            &[("unlocked_step", state.unlocked_step.to_string())],
        );
        Ok(state)
    }

    /// Full billing position for one work item, derived from a single
    /// consistent snapshot of the invoice set.
    pub async fn payment_summary(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<PaymentSummary, ApplicationError> {
        let contract = self
            .contracts
            .find_by_work_item(work_item_id)
            .await?
            .ok_or_else(|| DomainError::missing("contract"))?;
        let price = contract.price.ok_or_else(|| DomainError::missing("contract price"))?;
        let schedule = self.require_schedule(work_item_id).await?;
        let work_item = self.require_work_item(work_item_id).await?;
        let fee = self.catalog.find_reservation_fee(work_item_id).await?;
        let invoices = self.invoices.list_for_work_item(work_item_id).await?;
        let state = self
            .invoices
            .find_billing_state(work_item_id)
            .await?
            .unwrap_or_else(|| BillingState::initial(work_item_id.clone()));

        Ok(fitout_core::billing::status::summarize(
            work_item_id.clone(),
            price,
            fee,
            &schedule,
            &invoices,
            state.unlocked_step,
            work_item.certificate_issued,
        ))
    }

    async fn step_amount_for(
        &self,
        work_item_id: &WorkItemId,
        contract: Option<&Contract>,
        percentage: Decimal,
    ) -> Result<Decimal, ApplicationError> {
        let price = contract
            .and_then(|contract| contract.price)
            .ok_or_else(|| DomainError::missing("contract price"))?;
        let fee = self.catalog.find_reservation_fee(work_item_id).await?;
        Ok(billing::step_amount(billing::remaining_payable(price, fee.as_ref()), percentage))
    }

    async fn require_work_item(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<WorkItem, ApplicationError> {
        self.catalog.find_work_item(work_item_id).await?.ok_or_else(|| {
            DomainError::NotFound { entity: "work item", id: work_item_id.0.clone() }.into()
        })
    }

    async fn require_internal(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<InternalCostSheet, ApplicationError> {
        self.sheets.find_internal(work_item_id).await?.ok_or_else(|| {
            DomainError::NotFound { entity: "internal cost sheet", id: work_item_id.0.clone() }
                .into()
        })
    }

    async fn require_schedule(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<PaymentSchedule, ApplicationError> {
        let contract = self
            .contracts
            .find_by_work_item(work_item_id)
            .await?
            .ok_or_else(|| DomainError::missing("contract"))?;
        let schedule_id = contract
            .schedule_id
            .ok_or_else(|| DomainError::missing("payment schedule on contract"))?;
        self.contracts.find_schedule(&schedule_id).await?.ok_or_else(|| {
            DomainError::NotFound { entity: "payment schedule", id: schedule_id.0.clone() }.into()
        })
    }

    fn emit(
        &self,
        work_item_id: Option<&WorkItemId>,
        event_type: &str,
        category: AuditCategory,
        actor: &str,
        outcome: AuditOutcome,
    ) {
        self.emit_with(work_item_id, event_type, category, actor, outcome, &[]);
    }

    fn emit_with(
        &self,
        work_item_id: Option<&WorkItemId>,
        event_type: &str,
        category: AuditCategory,
        actor: &str,
        outcome: AuditOutcome,
        metadata: &[(&str, String)],
    ) {
        let mut event = AuditEvent::new(
            work_item_id.cloned(),
            Uuid::new_v4().to_string(),
            event_type,
            category,
            actor,
            outcome,
        );
        for (key, value) in metadata {
            event = event.with_metadata(*key, value.clone());
        }
        self.audit.emit(event);
    }
}

fn persistence(error: impl std::fmt::Display) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
