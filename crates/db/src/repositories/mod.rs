use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use fitout_core::domain::catalog::{WorkItem, WorkItemId};
use fitout_core::domain::contract::{Contract, PaymentSchedule, ScheduleId};
use fitout_core::domain::cost_sheet::{
    ContractCostSheet, InternalCostSheet, ServiceCostSheet, VendorCostSheet,
};
use fitout_core::domain::invoice::{BillingState, Invoice, ReservationFee};

pub mod catalog;
pub mod contract;
pub mod cost_sheet;
pub mod invoice;

pub use catalog::SqlCatalogRepository;
pub use contract::SqlContractRepository;
pub use cost_sheet::SqlCostSheetRepository;
pub use invoice::SqlInvoiceRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for fitout_core::errors::ApplicationError {
    fn from(error: RepositoryError) -> Self {
        Self::Persistence(error.to_string())
    }
}

/// True when the underlying failure is a UNIQUE constraint violation; the
/// engine maps those to `AlreadyExists` so concurrent creators collapse to
/// one winner.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_work_item(&self, id: &WorkItemId) -> Result<Option<WorkItem>, RepositoryError>;
    async fn save_work_item(&self, work_item: WorkItem) -> Result<(), RepositoryError>;
    async fn set_certificate(
        &self,
        id: &WorkItemId,
        issued: bool,
        photo: Option<String>,
    ) -> Result<(), RepositoryError>;
    async fn find_reservation_fee(
        &self,
        id: &WorkItemId,
    ) -> Result<Option<ReservationFee>, RepositoryError>;
    async fn save_reservation_fee(
        &self,
        id: &WorkItemId,
        fee: ReservationFee,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CostSheetRepository: Send + Sync {
    async fn find_internal(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<InternalCostSheet>, RepositoryError>;
    async fn find_contract(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<ContractCostSheet>, RepositoryError>;
    async fn find_vendor(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<VendorCostSheet>, RepositoryError>;
    async fn find_service(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<ServiceCostSheet>, RepositoryError>;
}

#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn find_by_work_item(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<Contract>, RepositoryError>;
    async fn find_schedule(
        &self,
        id: &ScheduleId,
    ) -> Result<Option<PaymentSchedule>, RepositoryError>;
    async fn list_schedules(&self) -> Result<Vec<PaymentSchedule>, RepositoryError>;
    async fn save_schedule(&self, schedule: PaymentSchedule) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn list_for_work_item(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Vec<Invoice>, RepositoryError>;
    async fn find_by_step(
        &self,
        work_item_id: &WorkItemId,
        step: u32,
    ) -> Result<Option<Invoice>, RepositoryError>;
    async fn find_billing_state(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<BillingState>, RepositoryError>;
    async fn save_billing_state(&self, state: BillingState) -> Result<(), RepositoryError>;
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_optional_decimal(
    column: &str,
    value: Option<String>,
) -> Result<Option<Decimal>, RepositoryError> {
    value.map(|decimal| parse_decimal(column, decimal)).transpose()
}
