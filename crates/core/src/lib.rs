pub mod audit;
pub mod billing;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod pricing;
pub mod telemetry;

pub use billing::status::{PaymentSummary, StepStatus, StepView};
pub use billing::{GenerationContext, GenerationDecision};
pub use domain::catalog::{
    Component, ComponentCategory, ComponentId, ProductLine, ProductLineId, WorkItem, WorkItemId,
};
pub use domain::contract::{Contract, ContractId, ContractState, PaymentSchedule, ScheduleId};
pub use domain::cost_sheet::{
    ContractCostSheet, InternalCostSheet, ResponseStamp, ServiceCostSheet, SheetId,
    VendorCostSheet,
};
pub use domain::invoice::{
    BillingState, Invoice, InvoiceId, InvoiceNumber, InvoiceStatus, ReservationFee,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
