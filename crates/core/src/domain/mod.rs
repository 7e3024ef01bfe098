pub mod catalog;
pub mod contract;
pub mod cost_sheet;
pub mod invoice;
