//! Customer ledger domain (event-sourced).
//!
//! Per-customer outstanding debt and the debt movements that change it.

pub mod adjustment;
pub mod customer;

pub use adjustment::{DebtAdjustment, DebtAdjustmentEvent, DebtAdjustmentId};
pub use customer::{
    ContactInfo, Customer, CustomerCommand, CustomerEvent, CustomerId, CustomerRegistered,
    CustomerStatusChanged, DebtMovement, DebtReason, MoveDebt, RegisterCustomer, SetCustomerActive,
    recompute_debt,
};
