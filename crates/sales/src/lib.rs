//! Sales domain: immutable sale and payment records, and the receipts
//! returned once they are posted.
//!
//! A sale is priced exactly once, here, before any ledger is touched.

pub mod payment;
pub mod receipt;
pub mod sale;

pub use payment::{Payment, PaymentEvent, PaymentId};
pub use receipt::{PaymentReceipt, SaleReceipt, StockLevel};
pub use sale::{LineInput, Sale, SaleEvent, SaleId, SaleLine, Tender, debt_portion};
