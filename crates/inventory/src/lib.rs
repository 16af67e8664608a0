//! Product ledger domain (event-sourced).
//!
//! Per-product stock on hand, the movements that change it, and the restock
//! records those movements point at. Pure decision logic only; storage and
//! locking live in the infra crate.

pub mod product;
pub mod restock;

pub use product::{
    InventoryMovement, MoveStock, MovementReason, PricingUpdated, Product, ProductCommand,
    ProductEvent, ProductId, ProductRegistered, RegisterProduct, UpdatePricing, recompute_stock,
};
pub use restock::{Restock, RestockEvent, RestockId};
