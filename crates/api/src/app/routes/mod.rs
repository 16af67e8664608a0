use axum::{
    routing::{get, post, put},
    Router,
};

pub mod audit;
pub mod common;
pub mod customers;
pub mod products;
pub mod reconciliation;
pub mod sales;
pub mod settings;
pub mod system;

/// Router for all actor-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/sales", post(sales::post_sale))
        .route("/payments", post(sales::post_payment))
        .nest("/products", products::router())
        .nest("/customers", customers::router())
        .route("/reconciliation", post(reconciliation::run))
        .route("/audit", get(audit::scan))
        .route("/settings/exchange-rate", put(settings::set_exchange_rate))
}
