//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger wiring (store, locks, coordinator, reconciliation)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/query DTOs and their mapping to coordinator requests
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    // Ledger routes: require an actor.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::actor_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
