use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use shopledger_customers::CustomerId;

use crate::app::routes::common::respond;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_customer))
        .route("/:id/active", put(set_active))
        .route("/:id/debt-adjustments", post(adjust_debt))
        .route("/:id/ledger", get(ledger_state))
}

pub async fn register_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::RegisterCustomerBody>,
) -> axum::response::Response {
    let result = services
        .run_blocking(move |s| {
            s.coordinator()
                .register_customer(ctx.actor(), body.into_request(ctx.origin()))
        })
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn set_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetActiveBody>,
) -> axum::response::Response {
    let customer_id: CustomerId = match errors::parse_id(&id, "customer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .run_blocking(move |s| {
            s.coordinator()
                .set_customer_active(ctx.actor(), customer_id, body.active, ctx.origin())
        })
        .await;
    respond(StatusCode::OK, result)
}

pub async fn adjust_debt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DebtAdjustmentBody>,
) -> axum::response::Response {
    let customer_id: CustomerId = match errors::parse_id(&id, "customer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .run_blocking(move |s| {
            s.coordinator().correct_customer_debt(
                ctx.actor(),
                body.into_request(customer_id, ctx.origin()),
            )
        })
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn ledger_state(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(page): Query<dto::PageQuery>,
) -> axum::response::Response {
    let customer_id: CustomerId = match errors::parse_id(&id, "customer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .run_blocking(move |s| {
            s.coordinator()
                .customer_ledger_state(customer_id, page.pagination())
        })
        .await;
    respond(StatusCode::OK, result)
}
