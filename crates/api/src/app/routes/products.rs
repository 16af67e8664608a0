use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use shopledger_inventory::ProductId;

use crate::app::routes::common::respond;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_product))
        .route("/low-stock", get(low_stock))
        .route("/:id/pricing", put(update_pricing))
        .route("/:id/restock", post(restock))
        .route("/:id/ledger", get(ledger_state))
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::RegisterProductBody>,
) -> axum::response::Response {
    let result = services
        .run_blocking(move |s| {
            s.coordinator()
                .register_product(ctx.actor(), body.into_request(ctx.origin()))
        })
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn update_pricing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePricingBody>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .run_blocking(move |s| {
            s.coordinator()
                .update_pricing(ctx.actor(), body.into_request(product_id, ctx.origin()))
        })
        .await;
    respond(StatusCode::OK, result)
}

pub async fn restock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RestockBody>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .run_blocking(move |s| {
            s.coordinator()
                .restock(ctx.actor(), body.into_request(product_id, ctx.origin()))
        })
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn ledger_state(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(page): Query<dto::PageQuery>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .run_blocking(move |s| {
            s.coordinator()
                .product_ledger_state(product_id, page.pagination())
        })
        .await;
    respond(StatusCode::OK, result)
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let result = services.run_blocking(|s| s.coordinator().low_stock()).await;
    respond(StatusCode::OK, result)
}
