use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, Json};

use crate::app::dto;
use crate::app::routes::common::respond;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub async fn post_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::PostSaleBody>,
) -> axum::response::Response {
    let result = services
        .run_blocking(move |s| {
            let base = s.coordinator().rates().base().clone();
            let request = body.into_request(base, ctx.origin());
            s.coordinator().post_sale(ctx.actor(), request)
        })
        .await;
    respond(StatusCode::CREATED, result)
}

pub async fn post_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::PostPaymentBody>,
) -> axum::response::Response {
    let result = services
        .run_blocking(move |s| {
            s.coordinator()
                .post_payment(ctx.actor(), body.into_request(ctx.origin()))
        })
        .await;
    respond(StatusCode::CREATED, result)
}
