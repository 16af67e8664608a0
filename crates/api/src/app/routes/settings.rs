use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, Json};

use shopledger_auth::{authorize, Permission};

use crate::app::dto;
use crate::app::routes::common::respond;
use crate::app::services::AppServices;
use crate::context::ActorContext;

/// Refresh the local-currency rate. Sales already posted keep the rate they
/// were posted with.
pub async fn set_exchange_rate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::ExchangeRateBody>,
) -> axum::response::Response {
    let result = services
        .run_blocking(move |s| {
            authorize(ctx.actor(), &Permission::MANAGE_CATALOG)?;
            let rates = s.coordinator().rates();
            rates.set_rate(body.rate)?;
            Ok(dto::ExchangeRateView {
                base: rates.base().clone(),
                local: rates.local().clone(),
                rate: rates.rate(),
            })
        })
        .await;
    respond(StatusCode::OK, result)
}
