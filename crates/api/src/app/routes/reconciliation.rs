use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, Json};

use shopledger_infra::ReconcileScope;

use crate::app::dto;
use crate::app::routes::common::respond;
use crate::app::services::AppServices;
use crate::context::ActorContext;

/// Verify or repair. Drift is reported in the body with 200; it is the
/// caller's decision whether a non-clean report is an error.
pub async fn run(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::ReconcileBody>,
) -> axum::response::Response {
    let scope = body.scope.unwrap_or(ReconcileScope::All);
    let result = services
        .run_blocking(move |s| s.reconciliation().run(ctx.actor(), &scope, body.mode))
        .await;
    respond(StatusCode::OK, result)
}
