use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
};

use crate::app::routes::common::respond;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn scan(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::AuditQuery>,
) -> axum::response::Response {
    let filter = match query.filter() {
        Ok(f) => f,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "VALIDATION", msg),
    };
    let pagination = query.pagination();
    let result = services
        .run_blocking(move |s| s.coordinator().scan_audit(&filter, pagination))
        .await;
    respond(StatusCode::OK, result)
}
