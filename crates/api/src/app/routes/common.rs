use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use shopledger_infra::LedgerResult;

use crate::app::errors;

/// Render a ledger result: `status` with the JSON value, or the mapped error.
pub fn respond<T: Serialize>(
    status: StatusCode,
    result: LedgerResult<T>,
) -> axum::response::Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
