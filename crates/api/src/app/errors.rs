use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use shopledger_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let status = match &err {
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientStock { .. }
        | LedgerError::DebtWouldGoNegative { .. }
        | LedgerError::OverpaymentRejected { .. }
        | LedgerError::ConcurrencyConflict(_)
        | LedgerError::DriftDetected { .. } => StatusCode::CONFLICT,
        LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path segment into a typed id, or a 400 response.
pub fn parse_id<T: std::str::FromStr>(
    raw: &str,
    what: &str,
) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| {
        json_error(StatusCode::BAD_REQUEST, "INVALID_ID", format!("invalid {what} id"))
    })
}
