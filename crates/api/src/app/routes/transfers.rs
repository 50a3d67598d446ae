use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Returns the updated source account.
pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::TransferRequest>,
) -> axum::response::Response {
    let from = match dto::parse_account_id(&body.from, "from") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let to = match dto::parse_account_id(&body.to, "to") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let amount = match dto::parse_amount(body.major, body.minor) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfer(from, to, amount).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
