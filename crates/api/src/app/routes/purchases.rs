use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn create_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PurchaseRequest>,
) -> axum::response::Response {
    let buyer = match dto::parse_account_id(&body.buyer, "buyer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let service_ids = match dto::parse_service_ids(&body.services) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.purchase(buyer, &service_ids).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
