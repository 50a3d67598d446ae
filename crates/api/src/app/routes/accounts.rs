use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route("/:id", get(get_account))
        .route("/:id/operations", get(list_operations))
        .route("/:id/deposit", post(deposit))
        .route("/:id/reserve", post(reserve))
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.list_accounts().await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateAccountRequest>,
) -> axum::response::Response {
    let initial = match dto::parse_amount(body.major, body.minor) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.create_account(&body.name, initial).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id, "account id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.get_account(id).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_operations(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id, "account id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.history(id).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmountRequest>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id, "account id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let amount = match dto::parse_amount(body.major, body.minor) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.deposit(id, amount).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmountRequest>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id, "account id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let amount = match dto::parse_amount(body.major, body.minor) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.reserve(id, amount).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
