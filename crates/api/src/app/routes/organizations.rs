use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use billfold_core::OrganizationId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:id", get(get_organization))
}

pub async fn get_organization(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrganizationId = match dto::parse_id(&id, "organization id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.get_organization(id).await {
        Ok(org) => (StatusCode::OK, Json(org)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
