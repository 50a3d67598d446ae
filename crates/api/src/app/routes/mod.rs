use axum::{routing::post, Router};

pub mod accounts;
pub mod organizations;
pub mod purchases;
pub mod system;
pub mod transfers;

/// Router for all ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/accounts", accounts::router())
        .nest("/organizations", organizations::router())
        .route("/transfers", post(transfers::create_transfer))
        .route("/purchases", post(purchases::create_purchase))
}
