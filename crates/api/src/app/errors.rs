use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use billfold_core::DomainError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        DomainError::InsufficientFunds { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds", message)
        }
        DomainError::AmbiguousOwner(organizations) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "ambiguous_owner",
                "message": message,
                "organizations": organizations,
            })),
        )
            .into_response(),
        DomainError::Persistence { retryable: true, .. } => {
            tracing::warn!(error = %message, "retryable persistence failure");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(json!({
                    "error": "persistence_error",
                    "message": message,
                    "retryable": true,
                })),
            )
                .into_response()
        }
        DomainError::Persistence { .. } => {
            tracing::error!(error = %message, "persistence failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", message)
        }
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use billfold_core::AccountId;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (DomainError::validation("bad"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("bad"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("account x"), StatusCode::NOT_FOUND),
            (
                DomainError::insufficient_funds(AccountId::new()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (DomainError::AmbiguousOwner(vec![]), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::conflict("deadlock"), StatusCode::SERVICE_UNAVAILABLE),
            (DomainError::persistence("io"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }
    }
}
