use std::str::FromStr;

use axum::http::StatusCode;
use serde::Deserialize;

use billfold_core::{AccountId, DomainError, ServiceId};
use billfold_ledger::Amount;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    #[serde(default)]
    pub major: i64,
    #[serde(default)]
    pub minor: i64,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub major: i64,
    pub minor: i64,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub major: i64,
    pub minor: i64,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub buyer: String,
    pub services: Vec<String>,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_id<T>(raw: &str, field: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {field}")))
}

pub fn parse_account_id(raw: &str, field: &str) -> Result<AccountId, axum::response::Response> {
    parse_id(raw, field)
}

pub fn parse_service_ids(raw: &[String]) -> Result<Vec<ServiceId>, axum::response::Response> {
    raw.iter().map(|s| parse_id(s, "service id")).collect()
}

pub fn parse_amount(major: i64, minor: i64) -> Result<Amount, axum::response::Response> {
    Amount::new(major, minor).map_err(errors::domain_error_to_response)
}
