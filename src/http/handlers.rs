//! Request handlers. Each one translates JSON to an engine call and maps
//! the error category to a status code.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::engine::{ErrorBody, ErrorCategory, RelayError};
use crate::http::server::AppState;
use crate::permit::PaymentRequest;

/// `{ "success": true, ...data }`
#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(Envelope { success: true, data })).into_response()
}

pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Input | ErrorCategory::Verification => StatusCode::BAD_REQUEST,
        ErrorCategory::Resource | ErrorCategory::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::OnChain => StatusCode::BAD_GATEWAY,
    }
}

/// Engine error rendered as `{ "success": false, "error": {...} }`.
pub struct ApiError(pub RelayError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body {
            success: bool,
            error: ErrorBody,
        }
        let status = status_for(self.0.category());
        let body = Body {
            success: false,
            error: ErrorBody::from(&self.0),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

pub async fn execute_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> Response {
    let response = state.engine.process_payment(request).await;
    let status = match &response.error {
        None => StatusCode::OK,
        Some(error) => status_for(error.category),
    };
    (status, Json(response)).into_response()
}

pub async fn payment_config(State(state): State<AppState>) -> Response {
    ok(state.engine.payment_config())
}

pub async fn transaction_status(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Response, ApiError> {
    Ok(ok(state.engine.status(&tx_hash).await?))
}

pub async fn token_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Response, ApiError> {
    Ok(ok(state.engine.token_balance(&address).await?))
}

pub async fn calculate_reward(
    State(state): State<AppState>,
    Path(amount): Path<String>,
) -> Result<Response, ApiError> {
    Ok(ok(state.engine.quote_reward(&amount)?))
}

pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.engine.health_check().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}
