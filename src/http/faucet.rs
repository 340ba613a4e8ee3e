//! Faucet endpoints.

use alloy::primitives::Address;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;

pub const ERR_INVALID_REQUEST_FORMAT: &str =
    "Invalid request format. Expected JSON with 'userAddress' field.";
pub const ERR_INVALID_ADDRESS_FORMAT: &str = "Invalid address format.";
pub const ERR_CLEARNODE_CONNECTION_FAILED: &str = "Failed to connect to Clearnode.";
pub const ERR_SERVICE_UNAVAILABLE: &str = "Faucet service is currently unavailable.";
pub const ERR_TRANSFER_FAILED: &str = "Failed to send tokens.";
pub const MSG_TOKENS_SENT: &str = "Tokens sent successfully";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetRequest {
    pub user_address: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetResponse {
    pub success: bool,
    pub message: String,
    pub tx_id: String,
    pub amount: String,
    pub asset: String,
    pub destination: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub service: String,
    pub version: String,
    pub faucet_address: String,
    pub standard_tip_amount: String,
    pub token_symbol: String,
    pub endpoints: Vec<String>,
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// `POST /requestTokens`
pub async fn request_tokens(
    State(state): State<AppState>,
    payload: Result<Json<FaucetRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Invalid request format");
            return error(StatusCode::BAD_REQUEST, ERR_INVALID_REQUEST_FORMAT);
        }
    };

    let raw_address = request.user_address.trim();
    let destination = match raw_address.parse::<Address>() {
        Ok(address) => address.to_checksum(None),
        Err(_) => {
            tracing::warn!(address = %raw_address, "Invalid address format");
            return error(StatusCode::BAD_REQUEST, ERR_INVALID_ADDRESS_FORMAT);
        }
    };

    tracing::info!(destination = %destination, "Processing faucet request");

    if let Err(e) = state.client.ensure_connected().await {
        tracing::error!(destination = %destination, error = %e, "Connection failed");
        return error(StatusCode::SERVICE_UNAVAILABLE, ERR_CLEARNODE_CONNECTION_FAILED);
    }

    if state.check_before_transfer {
        if let Err(e) = state.client.ensure_operational().await {
            tracing::error!(destination = %destination, error = %e, "Service not operational");
            return error(StatusCode::SERVICE_UNAVAILABLE, ERR_SERVICE_UNAVAILABLE);
        }
    }

    let policy = state.client.distribution();
    let result = match state
        .client
        .transfer(&destination, &policy.asset_symbol, &policy.tip_amount)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(destination = %destination, error = %e, "Transfer failed");
            return error(StatusCode::INTERNAL_SERVER_ERROR, ERR_TRANSFER_FAILED);
        }
    };

    tracing::info!(
        amount = %result.amount,
        asset = %result.asset,
        destination = %destination,
        tx_id = %result.transaction_id,
        "Tokens sent"
    );

    (
        StatusCode::OK,
        Json(FaucetResponse {
            success: true,
            message: MSG_TOKENS_SENT.to_string(),
            tx_id: result.transaction_id,
            amount: result.amount,
            asset: result.asset,
            destination,
        }),
    )
        .into_response()
}

/// `GET /info`
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    let policy = state.client.distribution();
    Json(InfoResponse {
        service: "Nitrolite Faucet Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        faucet_address: state.client.address().to_checksum(None),
        standard_tip_amount: policy.tip_amount.clone(),
        token_symbol: policy.asset_symbol.clone(),
        endpoints: vec!["/requestTokens".to_string(), "/info".to_string()],
    })
}
