//! Typed payloads and method-specific extraction from response data.
//!
//! Response `data` arrives as a generic JSON object; each parser here checks the
//! shape it needs and fails with [`ClientError::Protocol`] instead of panicking.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clearnode::error::{ClientError, ClientResult};

/// Method names understood by the node.
pub mod methods {
    pub const AUTH_REQUEST: &str = "auth_request";
    pub const AUTH_VERIFY: &str = "auth_verify";
    pub const GET_ASSETS: &str = "get_assets";
    pub const GET_LEDGER_BALANCES: &str = "get_ledger_balances";
    pub const TRANSFER: &str = "transfer";
    /// Response method signalling a protocol-level failure.
    pub const ERROR: &str = "error";
}

/// An asset supported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// On-chain token address.
    #[serde(default)]
    pub token: String,
    /// Chain the token lives on.
    #[serde(default)]
    pub chain_id: u64,
    /// Ledger symbol (e.g. "usdc").
    pub symbol: String,
    /// Decimal precision.
    pub decimals: u8,
}

/// Ledger balance for one asset symbol. `amount` is a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub amount: String,
}

/// Spending allowance requested for a session key during authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub asset: String,
    pub amount: String,
}

/// One `{asset, amount}` pair within a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub asset: String,
    pub amount: String,
}

/// Parameters of the `transfer` method.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub destination: String,
    pub allocations: Vec<Allocation>,
}

/// Outcome of a transfer accepted by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    /// Ledger transaction id; empty when the node did not echo one.
    pub transaction_id: String,
    pub amount: String,
    pub asset: String,
    pub destination: String,
    pub status: String,
}

/// Extract the node's message from an `"error"` response.
pub fn error_message(data: &Map<String, Value>) -> String {
    data.get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Value::Object(data.clone()).to_string())
}

/// Parse `data.assets` from a `get_assets` response. Malformed entries are skipped.
pub fn parse_assets(data: &Map<String, Value>) -> ClientResult<Vec<Asset>> {
    let entries = data
        .get("assets")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::Protocol("Invalid assets response format".into()))?;

    Ok(entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Asset>(entry.clone()) {
            Ok(asset) => Some(asset),
            Err(e) => {
                tracing::warn!(entry = %entry, error = %e, "Skipping invalid asset entry");
                None
            }
        })
        .collect())
}

/// Parse `data.ledger_balances` from a `get_ledger_balances` response. Malformed
/// entries are skipped.
pub fn parse_balances(data: &Map<String, Value>) -> ClientResult<Vec<Balance>> {
    let entries = data
        .get("ledger_balances")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::Protocol("Invalid ledger balances response format".into()))?;

    Ok(entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Balance>(entry.clone()) {
            Ok(balance) => Some(balance),
            Err(e) => {
                tracing::warn!(entry = %entry, error = %e, "Skipping invalid balance entry");
                None
            }
        })
        .collect())
}

/// Balance for `symbol`; an absent entry is a zero balance.
pub fn balance_for(balances: &[Balance], symbol: &str) -> Balance {
    balances
        .iter()
        .find(|b| b.asset == symbol)
        .cloned()
        .unwrap_or_else(|| Balance {
            asset: symbol.to_string(),
            amount: "0".to_string(),
        })
}

/// Build the result of a transfer from the response data.
///
/// A missing or empty `transactions` list still counts as success, with an
/// empty transaction id.
pub fn parse_transfer_result(
    data: &Map<String, Value>,
    request: &TransferRequest,
) -> ClientResult<TransferResult> {
    let (asset, amount) = request
        .allocations
        .first()
        .map(|a| (a.asset.clone(), a.amount.clone()))
        .unwrap_or_default();

    let mut result = TransferResult {
        transaction_id: String::new(),
        amount,
        asset,
        destination: request.destination.clone(),
        status: "completed".to_string(),
    };

    let transactions = match data.get("transactions") {
        None | Some(Value::Null) => return Ok(result),
        Some(Value::Array(list)) => list,
        Some(other) => {
            return Err(ClientError::Protocol(format!(
                "Invalid transfer response format: transactions is {}",
                other
            )))
        }
    };

    let Some(first) = transactions.first() else {
        return Ok(result);
    };
    let tx = first
        .as_object()
        .ok_or_else(|| ClientError::Protocol("Invalid transaction data format".into()))?;

    result.transaction_id = match tx.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };
    if let Some(amount) = tx.get("amount").and_then(scalar_to_string) {
        result.amount = amount;
    }
    if let Some(asset) = tx.get("asset").and_then(Value::as_str) {
        result.asset = asset.to_string();
    }

    Ok(result)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
