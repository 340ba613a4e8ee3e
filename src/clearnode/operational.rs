//! Pre-flight checks on the distribution asset.
//!
//! Amounts are decimal strings. They are compared in the asset's base units,
//! never as floating point.

use alloy::primitives::utils::{parse_units, ParseUnits};
use alloy::primitives::U256;

use crate::clearnode::error::{ClientError, ClientResult};
use crate::clearnode::types::{balance_for, Asset, Balance};

/// Default balance requirement, as a multiple of one tip.
pub const DEFAULT_MIN_TRANSFER_MULTIPLE: u64 = 10_000;

/// What the faucet hands out, and how much headroom it needs to keep serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPolicy {
    /// Ledger symbol of the distributed asset.
    pub asset_symbol: String,
    /// Amount sent per request, as a decimal string.
    pub tip_amount: String,
    /// The balance must cover this many tips.
    pub min_transfer_multiple: u64,
}

impl Default for DistributionPolicy {
    fn default() -> Self {
        Self {
            asset_symbol: "usdc".to_string(),
            tip_amount: "10".to_string(),
            min_transfer_multiple: DEFAULT_MIN_TRANSFER_MULTIPLE,
        }
    }
}

/// Parse a non-negative decimal amount into base units.
pub fn to_base_units(amount: &str, decimals: u8) -> ClientResult<U256> {
    match parse_units(amount.trim(), decimals) {
        Ok(ParseUnits::U256(value)) => Ok(value),
        Ok(ParseUnits::I256(_)) => Err(ClientError::Operational(format!(
            "Negative amount '{}'",
            amount
        ))),
        Err(e) => Err(ClientError::Operational(format!(
            "Invalid amount '{}': {}",
            amount, e
        ))),
    }
}

/// Validate the node's snapshot against `policy`.
///
/// Fails when the asset is not supported, or when the balance is below
/// `tip_amount × min_transfer_multiple`.
pub fn validate(policy: &DistributionPolicy, assets: &[Asset], balances: &[Balance]) -> ClientResult<()> {
    let asset = assets
        .iter()
        .find(|a| a.symbol == policy.asset_symbol)
        .ok_or_else(|| {
            ClientError::Operational(format!(
                "Asset '{}' is not supported by the node",
                policy.asset_symbol
            ))
        })?;

    let balance = balance_for(balances, &policy.asset_symbol);
    let available = to_base_units(&balance.amount, asset.decimals)?;
    let tip = to_base_units(&policy.tip_amount, asset.decimals)?;
    let required = tip
        .checked_mul(U256::from(policy.min_transfer_multiple))
        .ok_or_else(|| ClientError::Operational("Required balance overflows".to_string()))?;

    if available < required {
        return Err(ClientError::Operational(format!(
            "Insufficient {} balance: have {}, need at least {} ({} x {})",
            policy.asset_symbol,
            balance.amount,
            format_units(required, asset.decimals),
            policy.min_transfer_multiple,
            policy.tip_amount
        )));
    }

    tracing::debug!(
        asset = %policy.asset_symbol,
        balance = %balance.amount,
        "Operational requirements met"
    );
    Ok(())
}

fn format_units(value: U256, decimals: u8) -> String {
    alloy::primitives::utils::format_units(value, decimals).unwrap_or_else(|_| value.to_string())
}
