//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, amounts positive, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FaucetConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::net::SocketAddr;

use crate::clearnode::operational::to_base_units;
use crate::config::schema::FaucetConfig;

/// One failed check, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a loaded configuration.
pub fn validate_config(config: &FaucetConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }

    match url::Url::parse(&config.clearnode.url) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
        Ok(url) => errors.push(ValidationError::new(
            "clearnode.url",
            format!("scheme must be ws or wss, got '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "clearnode.url",
            format!("'{}' is not a valid URL: {}", config.clearnode.url, e),
        )),
    }
    if config.clearnode.response_timeout_ms == 0 {
        errors.push(ValidationError::new("clearnode.response_timeout_ms", "must be > 0"));
    }

    if config.auth.app_name.trim().is_empty() {
        errors.push(ValidationError::new("auth.app_name", "must not be empty"));
    }
    if config.auth.scope.trim().is_empty() {
        errors.push(ValidationError::new("auth.scope", "must not be empty"));
    }
    if config.auth.session_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.session_ttl_secs", "must be > 0"));
    }
    if config.auth.application.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "auth.application",
            format!("'{}' is not an address", config.auth.application),
        ));
    }

    if config.faucet.token_symbol.trim().is_empty() {
        errors.push(ValidationError::new("faucet.token_symbol", "must not be empty"));
    }
    // Precision is only known once the node lists the asset; 18 accepts any
    // plausible decimal string here.
    match to_base_units(&config.faucet.standard_tip_amount, 18) {
        Ok(amount) if amount.is_zero() => {
            errors.push(ValidationError::new("faucet.standard_tip_amount", "must be > 0"))
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::new(
            "faucet.standard_tip_amount",
            format!(
                "'{}' must be a valid number",
                config.faucet.standard_tip_amount
            ),
        )),
    }
    if config.faucet.min_transfer_multiple == 0 {
        errors.push(ValidationError::new("faucet.min_transfer_multiple", "must be > 0"));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("'{}' is not one of {:?}", config.observability.log_level, LOG_LEVELS),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
