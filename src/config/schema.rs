//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Private keys are not part of the schema; they are read from the environment only.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clearnode::auth::{DEFAULT_APP_NAME, DEFAULT_SCOPE};
use crate::clearnode::operational::{DistributionPolicy, DEFAULT_MIN_TRANSFER_MULTIPLE};
use crate::clearnode::{AuthParams, ClientConfig};
use crate::observability::LogFormat;

/// Root configuration for the faucet.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FaucetConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Node connection settings.
    pub clearnode: ClearnodeConfig,

    /// Authentication handshake parameters.
    pub auth: AuthConfig,

    /// What is distributed and how much headroom is required.
    pub faucet: DistributionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl FaucetConfig {
    /// Settings for the node client.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            url: self.clearnode.url.clone(),
            response_timeout: Duration::from_millis(self.clearnode.response_timeout_ms),
            auth: self.auth.params(),
            distribution: self.faucet.policy(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Node connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClearnodeConfig {
    /// WebSocket URL of the node.
    pub url: String,

    /// Per-call response deadline in milliseconds.
    pub response_timeout_ms: u64,
}

impl Default for ClearnodeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".to_string(),
            response_timeout_ms: 5_000,
        }
    }
}

/// Authentication handshake configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Application name; also the signing domain name.
    pub app_name: String,

    /// Requested session scope.
    pub scope: String,

    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,

    /// Application address the session is scoped to (zero address for none).
    pub application: String,
}

impl AuthConfig {
    /// Handshake parameters. An unparseable application falls back to zero;
    /// validation reports it before this is reached.
    pub fn params(&self) -> AuthParams {
        AuthParams {
            app_name: self.app_name.clone(),
            scope: self.scope.clone(),
            session_ttl: Duration::from_secs(self.session_ttl_secs),
            application: self.application.parse().unwrap_or_default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let params = AuthParams::default();
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            session_ttl_secs: params.session_ttl.as_secs(),
            application: params.application.to_checksum(None),
        }
    }
}

/// Distribution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Ledger symbol of the distributed token (e.g., "usdc").
    pub token_symbol: String,

    /// Amount sent per request, as a decimal string.
    pub standard_tip_amount: String,

    /// Balance must cover this many tips.
    pub min_transfer_multiple: u64,

    /// Re-run the operational check before each transfer.
    pub check_before_transfer: bool,
}

impl DistributionConfig {
    pub fn policy(&self) -> DistributionPolicy {
        DistributionPolicy {
            asset_symbol: self.token_symbol.clone(),
            tip_amount: self.standard_tip_amount.clone(),
            min_transfer_multiple: self.min_transfer_multiple,
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            token_symbol: "usdc".to_string(),
            standard_tip_amount: "10".to_string(),
            min_transfer_multiple: DEFAULT_MIN_TRANSFER_MULTIPLE,
            check_before_transfer: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Bind address of the metrics endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
