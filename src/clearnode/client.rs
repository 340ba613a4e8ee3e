//! Client facade consumed by the HTTP layer.
//!
//! # Responsibilities
//! - Own one connection, one correlator and one authenticator per instance
//! - Re-establish connectivity on demand (`ensure_connected`)
//! - Run the operational pre-flight check and transfers
//!
//! # Design Decisions
//! - No process-wide state: independent instances never interfere
//! - No background reconnect; the next call that needs the socket reconnects
//! - Reconnects are serialized so concurrent callers never open two sockets

use alloy::primitives::Address;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::clearnode::auth::{AuthOutcome, AuthParams, AuthState, Authenticator};
use crate::clearnode::connection::Connection;
use crate::clearnode::correlator::{Correlator, DEFAULT_RESPONSE_TIMEOUT};
use crate::clearnode::envelope::RpcResponse;
use crate::clearnode::error::{ClientError, ClientResult};
use crate::clearnode::identity::Identities;
use crate::clearnode::operational::{self, DistributionPolicy};
use crate::clearnode::types::{
    self, methods, Allocation, Asset, Balance, TransferRequest, TransferResult,
};
use crate::observability::metrics;

/// Settings of a [`ClearnodeClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Node WebSocket URL.
    pub url: String,
    /// Per-call response deadline.
    pub response_timeout: Duration,
    pub auth: AuthParams,
    pub distribution: DistributionPolicy,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            auth: AuthParams::default(),
            distribution: DistributionPolicy::default(),
        }
    }
}

struct ClientInner {
    identities: Identities,
    connection: Connection,
    correlator: Correlator,
    authenticator: Authenticator,
    distribution: DistributionPolicy,
    reconnect: Mutex<()>,
}

/// Handle to the node. Cloning is cheap and shares the connection.
#[derive(Clone)]
pub struct ClearnodeClient {
    inner: Arc<ClientInner>,
}

impl ClearnodeClient {
    /// Build an unconnected client. No network I/O happens here.
    pub fn new(identities: Identities, config: ClientConfig) -> ClientResult<Self> {
        let connection = Connection::new(&config.url)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                identities,
                connection,
                correlator: Correlator::new(config.response_timeout),
                authenticator: Authenticator::new(config.auth),
                distribution: config.distribution,
                reconnect: Mutex::new(()),
            }),
        })
    }

    /// Build a client from two hex private keys, rejecting identical keys.
    pub fn from_private_keys(owner_key_hex: &str, signer_key_hex: &str, config: ClientConfig) -> ClientResult<Self> {
        Self::new(Identities::from_private_keys(owner_key_hex, signer_key_hex)?, config)
    }

    /// The faucet's public address: the transaction-signing identity.
    pub fn address(&self) -> Address {
        self.inner.identities.signer().address()
    }

    /// The authenticating wallet.
    pub fn owner_address(&self) -> Address {
        self.inner.identities.auth().address()
    }

    pub fn distribution(&self) -> &DistributionPolicy {
        &self.inner.distribution
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    fn is_ready(&self) -> bool {
        self.is_connected() && self.auth_state() == AuthState::Verified
    }

    pub fn auth_state(&self) -> AuthState {
        self.inner.authenticator.state()
    }

    /// Session credential of the current socket, if authenticated.
    pub async fn session_token(&self) -> Option<String> {
        self.inner.connection.session().await
    }

    /// Number of calls awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending().len()
    }

    /// Open the socket. Does not authenticate.
    pub async fn connect(&self) -> ClientResult<()> {
        self.inner.authenticator.reset();
        self.inner
            .connection
            .connect(self.inner.correlator.pending().clone())
            .await
    }

    /// Run the handshake on the current socket.
    pub async fn authenticate(&self) -> ClientResult<AuthOutcome> {
        let inner = &self.inner;
        inner
            .authenticator
            .authenticate(&inner.connection, &inner.correlator, &inner.identities)
            .await
    }

    /// Make sure the socket is open and authenticated.
    ///
    /// When the connection is down or was never authenticated, reconnects and
    /// re-authenticates. If the handshake fails the fresh socket is closed again.
    pub async fn ensure_connected(&self) -> ClientResult<()> {
        if self.is_ready() {
            return Ok(());
        }

        let _reconnect = self.inner.reconnect.lock().await;
        if self.is_ready() {
            return Ok(());
        }

        tracing::info!(url = %self.inner.connection.url(), "Connection lost, reconnecting");
        self.connect().await?;
        if let Err(e) = self.authenticate().await {
            let _ = self.inner.connection.close().await;
            return Err(e);
        }
        Ok(())
    }

    /// Check that the distribution asset is supported and the balance covers
    /// the configured number of tips.
    pub async fn ensure_operational(&self) -> ClientResult<()> {
        let assets = self.get_assets().await?;
        let balances = self.get_ledger_balances().await?;
        operational::validate(&self.inner.distribution, &assets, &balances)
    }

    /// Assets supported by the node.
    pub async fn get_assets(&self) -> ClientResult<Vec<Asset>> {
        let response = self.call(methods::GET_ASSETS, json!({})).await?;
        if response.is_error() {
            return Err(ClientError::Operational(format!(
                "get_assets error: {}",
                response.error_message()
            )));
        }
        let assets = types::parse_assets(&response.data)?;
        tracing::debug!(count = assets.len(), "Retrieved supported assets");
        Ok(assets)
    }

    /// The faucet's ledger balances.
    pub async fn get_ledger_balances(&self) -> ClientResult<Vec<Balance>> {
        let response = self.call(methods::GET_LEDGER_BALANCES, json!({})).await?;
        if response.is_error() {
            return Err(ClientError::Operational(format!(
                "get_ledger_balances error: {}",
                response.error_message()
            )));
        }
        types::parse_balances(&response.data)
    }

    /// Send `amount` of `asset` to `destination`.
    pub async fn transfer(&self, destination: &str, asset: &str, amount: &str) -> ClientResult<TransferResult> {
        let request = TransferRequest {
            destination: destination.to_string(),
            allocations: vec![Allocation {
                asset: asset.to_string(),
                amount: amount.to_string(),
            }],
        };
        let params = serde_json::to_value(&request)
            .map_err(|e| ClientError::Protocol(format!("Failed to encode transfer: {}", e)))?;

        tracing::info!(destination, asset, amount, "Sending transfer");
        let outcome = match self.call(methods::TRANSFER, params).await {
            Ok(response) if response.is_error() => Err(ClientError::Transfer(format!(
                "Transfer error: {}",
                response.error_message()
            ))),
            Ok(response) => types::parse_transfer_result(&response.data, &request),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(result) => {
                metrics::record_transfer("success");
                tracing::info!(
                    destination,
                    transaction_id = %result.transaction_id,
                    "Transfer completed successfully"
                );
            }
            Err(e) => {
                metrics::record_transfer("failure");
                tracing::error!(destination, error = %e, "Transfer failed");
            }
        }
        outcome
    }

    /// Close the socket and drop the session. Idempotent.
    pub async fn close(&self) -> ClientResult<()> {
        self.inner.authenticator.reset();
        self.inner.connection.close().await
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> ClientResult<RpcResponse> {
        let inner = &self.inner;
        inner
            .correlator
            .send_request(&inner.connection, inner.identities.signer(), method, params)
            .await
    }
}

impl std::fmt::Debug for ClearnodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClearnodeClient")
            .field("url", &self.inner.connection.url().as_str())
            .field("address", &self.address())
            .field("connected", &self.is_connected())
            .field("auth_state", &self.auth_state())
            .finish()
    }
}
