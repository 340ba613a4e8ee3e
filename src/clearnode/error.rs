//! Error taxonomy for the node client.

use thiserror::Error;

/// Errors that can occur while talking to the node.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket could not be opened, or died while a call was in flight.
    #[error("Connection error: {0}")]
    Connection(String),

    /// An operation that needs a live socket was attempted without one.
    #[error("Client is not connected")]
    NotConnected,

    /// Writing an envelope to the socket failed.
    #[error("Send error: {0}")]
    Send(String),

    /// No response arrived within the deadline.
    #[error("Request {method} (id {request_id}) timed out after {timeout_ms} ms")]
    Timeout {
        method: String,
        request_id: u64,
        timeout_ms: u64,
    },

    /// Malformed or unexpected envelope / payload shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Challenge or verification rejected, or malformed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Asset unsupported or balance insufficient.
    #[error("Operational error: {0}")]
    Operational(String),

    /// The node rejected or could not complete a transfer.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Invalid private key or signing failure.
    #[error("Identity error: {0}")]
    Identity(String),

    /// Authentication and transaction-signing keys are the same.
    #[error("Owner and signer private keys must be different for security reasons")]
    KeySeparation,
}

impl ClientError {
    /// Whether the failure means the caller should run connect + authenticate again.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ClientError::Connection(_) | ClientError::NotConnected | ClientError::Send(_)
        )
    }
}

/// Result type for node client operations.
pub type ClientResult<T> = Result<T, ClientError>;
