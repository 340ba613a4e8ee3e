//! Three-step challenge/response handshake.
//!
//! # Data Flow
//! ```text
//! auth_request ──► node ──► challenge_message
//!      (signed by session key)       │
//!                                    ▼
//!                        EIP-712 Policy signed by owner wallet
//!                                    │
//! auth_verify {challenge} + sig ─────┘──► node ──► {success, jwt_token}
//! ```
//!
//! # State Machine
//! `Unauthenticated → ChallengeIssued → Verified`, or `→ Failed` from any step.
//! A failed handshake may be retried; every attempt restarts at `Unauthenticated`.

use alloy::hex;
use alloy::primitives::Address;
use serde_json::{json, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

use crate::clearnode::connection::Connection;
use crate::clearnode::correlator::Correlator;
use crate::clearnode::eip712::{sign_challenge, ChallengePolicy};
use crate::clearnode::envelope::RpcResponse;
use crate::clearnode::error::{ClientError, ClientResult};
use crate::clearnode::identity::Identities;
use crate::clearnode::types::methods;

/// Default application name announced to the node.
pub const DEFAULT_APP_NAME: &str = "Nitrolite Faucet";

/// Default session scope.
pub const DEFAULT_SCOPE: &str = "app.transfer";

/// Default session lifetime (10 000 hours).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(36_000_000);

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    ChallengeIssued,
    Verified,
    Failed,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::ChallengeIssued => "challenge_issued",
            AuthState::Verified => "verified",
            AuthState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Parameters announced in `auth_request` and bound into the signed policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParams {
    pub app_name: String,
    pub scope: String,
    pub session_ttl: Duration,
    /// Application the session is scoped to; zero address for none.
    pub application: Address,
}

impl Default for AuthParams {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            application: Address::ZERO,
        }
    }
}

/// Result of a successful handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Bearer token, when the node issued one.
    pub session_token: Option<String>,
    /// Absolute session expiry (unix seconds).
    pub expires_at: u64,
}

impl std::fmt::Debug for AuthOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOutcome")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Runs the handshake and tracks its state.
#[derive(Debug)]
pub struct Authenticator {
    params: AuthParams,
    state: watch::Sender<AuthState>,
}

impl Authenticator {
    pub fn new(params: AuthParams) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self { params, state }
    }

    pub fn params(&self) -> &AuthParams {
        &self.params
    }

    /// Current handshake state.
    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Forget a previous handshake (e.g. after the socket was closed).
    pub fn reset(&self) {
        self.transition(AuthState::Unauthenticated);
    }

    fn transition(&self, next: AuthState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Authentication state changed");
        }
    }

    /// Authenticate the current socket.
    ///
    /// On success the session credential is stored on `connection`. Any failure
    /// leaves the state at [`AuthState::Failed`] and returns the underlying error.
    pub async fn authenticate(
        &self,
        connection: &Connection,
        correlator: &Correlator,
        identities: &Identities,
    ) -> ClientResult<AuthOutcome> {
        tracing::info!(
            wallet = %identities.auth().address(),
            session_key = %identities.signer().address(),
            "Starting authentication flow"
        );

        match self.handshake(connection, correlator, identities).await {
            Ok(outcome) => {
                self.transition(AuthState::Verified);
                tracing::info!(expires_at = outcome.expires_at, "Authentication successful");
                Ok(outcome)
            }
            Err(e) => {
                self.transition(AuthState::Failed);
                tracing::error!(error = %e, "Authentication failed");
                Err(e)
            }
        }
    }

    async fn handshake(
        &self,
        connection: &Connection,
        correlator: &Correlator,
        identities: &Identities,
    ) -> ClientResult<AuthOutcome> {
        self.transition(AuthState::Unauthenticated);

        let wallet = identities.auth().address();
        let session_key = identities.signer().address();
        let expires_at = unix_seconds() + self.params.session_ttl.as_secs();

        // Step 1: request a challenge
        let params = auth_request_params(&self.params, wallet, session_key, expires_at);
        let response = correlator
            .send_request(connection, identities.signer(), methods::AUTH_REQUEST, params)
            .await?;
        let challenge = parse_challenge(&response)?;
        self.transition(AuthState::ChallengeIssued);
        tracing::debug!(request_id = response.request_id, "Received challenge");

        // Step 2: sign it with the owner wallet
        let policy = ChallengePolicy {
            app_name: self.params.app_name.clone(),
            challenge: challenge.clone(),
            scope: self.params.scope.clone(),
            wallet,
            session_key,
            expires_at,
            allowances: Vec::new(),
        };
        let signature = sign_challenge(identities.auth(), &policy).await?;

        // Step 3: verify
        let request = correlator.next_request(methods::AUTH_VERIFY, json!({ "challenge": challenge }));
        let payload = request.payload_bytes()?;
        let response = correlator
            .dispatch(connection, &request, &payload, vec![hex::encode_prefixed(signature)])
            .await?;
        let session_token = parse_verification(&response)?;

        connection.set_session(session_token.clone()).await;
        if session_token.is_some() {
            tracing::debug!("Session token received and stored");
        }

        Ok(AuthOutcome {
            session_token,
            expires_at,
        })
    }
}

/// Params of `auth_request`. No spending allowances are requested.
pub fn auth_request_params(
    params: &AuthParams,
    wallet: Address,
    session_key: Address,
    expires_at: u64,
) -> Value {
    json!({
        "address": wallet.to_checksum(None),
        "session_key": session_key.to_checksum(None),
        "app_name": params.app_name,
        "scope": params.scope,
        "expire": expires_at.to_string(),
        "application": params.application.to_checksum(None),
        "allowances": [],
    })
}

/// Extract the challenge from an `auth_request` response.
pub fn parse_challenge(response: &RpcResponse) -> ClientResult<String> {
    if response.is_error() {
        return Err(ClientError::Authentication(format!(
            "auth_request error: {}",
            response.error_message()
        )));
    }

    match response.data.get("challenge_message").and_then(Value::as_str) {
        Some(challenge) if !challenge.is_empty() => Ok(challenge.to_string()),
        _ => Err(ClientError::Authentication(
            "Invalid challenge response format".to_string(),
        )),
    }
}

/// Check an `auth_verify` response, returning the session token if issued.
pub fn parse_verification(response: &RpcResponse) -> ClientResult<Option<String>> {
    if response.is_error() {
        return Err(ClientError::Authentication(format!(
            "auth_verify error: {}",
            response.error_message()
        )));
    }

    if response.data.get("success").and_then(Value::as_bool) != Some(true) {
        return Err(ClientError::Authentication(format!(
            "Response does not include success: {}",
            Value::Object(response.data.clone())
        )));
    }

    Ok(response
        .data
        .get("jwt_token")
        .and_then(Value::as_str)
        .map(str::to_string))
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(method: &str, data: Value) -> RpcResponse {
        RpcResponse {
            request_id: 1,
            method: method.to_string(),
            data: data.as_object().cloned().unwrap(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_default_params() {
        let params = AuthParams::default();
        assert_eq!(params.app_name, "Nitrolite Faucet");
        assert_eq!(params.scope, "app.transfer");
        assert_eq!(params.application, Address::ZERO);
    }

    #[test]
    fn test_auth_request_params_shape() {
        let wallet = Address::repeat_byte(0x11);
        let session = Address::repeat_byte(0x22);
        let value = auth_request_params(&AuthParams::default(), wallet, session, 1_800_000_000);

        assert_eq!(value["address"], wallet.to_checksum(None));
        assert_eq!(value["session_key"], session.to_checksum(None));
        assert_eq!(value["expire"], "1800000000");
        assert_eq!(value["allowances"], json!([]));
        assert_eq!(value["application"], Address::ZERO.to_checksum(None));
    }

    #[test]
    fn test_parse_challenge() {
        let ok = response("auth_challenge", json!({"challenge_message": "abc-123"}));
        assert_eq!(parse_challenge(&ok).unwrap(), "abc-123");

        let missing = response("auth_challenge", json!({}));
        assert!(matches!(parse_challenge(&missing), Err(ClientError::Authentication(_))));

        let rejected = response("error", json!({"error": "unknown wallet"}));
        let err = parse_challenge(&rejected).unwrap_err();
        assert!(err.to_string().contains("unknown wallet"));
    }

    #[test]
    fn test_parse_verification() {
        let ok = response("auth_verify", json!({"success": true, "jwt_token": "token"}));
        assert_eq!(parse_verification(&ok).unwrap().as_deref(), Some("token"));

        let no_token = response("auth_verify", json!({"success": true}));
        assert_eq!(parse_verification(&no_token).unwrap(), None);

        let unsuccessful = response("auth_verify", json!({"success": false}));
        assert!(matches!(
            parse_verification(&unsuccessful),
            Err(ClientError::Authentication(_))
        ));

        let rejected = response("error", json!({"error": "invalid signature"}));
        let err = parse_verification(&rejected).unwrap_err();
        assert!(err.to_string().contains("invalid signature"));
    }

    #[test]
    fn test_state_transitions_are_observable() {
        let authenticator = Authenticator::new(AuthParams::default());
        let mut rx = authenticator.subscribe();
        assert_eq!(authenticator.state(), AuthState::Unauthenticated);

        authenticator.transition(AuthState::Failed);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AuthState::Failed);

        authenticator.reset();
        assert_eq!(authenticator.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_outcome_debug_redacts_token() {
        let outcome = AuthOutcome {
            session_token: Some("secret-jwt".into()),
            expires_at: 1,
        };
        assert!(!format!("{:?}", outcome).contains("secret-jwt"));
    }
}
