//! Key pairs used by the client and their signing schemes.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables or explicit arguments
//! - Keys are never logged or serialized
//! - The authentication identity and the transaction-signing identity must differ

use alloy::hex;
use alloy::primitives::{keccak256, Address, Signature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;

use crate::clearnode::error::{ClientError, ClientResult};

/// Environment variable holding the authentication (owner) key.
pub const OWNER_PRIVATE_KEY_ENV_VAR: &str = "OWNER_PRIVATE_KEY";

/// Environment variable holding the transaction-signing (session) key.
pub const SIGNER_PRIVATE_KEY_ENV_VAR: &str = "SIGNER_PRIVATE_KEY";

/// A single secp256k1 key pair.
#[derive(Debug, Clone)]
pub struct Identity {
    signer: PrivateKeySigner,
}

impl Identity {
    /// Create an identity from a hex-encoded private key (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> ClientResult<Self> {
        let key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ClientError::Identity(format!("Invalid private key format: {}", e)))?;

        Ok(Self { signer })
    }

    /// Load an identity from the named environment variable.
    pub fn from_env(var: &str) -> ClientResult<Self> {
        let private_key = std::env::var(var).map_err(|_| {
            ClientError::Identity(format!("Environment variable {} not set", var))
        })?;
        Self::from_private_key(&private_key)
    }

    /// Generate a fresh random identity.
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// The identity's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a request payload with the generic per-request scheme.
    ///
    /// The signature covers `keccak256(payload)` and is returned as `0x`-prefixed
    /// hex of `r || s || v` with `v` in `{0, 1}`.
    pub async fn sign_payload(&self, payload: &[u8]) -> ClientResult<String> {
        let hash = keccak256(payload);
        let signature = self
            .signer
            .sign_hash(&hash)
            .await
            .map_err(|e| ClientError::Identity(format!("Signing failed: {}", e)))?;

        let mut bytes = signature.as_bytes();
        bytes[64] = signature.v() as u8;
        Ok(hex::encode_prefixed(bytes))
    }

    /// Sign a precomputed 32-byte digest. `v` is left in 27/28 form.
    pub async fn sign_digest(&self, digest: B256) -> ClientResult<[u8; 65]> {
        let signature = self
            .signer
            .sign_hash(&digest)
            .await
            .map_err(|e| ClientError::Identity(format!("Digest signing failed: {}", e)))?;
        Ok(signature.as_bytes())
    }
}

/// Recover the address that produced a generic per-request signature.
pub fn recover_payload_signer(payload: &[u8], signature_hex: &str) -> ClientResult<Address> {
    recover_digest_signer(keccak256(payload), signature_hex)
}

/// Recover the address that signed `digest`. Accepts `v` as 0/1 or 27/28.
pub fn recover_digest_signer(digest: B256, signature_hex: &str) -> ClientResult<Address> {
    let bytes = hex::decode(signature_hex)
        .map_err(|e| ClientError::Protocol(format!("Invalid signature hex: {}", e)))?;
    let signature = Signature::from_raw(&bytes)
        .map_err(|e| ClientError::Protocol(format!("Invalid signature: {}", e)))?;
    signature
        .recover_address_from_prehash(&digest)
        .map_err(|e| ClientError::Protocol(format!("Signature recovery failed: {}", e)))
}

/// The pair of identities a client runs with.
///
/// `auth` proves ownership of the wallet during the handshake; `signer` is the
/// session key that signs every regular request. The two never share a key.
#[derive(Debug, Clone)]
pub struct Identities {
    auth: Identity,
    signer: Identity,
}

impl Identities {
    /// Pair two identities, rejecting identical keys.
    pub fn new(auth: Identity, signer: Identity) -> ClientResult<Self> {
        if auth.address() == signer.address() {
            return Err(ClientError::KeySeparation);
        }

        tracing::info!(
            owner = %auth.address(),
            signer = %signer.address(),
            "Identities initialized"
        );

        Ok(Self { auth, signer })
    }

    /// Pair two hex-encoded private keys.
    pub fn from_private_keys(owner_key_hex: &str, signer_key_hex: &str) -> ClientResult<Self> {
        Self::new(
            Identity::from_private_key(owner_key_hex)?,
            Identity::from_private_key(signer_key_hex)?,
        )
    }

    /// Load both keys from `OWNER_PRIVATE_KEY` and `SIGNER_PRIVATE_KEY`.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(
            Identity::from_env(OWNER_PRIVATE_KEY_ENV_VAR)?,
            Identity::from_env(SIGNER_PRIVATE_KEY_ENV_VAR)?,
        )
    }

    /// The authentication (owner wallet) identity.
    pub fn auth(&self) -> &Identity {
        &self.auth
    }

    /// The transaction-signing (session key) identity.
    pub fn signer(&self) -> &Identity {
        &self.signer
    }
}
