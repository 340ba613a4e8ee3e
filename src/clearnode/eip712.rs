//! EIP-712 structured signature over the authentication challenge.
//!
//! The signed message is a `Policy` struct inside an `EIP712Domain(string name)`
//! whose name is the application name, so a signature is only valid for the
//! application and the typed context it was produced for.

use std::borrow::Cow;

use alloy::primitives::{Address, B256};
use alloy::sol_types::{Eip712Domain, SolStruct};

use crate::clearnode::error::{ClientError, ClientResult};
use crate::clearnode::identity::Identity;
use crate::clearnode::types::Allowance;

mod typed {
    use alloy::sol;

    sol! {
        #[derive(Debug)]
        struct Allowance {
            string asset;
            string amount;
        }

        #[derive(Debug)]
        struct Policy {
            string challenge;
            string scope;
            address wallet;
            address session_key;
            uint64 expires_at;
            Allowance[] allowances;
        }
    }
}

pub use typed::Policy;

/// Inputs of the challenge signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengePolicy {
    /// Application name; becomes the domain name.
    pub app_name: String,
    /// Challenge string issued by the node.
    pub challenge: String,
    /// Requested session scope.
    pub scope: String,
    /// Authenticating wallet address.
    pub wallet: Address,
    /// Session key that will sign subsequent requests.
    pub session_key: Address,
    /// Absolute session expiry (unix seconds).
    pub expires_at: u64,
    /// Spending allowances granted to the session key.
    pub allowances: Vec<Allowance>,
}

impl ChallengePolicy {
    /// The domain this policy is signed under.
    pub fn domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Owned(self.app_name.clone())),
            None,
            None,
            None,
            None,
        )
    }

    /// The typed `Policy` message.
    pub fn message(&self) -> Policy {
        Policy {
            challenge: self.challenge.clone(),
            scope: self.scope.clone(),
            wallet: self.wallet,
            session_key: self.session_key,
            expires_at: self.expires_at,
            allowances: self
                .allowances
                .iter()
                .map(|a| typed::Allowance {
                    asset: a.asset.clone(),
                    amount: a.amount.clone(),
                })
                .collect(),
        }
    }

    /// EIP-712 signing hash: `keccak256(0x1901 || domainSeparator || hashStruct(Policy))`.
    pub fn signing_hash(&self) -> B256 {
        self.message().eip712_signing_hash(&self.domain())
    }
}

/// Sign a challenge policy with the authentication identity.
///
/// The identity must be the policy's wallet. The recovery byte is normalized
/// to 27/28.
pub async fn sign_challenge(identity: &Identity, policy: &ChallengePolicy) -> ClientResult<[u8; 65]> {
    if identity.address() != policy.wallet {
        return Err(ClientError::Authentication(format!(
            "Challenge wallet {} does not match signing identity {}",
            policy.wallet,
            identity.address()
        )));
    }

    let hash = policy.signing_hash();
    let mut signature = identity.sign_digest(hash).await?;
    if signature[64] < 27 {
        signature[64] += 27;
    }

    tracing::debug!(wallet = %policy.wallet, scope = %policy.scope, "Signed challenge policy");
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clearnode::identity::recover_digest_signer;
    use alloy::hex;
    use alloy::primitives::keccak256;

    fn test_policy(auth: &Identity, session: &Identity) -> ChallengePolicy {
        ChallengePolicy {
            app_name: "Test App".to_string(),
            challenge: "test-challenge-123".to_string(),
            scope: "app.transfer".to_string(),
            wallet: auth.address(),
            session_key: session.address(),
            expires_at: 3_600_000_000,
            allowances: vec![Allowance {
                asset: "usdc".to_string(),
                amount: "1000000".to_string(),
            }],
        }
    }

    #[test]
    fn test_policy_type_string() {
        assert_eq!(
            Policy::eip712_encode_type(),
            "Policy(string challenge,string scope,address wallet,address session_key,uint64 expires_at,Allowance[] allowances)Allowance(string asset,string amount)"
        );
    }

    #[test]
    fn test_signing_hash_is_deterministic() {
        let auth = Identity::random();
        let session = Identity::random();
        let policy = test_policy(&auth, &session);
        assert_eq!(policy.signing_hash(), policy.clone().signing_hash());
    }

    #[test]
    fn test_domain_separation() {
        let auth = Identity::random();
        let session = Identity::random();
        let policy = test_policy(&auth, &session);

        let mut other_app = policy.clone();
        other_app.app_name = "Other App".to_string();
        assert_ne!(policy.signing_hash(), other_app.signing_hash());

        let mut other_challenge = policy.clone();
        other_challenge.challenge = "another".to_string();
        assert_ne!(policy.signing_hash(), other_challenge.signing_hash());
    }

    #[tokio::test]
    async fn test_sign_challenge_recovers_wallet() {
        let auth = Identity::random();
        let session = Identity::random();
        let policy = test_policy(&auth, &session);

        let signature = sign_challenge(&auth, &policy).await.unwrap();
        assert_eq!(signature.len(), 65);
        assert!(signature[64] == 27 || signature[64] == 28);

        let recovered =
            recover_digest_signer(policy.signing_hash(), &hex::encode_prefixed(signature)).unwrap();
        assert_eq!(recovered, auth.address());
    }

    #[tokio::test]
    async fn test_sign_challenge_rejects_foreign_identity() {
        let auth = Identity::random();
        let session = Identity::random();
        let policy = test_policy(&auth, &session);

        let result = sign_challenge(&session, &policy).await;
        assert!(matches!(result, Err(ClientError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_structured_signature_not_valid_as_plain_payload_signature() {
        let auth = Identity::random();
        let session = Identity::random();
        let policy = test_policy(&auth, &session);

        let signature = hex::encode_prefixed(sign_challenge(&auth, &policy).await.unwrap());
        let plain = keccak256(policy.challenge.as_bytes());
        let recovered = recover_digest_signer(plain, &signature).unwrap();
        assert_ne!(recovered, auth.address());
    }
}
