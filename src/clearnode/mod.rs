//! Client for the node's signed JSON RPC over a single WebSocket.
//!
//! # Data Flow
//! ```text
//!   caller ──► ClearnodeClient ──► Correlator ──(sign, register)──► Connection ──► node
//!                                      ▲                               │
//!                                      │      PendingRequests          │
//!                                      └──────── deliver ◄── reader task
//! ```
//!
//! # Submodules
//! - `connection`: socket lifecycle, single reader task, connectivity flag
//! - `correlator`: request IDs, pending-response table, timeouts
//! - `envelope`: `req`/`res`/`sig` wire shape
//! - `auth`: challenge/response handshake
//! - `eip712`: structured challenge signature
//! - `identity`: owner and session key pairs
//! - `operational`: asset and balance pre-flight check
//! - `types`: typed payloads and response parsing
//! - `client`: facade tying it together

pub mod auth;
pub mod client;
pub mod connection;
pub mod correlator;
pub mod eip712;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod operational;
pub mod types;

pub use auth::{AuthOutcome, AuthParams, AuthState};
pub use client::{ClearnodeClient, ClientConfig};
pub use error::{ClientError, ClientResult};
pub use identity::{Identities, Identity};
pub use operational::DistributionPolicy;
pub use types::{Asset, Balance, TransferResult};
