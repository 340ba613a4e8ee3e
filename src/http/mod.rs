//! HTTP front end of the faucet.
//!
//! # Data Flow
//! ```text
//! POST /requestTokens
//!     → faucet.rs (parse body, validate address)
//!     → ClearnodeClient::ensure_connected
//!     → ClearnodeClient::ensure_operational (optional)
//!     → ClearnodeClient::transfer
//!     → JSON response
//! ```
//!
//! # Error Mapping
//! - malformed input → 400
//! - node unreachable, auth failure or not operational → 503
//! - transfer failure → 500

pub mod faucet;
pub mod server;

pub use server::{AppState, HttpServer};
