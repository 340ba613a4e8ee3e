//! Clearnode faucet: a signed JSON-RPC client for a Clearnode ledger node and
//! the HTTP faucet built on top of it.

pub mod clearnode;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use clearnode::{ClearnodeClient, ClientConfig, ClientError, ClientResult, Identities};
pub use config::FaucetConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
