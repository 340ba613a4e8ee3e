//! Request/response correlation over the shared socket.
//!
//! # Responsibilities
//! - Assign monotonically increasing request IDs
//! - Register a single-use wait handle per request before it is written
//! - Route responses from the reader task to the waiting caller
//! - Enforce the per-call response timeout
//!
//! # Design Decisions
//! - Pending table is a sharded concurrent map, separate from the socket write lock
//! - Each entry is removed exactly once: by the reader on delivery, or by the
//!   caller's drop guard on timeout, send failure or cancellation
//! - Delivery never blocks the reader: a late response finds no entry and is dropped

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::clearnode::connection::Connection;
use crate::clearnode::envelope::{RpcMessage, RpcRequest, RpcResponse};
use crate::clearnode::error::{ClientError, ClientResult};
use crate::clearnode::identity::Identity;
use crate::observability::metrics;

/// Fixed deadline for a response to arrive.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Table of calls awaiting a response, keyed by request ID.
#[derive(Debug, Default)]
pub struct PendingRequests {
    waiters: DashMap<u64, oneshot::Sender<RpcResponse>>,
}

impl PendingRequests {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait handle for `request_id`.
    fn register(&self, request_id: u64) -> ClientResult<oneshot::Receiver<RpcResponse>> {
        match self.waiters.entry(request_id) {
            Entry::Occupied(_) => Err(ClientError::Protocol(format!(
                "Request id {} is already awaiting a response",
                request_id
            ))),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Hand a response to its waiter. Returns false when nobody is waiting.
    pub fn deliver(&self, response: RpcResponse) -> bool {
        let request_id = response.request_id;
        match self.waiters.remove(&request_id) {
            Some((_, tx)) => {
                if tx.send(response).is_err() {
                    tracing::debug!(request_id, "Waiter gone before delivery, dropping response");
                    return false;
                }
                true
            }
            None => {
                tracing::debug!(request_id, method = %response.method, "Discarding response with no waiter");
                false
            }
        }
    }

    /// Drop the entry for `request_id` if it is still present.
    pub fn remove(&self, request_id: u64) -> bool {
        self.waiters.remove(&request_id).is_some()
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Whether no call is outstanding.
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// Removes a pending entry when the call that owns it returns or is dropped.
struct PendingGuard<'a> {
    table: &'a PendingRequests,
    request_id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.table.remove(self.request_id) {
            tracing::trace!(request_id = self.request_id, "Released pending request");
        }
    }
}

/// Issues signed calls and waits for their responses.
#[derive(Debug)]
pub struct Correlator {
    last_request_id: AtomicU64,
    pending: Arc<PendingRequests>,
    response_timeout: Duration,
}

impl Correlator {
    /// Create a correlator with the given response deadline.
    pub fn new(response_timeout: Duration) -> Self {
        Self {
            last_request_id: AtomicU64::new(0),
            pending: Arc::new(PendingRequests::new()),
            response_timeout,
        }
    }

    /// The table shared with the connection's reader task.
    pub fn pending(&self) -> &Arc<PendingRequests> {
        &self.pending
    }

    /// Configured response deadline.
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Build the next request, taking a fresh ID.
    pub fn next_request(&self, method: &str, params: Value) -> RpcRequest {
        let request_id = self.last_request_id.fetch_add(1, Ordering::SeqCst) + 1;
        RpcRequest::new(request_id, method, params)
    }

    /// Send a call signed with the generic per-request scheme and await its response.
    ///
    /// A response whose method is `"error"` is returned as `Ok`; interpreting it is
    /// up to the caller.
    pub async fn send_request(
        &self,
        connection: &Connection,
        signer: &Identity,
        method: &str,
        params: Value,
    ) -> ClientResult<RpcResponse> {
        let request = self.next_request(method, params);
        let payload = request.payload_bytes()?;
        let signature = signer.sign_payload(&payload).await?;
        self.dispatch(connection, &request, &payload, vec![signature])
            .await
    }

    /// Write `payload` with the given signatures and await the matching response.
    pub async fn dispatch(
        &self,
        connection: &Connection,
        request: &RpcRequest,
        payload: &[u8],
        signatures: Vec<String>,
    ) -> ClientResult<RpcResponse> {
        if !connection.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let request_id = request.request_id;
        let method = request.method.as_str();
        let frame = RpcMessage::signed_request(payload, signatures)?.encode()?;

        let rx = self.pending.register(request_id)?;
        let _guard = PendingGuard {
            table: &self.pending,
            request_id,
        };
        let start_time = Instant::now();

        if let Err(e) = connection.send_text(frame, self.response_timeout).await {
            tracing::warn!(request_id, method, error = %e, "Failed to send request");
            metrics::record_rpc(method, "send_error", start_time);
            return Err(e);
        }

        tracing::debug!(request_id, method, "Sent request");

        match timeout(self.response_timeout, rx).await {
            Ok(Ok(response)) => {
                tracing::debug!(request_id, method = %response.method, "Received response");
                let outcome = if response.is_error() { "error" } else { "ok" };
                metrics::record_rpc(method, outcome, start_time);
                Ok(response)
            }
            Ok(Err(_)) => {
                metrics::record_rpc(method, "dropped", start_time);
                Err(ClientError::Connection(format!(
                    "Response slot for request {} closed",
                    request_id
                )))
            }
            Err(_) => {
                tracing::warn!(
                    request_id,
                    method,
                    timeout_ms = self.response_timeout.as_millis() as u64,
                    "Request timed out"
                );
                metrics::record_rpc(method, "timeout", start_time);
                Err(ClientError::Timeout {
                    method: method.to_string(),
                    request_id,
                    timeout_ms: self.response_timeout.as_millis() as u64,
                })
            }
        }
    }
}
