//! WebSocket connection lifecycle.
//!
//! # Responsibilities
//! - Open exactly one socket per `connect`
//! - Own the single reader task that consumes every inbound frame
//! - Serialize writes behind a lock
//! - Expose the connectivity flag and the session credential bound to the socket
//!
//! # Design Decisions
//! - The reader task is the only consumer of inbound traffic
//! - Any read error, write error, stalled write or close flips connectivity to
//!   false and drops the session credential
//! - Each connect starts a new epoch; a reader only tears down its own epoch

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::clearnode::correlator::PendingRequests;
use crate::clearnode::envelope::RpcMessage;
use crate::clearnode::error::{ClientError, ClientResult};
use crate::observability::metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Upper bound on the WebSocket opening handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// State shared between the connection handle and its reader task.
#[derive(Default)]
struct Shared {
    writer: Mutex<Option<WsSink>>,
    connected: AtomicBool,
    epoch: AtomicU64,
    session: RwLock<Option<String>>,
}

impl Shared {
    /// Flip connectivity to false and drop the session credential.
    async fn mark_down(&self) {
        self.connected.store(false, Ordering::SeqCst);
        metrics::record_connected(false);
        *self.session.write().await = None;
    }

    /// Tear down the socket of `epoch` after its reader stopped.
    async fn teardown(&self, epoch: u64) {
        let mut writer = self.writer.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(epoch, "Stale reader exited, newer connection untouched");
            return;
        }

        if let Some(mut sink) = writer.take() {
            let _ = sink.close().await;
        }
        drop(writer);

        self.mark_down().await;
        tracing::warn!(epoch, "Connection to node lost");
    }
}

/// A single persistent WebSocket to the node.
pub struct Connection {
    url: url::Url,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Create an unconnected handle for `url` (`ws://` or `wss://`).
    pub fn new(url: &str) -> ClientResult<Self> {
        let url = url::Url::parse(url)
            .map_err(|e| ClientError::Connection(format!("Invalid node URL '{}': {}", url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::Connection(format!(
                "Node URL must use ws:// or wss://, got '{}'",
                url
            )));
        }

        Ok(Self {
            url,
            shared: Arc::new(Shared::default()),
            reader: Mutex::new(None),
        })
    }

    /// The node URL.
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Open the socket and start the reader task.
    ///
    /// Responses read from the socket are delivered into `pending`. Fails with
    /// [`ClientError::Connection`] when the node cannot be reached; never retries.
    pub async fn connect(&self, pending: Arc<PendingRequests>) -> ClientResult<()> {
        tracing::info!(url = %self.url, "Connecting to node");

        let (stream, _response) = match timeout(CONNECT_TIMEOUT, connect_async(self.url.as_str())).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return Err(ClientError::Connection(format!(
                    "Failed to connect to WebSocket at {}: {}",
                    self.url, e
                )))
            }
            Err(_) => {
                return Err(ClientError::Connection(format!(
                    "Timed out connecting to {} after {}s",
                    self.url,
                    CONNECT_TIMEOUT.as_secs()
                )))
            }
        };
        let (sink, source) = stream.split();

        let epoch = {
            let mut writer = self.shared.writer.lock().await;
            let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(mut previous) = writer.replace(sink) {
                let _ = previous.close().await;
            }
            self.shared.connected.store(true, Ordering::SeqCst);
            epoch
        };
        *self.shared.session.write().await = None;
        metrics::record_connected(true);

        let handle = tokio::spawn(read_loop(self.shared.clone(), source, pending, epoch));
        if let Some(previous) = self.reader.lock().await.replace(handle) {
            previous.abort();
        }

        tracing::info!(url = %self.url, epoch, "WebSocket connection established");
        Ok(())
    }

    /// Close the socket. Closing an already-closed connection is not an error.
    pub async fn close(&self) -> ClientResult<()> {
        self.shared.connected.store(false, Ordering::SeqCst);

        let sink = {
            let mut writer = self.shared.writer.lock().await;
            self.shared.epoch.fetch_add(1, Ordering::SeqCst);
            writer.take()
        };
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "Error while closing socket");
            }
            metrics::record_connected(false);
            tracing::info!(url = %self.url, "Connection closed");
        }

        *self.shared.session.write().await = None;
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    /// Current connectivity flag. Never blocks.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Write one text frame within `deadline`, including the wait for the write
    /// lock. A failed or stalled write marks the connection down.
    pub async fn send_text(&self, frame: String, deadline: Duration) -> ClientResult<()> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let write = async {
            let mut writer = self.shared.writer.lock().await;
            let sink = writer.as_mut().ok_or(ClientError::NotConnected)?;
            sink.send(Message::text(frame))
                .await
                .map_err(|e| ClientError::Send(format!("Failed to send message: {}", e)))
        };

        let err = match timeout(deadline, write).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(ClientError::NotConnected)) => return Err(ClientError::NotConnected),
            Ok(Err(e)) => e,
            Err(_) => ClientError::Send(format!(
                "Write did not complete within {} ms",
                deadline.as_millis()
            )),
        };
        self.shared.mark_down().await;
        Err(err)
    }

    /// Session credential issued for this socket, if authenticated.
    pub async fn session(&self) -> Option<String> {
        self.shared.session.read().await.clone()
    }

    /// Store the session credential for this socket.
    pub async fn set_session(&self, token: Option<String>) {
        *self.shared.session.write().await = token;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url.as_str())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Consume every inbound frame until the socket fails or closes.
async fn read_loop(shared: Arc<Shared>, mut source: WsSource, pending: Arc<PendingRequests>, epoch: u64) {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => dispatch_frame(text.as_str(), &pending),
            Some(Ok(Message::Binary(bytes))) => {
                tracing::warn!(len = bytes.len(), "Ignoring binary frame");
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(frame = ?frame, "Node closed the connection");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::error!(error = %e, "Failed to read WebSocket message");
                break;
            }
            None => {
                tracing::info!("WebSocket stream ended");
                break;
            }
        }
    }

    shared.teardown(epoch).await;
}

/// Decode one text frame and route a response to its waiter.
fn dispatch_frame(text: &str, pending: &PendingRequests) {
    let message = match RpcMessage::decode(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid response format");
            return;
        }
    };

    match message.response() {
        Ok(Some(response)) => {
            if response.is_error() {
                tracing::error!(
                    request_id = response.request_id,
                    error = %response.error_message(),
                    "Node returned error"
                );
            } else {
                tracing::debug!(
                    request_id = response.request_id,
                    method = %response.method,
                    "Received response"
                );
            }
            pending.deliver(response);
        }
        Ok(None) => {
            tracing::debug!("Ignoring frame without response tuple");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Invalid response format");
        }
    }
}
