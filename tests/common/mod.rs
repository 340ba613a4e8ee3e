//! Shared utilities for integration testing: an in-process mock node.

#![allow(dead_code)]

use clearnode_faucet::clearnode::envelope::{now_millis, RpcMessage, RpcResponse};
use clearnode_faucet::clearnode::{ClearnodeClient, ClientConfig, Identities, Identity};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;

/// A request as the mock node saw it on the wire.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub request_id: u64,
    pub method: String,
    pub params: Value,
    /// Exact bytes of the `req` tuple.
    pub payload: Vec<u8>,
    pub sig: Vec<String>,
}

/// What the mock node does with one request.
pub enum Reply {
    /// Answer with `(method, data)`.
    Respond(String, Value),
    /// Answer after a delay.
    Delayed(Duration, String, Value),
    /// Never answer.
    Ignore,
    /// Drop the connection instead of answering.
    Disconnect,
}

impl Reply {
    pub fn ok(method: &str, data: Value) -> Self {
        Reply::Respond(method.to_string(), data)
    }

    pub fn error(message: &str) -> Self {
        Reply::Respond("error".to_string(), json!({ "error": message }))
    }
}

pub type Handler = Arc<dyn Fn(&ReceivedRequest) -> Reply + Send + Sync>;

/// Happy-path node: authenticates anyone, lists usdc (6 decimals) with a
/// balance of 1 000 000 000 and accepts every transfer as `tx-1`.
pub fn default_reply(request: &ReceivedRequest) -> Reply {
    match request.method.as_str() {
        "auth_request" => Reply::ok(
            "auth_challenge",
            json!({ "challenge_message": format!("challenge-{}", request.request_id) }),
        ),
        "auth_verify" => Reply::ok(
            "auth_verify",
            json!({ "success": true, "jwt_token": "jwt-test-token" }),
        ),
        "get_assets" => Reply::ok(
            "get_assets",
            json!({ "assets": [
                { "token": "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238", "chain_id": 11155111, "symbol": "usdc", "decimals": 6 }
            ]}),
        ),
        "get_ledger_balances" => Reply::ok(
            "get_ledger_balances",
            json!({ "ledger_balances": [ { "asset": "usdc", "amount": "1000000000" } ] }),
        ),
        "transfer" => Reply::ok("transfer", json!({ "transactions": [ { "id": "tx-1" } ] })),
        other => Reply::error(&format!("unknown method {}", other)),
    }
}

/// In-process WebSocket node.
pub struct MockNode {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
    connections: Arc<AtomicUsize>,
    kill: broadcast::Sender<()>,
}

impl MockNode {
    /// Start a node answering with `default_reply`.
    pub async fn start() -> Self {
        Self::with_handler(default_reply).await
    }

    /// Start a node with a custom handler.
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&ReceivedRequest) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler: Handler = Arc::new(handler);
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (kill, _) = broadcast::channel(4);

        let node = Self {
            addr,
            received: received.clone(),
            connections: connections.clone(),
            kill: kill.clone(),
        };

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_connection(
                    ws,
                    handler.clone(),
                    received.clone(),
                    kill.subscribe(),
                ));
            }
        });

        node
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Requests received so far, in arrival order.
    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_method(&self, method: &str) -> Vec<ReceivedRequest> {
        self.received()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    /// Number of sockets accepted.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Abruptly drop every open socket.
    pub fn disconnect_all(&self) {
        let _ = self.kill.send(());
    }
}

async fn serve_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    handler: Handler,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
    mut kill: broadcast::Receiver<()>,
) {
    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        let frame = tokio::select! {
            _ = kill.recv() => break,
            frame = source.next() => frame,
        };
        let text = match frame {
            Some(Ok(Message::Text(text))) => text.as_str().to_string(),
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
            Some(Ok(_)) => continue,
        };

        let Ok(message) = RpcMessage::decode(&text) else {
            continue;
        };
        let Ok(Some(request)) = message.request() else {
            continue;
        };
        let request = ReceivedRequest {
            request_id: request.request_id,
            method: request.method,
            params: request.params,
            payload: message.request_payload().unwrap_or_default().to_vec(),
            sig: message.sig.clone(),
        };
        received.lock().unwrap().push(request.clone());

        match handler(&request) {
            Reply::Respond(method, data) => {
                let _ = tx.send(encode_response(request.request_id, &method, data));
            }
            Reply::Delayed(delay, method, data) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(encode_response(request.request_id, &method, data));
                });
            }
            Reply::Ignore => {}
            Reply::Disconnect => break,
        }
    }

    // Stop the writer without waiting for delayed replies.
    writer.abort();
}

fn encode_response(request_id: u64, method: &str, data: Value) -> String {
    RpcResponse {
        request_id,
        method: method.to_string(),
        data: data.as_object().cloned().unwrap_or_default(),
        timestamp: now_millis(),
    }
    .to_message()
    .unwrap()
    .encode()
    .unwrap()
}

// Anvil's first two well-known accounts. Never use for real funds.
pub const OWNER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const SIGNER_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub fn identities() -> Identities {
    Identities::new(
        Identity::from_private_key(OWNER_KEY).unwrap(),
        Identity::from_private_key(SIGNER_KEY).unwrap(),
    )
    .unwrap()
}

/// A client for `node` with a short response timeout.
pub fn client_for(node: &MockNode, response_timeout: Duration) -> ClearnodeClient {
    let mut config = ClientConfig::new(node.url());
    config.response_timeout = response_timeout;
    ClearnodeClient::new(identities(), config).unwrap()
}

/// A URL nothing listens on.
pub async fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/ws", addr)
}

/// Poll `condition` for up to two seconds.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
