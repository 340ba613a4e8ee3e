//! Wire envelope for the node's JSON RPC.
//!
//! # Wire Format
//! ```text
//! request:  {"req": [request_id, method, params, timestamp_ms], "sig": ["0x…"]}
//! response: {"res": [request_id, method, data, timestamp_ms], "sig": [...]}
//! ```
//!
//! The `req` tuple is serialized once; those exact bytes are signed and then
//! embedded verbatim in the envelope, so the node hashes the same bytes the
//! client signed.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::clearnode::error::{ClientError, ClientResult};
use crate::clearnode::types::{self, methods};

/// Envelope exchanged over the socket. Exactly one of `req` / `res` is set.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req: Option<Box<RawValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res: Option<Box<RawValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    #[serde(default)]
    pub sig: Vec<String>,
}

impl RpcMessage {
    /// Decode one inbound text frame.
    pub fn decode(text: &str) -> ClientResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| ClientError::Protocol(format!("Invalid envelope: {}", e)))
    }

    /// Encode for the wire.
    pub fn encode(&self) -> ClientResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ClientError::Protocol(format!("Failed to encode envelope: {}", e)))
    }

    /// Wrap an already-serialized request payload with its signatures.
    pub fn signed_request(payload: &[u8], signatures: Vec<String>) -> ClientResult<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| ClientError::Protocol(format!("Payload is not UTF-8: {}", e)))?;
        let raw = RawValue::from_string(text.to_owned())
            .map_err(|e| ClientError::Protocol(format!("Payload is not valid JSON: {}", e)))?;

        Ok(Self {
            req: Some(raw),
            res: None,
            sid: None,
            sig: signatures,
        })
    }

    /// Exact bytes of the `req` tuple, as they appear on the wire.
    pub fn request_payload(&self) -> Option<&[u8]> {
        self.req.as_ref().map(|raw| raw.get().as_bytes())
    }

    /// Decode the `req` tuple, if present.
    pub fn request(&self) -> ClientResult<Option<RpcRequest>> {
        let Some(raw) = &self.req else {
            return Ok(None);
        };
        let (request_id, method, params, timestamp): (u64, String, Value, u64) =
            serde_json::from_str(raw.get())
                .map_err(|e| ClientError::Protocol(format!("Invalid request tuple: {}", e)))?;
        Ok(Some(RpcRequest {
            request_id,
            method,
            params,
            timestamp,
        }))
    }

    /// Decode the `res` tuple, if present. Elements past the fourth are ignored.
    pub fn response(&self) -> ClientResult<Option<RpcResponse>> {
        let Some(raw) = &self.res else {
            return Ok(None);
        };
        let fields: Vec<Value> = serde_json::from_str(raw.get())
            .map_err(|e| ClientError::Protocol(format!("Invalid response tuple: {}", e)))?;
        RpcResponse::from_fields(fields).map(Some)
    }
}

/// Outbound call: `(request_id, method, params, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub request_id: u64,
    pub method: String,
    pub params: Value,
    pub timestamp: u64,
}

impl RpcRequest {
    /// Build a request stamped with the current time.
    pub fn new(request_id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            request_id,
            method: method.into(),
            params,
            timestamp: now_millis(),
        }
    }

    /// Serialize the tuple. The same request always yields the same bytes.
    pub fn payload_bytes(&self) -> ClientResult<Vec<u8>> {
        serde_json::to_vec(&(self.request_id, &self.method, &self.params, self.timestamp))
            .map_err(|e| ClientError::Protocol(format!("Failed to serialize request: {}", e)))
    }
}

/// Inbound response: `(request_id, method, data, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub request_id: u64,
    pub method: String,
    pub data: Map<String, Value>,
    pub timestamp: u64,
}

impl RpcResponse {
    fn from_fields(fields: Vec<Value>) -> ClientResult<Self> {
        if fields.len() < 4 {
            return Err(ClientError::Protocol(format!(
                "Invalid response tuple: expected at least 4 elements, got {}",
                fields.len()
            )));
        }
        let mut fields = fields.into_iter();
        let (Some(id), Some(method), Some(data), Some(timestamp)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(ClientError::Protocol("Invalid response tuple".into()));
        };

        let request_id = id
            .as_u64()
            .ok_or_else(|| ClientError::Protocol(format!("Invalid response request id: {}", id)))?;
        let Value::String(method) = method else {
            return Err(ClientError::Protocol(format!("Invalid response method: {}", method)));
        };
        let Value::Object(data) = data else {
            return Err(ClientError::Protocol(format!("Invalid response data: {}", data)));
        };
        let timestamp = timestamp.as_u64().ok_or_else(|| {
            ClientError::Protocol(format!("Invalid response timestamp: {}", timestamp))
        })?;

        Ok(Self {
            request_id,
            method,
            data,
            timestamp,
        })
    }

    /// Whether the node reported a protocol-level failure.
    pub fn is_error(&self) -> bool {
        self.method == methods::ERROR
    }

    /// The node's error message for an `"error"` response.
    pub fn error_message(&self) -> String {
        types::error_message(&self.data)
    }

    /// Encode as a `res` envelope (used by node-side tooling and tests).
    pub fn to_message(&self) -> ClientResult<RpcMessage> {
        let tuple = (self.request_id, &self.method, &self.data, self.timestamp);
        let raw = serde_json::value::to_raw_value(&tuple)
            .map_err(|e| ClientError::Protocol(format!("Failed to serialize response: {}", e)))?;
        Ok(RpcMessage {
            req: None,
            res: Some(raw),
            sid: None,
            sig: Vec::new(),
        })
    }
}

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_is_four_tuple() {
        let request = RpcRequest {
            request_id: 3,
            method: "transfer".to_string(),
            params: json!({"allocations": [{"amount": "10", "asset": "usdc"}], "destination": "0xabc"}),
            timestamp: 1_700_000_000_000,
        };
        let payload = String::from_utf8(request.payload_bytes().unwrap()).unwrap();
        assert_eq!(
            payload,
            r#"[3,"transfer",{"allocations":[{"amount":"10","asset":"usdc"}],"destination":"0xabc"},1700000000000]"#
        );
    }

    #[test]
    fn test_payload_reserialization_is_byte_identical() {
        let request = RpcRequest::new(9, "get_assets", json!({"b": 1, "a": [true, null]}));
        let first = request.payload_bytes().unwrap();

        let message = RpcMessage::signed_request(&first, vec!["0x01".into()]).unwrap();
        let wire = message.encode().unwrap();
        let decoded = RpcMessage::decode(&wire).unwrap();

        assert_eq!(decoded.request_payload().unwrap(), first.as_slice());
        let reparsed = decoded.request().unwrap().unwrap();
        assert_eq!(reparsed, request);
        assert_eq!(reparsed.payload_bytes().unwrap(), first);
    }

    #[test]
    fn test_envelope_field_names() {
        let request = RpcRequest::new(1, "get_assets", json!({}));
        let message =
            RpcMessage::signed_request(&request.payload_bytes().unwrap(), vec!["0xsig".into()])
                .unwrap();
        let value: Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
        assert!(value.get("req").unwrap().is_array());
        assert_eq!(value["sig"], json!(["0xsig"]));
        assert!(value.get("res").is_none());
        assert!(value.get("sid").is_none());
    }

    #[test]
    fn test_decode_response() {
        let text = r#"{"res":[7,"get_assets",{"assets":[]},1700000000001],"sig":[]}"#;
        let response = RpcMessage::decode(text).unwrap().response().unwrap().unwrap();
        assert_eq!(response.request_id, 7);
        assert_eq!(response.method, "get_assets");
        assert!(!response.is_error());
        assert_eq!(response.timestamp, 1_700_000_000_001);
    }

    #[test]
    fn test_decode_error_response() {
        let text = r#"{"res":[8,"error",{"error":"invalid signature"},1]}"#;
        let response = RpcMessage::decode(text).unwrap().response().unwrap().unwrap();
        assert!(response.is_error());
        assert_eq!(response.error_message(), "invalid signature");
    }

    #[test]
    fn test_decode_response_ignores_extra_elements() {
        let text = r#"{"res":[1,"get_assets",{},1,"extra",{"more":true}]}"#;
        let response = RpcMessage::decode(text).unwrap().response().unwrap().unwrap();
        assert_eq!(response.request_id, 1);
        assert_eq!(response.method, "get_assets");
        assert!(response.data.is_empty());
        assert_eq!(response.timestamp, 1);
    }

    #[test]
    fn test_decode_malformed_response_tuple() {
        let message = RpcMessage::decode(r#"{"res":["x","get_assets",{},1]}"#).unwrap();
        assert!(matches!(message.response(), Err(ClientError::Protocol(_))));

        let message = RpcMessage::decode(r#"{"res":[1,"get_assets"]}"#).unwrap();
        assert!(message.response().is_err());

        let message = RpcMessage::decode(r#"{"res":[1,"get_assets",[],1]}"#).unwrap();
        assert!(matches!(message.response(), Err(ClientError::Protocol(_))));

        let message = RpcMessage::decode(r#"{"res":{"id":1}}"#).unwrap();
        assert!(message.response().is_err());

        assert!(RpcMessage::decode("not json").is_err());
    }

    #[test]
    fn test_response_to_message_round_trip() {
        let response = RpcResponse {
            request_id: 11,
            method: "transfer".into(),
            data: json!({"transactions": []}).as_object().cloned().unwrap(),
            timestamp: 5,
        };
        let wire = response.to_message().unwrap().encode().unwrap();
        let decoded = RpcMessage::decode(&wire).unwrap().response().unwrap().unwrap();
        assert_eq!(decoded, response);
    }
}
