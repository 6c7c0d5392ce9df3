//! Wire envelopes for gate-stream messages.
//!
//! Requests and responses share the wire shape `{id, body}`. Bodies are
//! arbitrary JSON values; binary content is coerced to base64 text with
//! [`bytes_to_body`] before it enters an envelope.

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Correlation token linking a response to the request it answers.
///
/// 32 cryptographically random bytes rendered as 64 hex characters,
/// generated once at request creation and never reused. The distinguished
/// [`CorrelationId::NONE`] value marks an unsolicited push.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Sentinel for responses that answer no request.
    pub const NONE: CorrelationId = CorrelationId(String::new());

    pub fn fresh() -> Self {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        Self(hex::encode(raw))
    }

    /// True for the unsolicited-push sentinel.
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            f.write_str("(none)")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// A request sent from the server endpoint to the worker endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: CorrelationId,
    pub body: serde_json::Value,
}

impl Request {
    /// Build a request with a fresh id.
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            id: CorrelationId::fresh(),
            body,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

/// A response sent from the worker endpoint back to the server endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: CorrelationId,
    pub body: serde_json::Value,
}

impl Response {
    pub fn new(id: CorrelationId, body: serde_json::Value) -> Self {
        Self { id, body }
    }

    /// Build an unsolicited push carrying the sentinel id.
    pub fn push(body: serde_json::Value) -> Self {
        Self::new(CorrelationId::NONE, body)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

/// Render raw bytes as a transport-safe body value (base64 text).
pub fn bytes_to_body(raw: &[u8]) -> serde_json::Value {
    use base64::Engine;
    serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(raw))
}

/// Restore bytes rendered by [`bytes_to_body`].
///
/// `None` when the value is not a base64 string.
pub fn body_to_bytes(body: &serde_json::Value) -> Option<Vec<u8>> {
    use base64::Engine;
    body.as_str()
        .and_then(|text| base64::engine::general_purpose::STANDARD.decode(text).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn fixed_id() -> CorrelationId {
        CorrelationId("ab".repeat(32))
    }

    #[test]
    fn fresh_ids_are_pairwise_distinct() {
        let ids: HashSet<CorrelationId> = (0..100).map(|_| CorrelationId::fresh()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn fresh_id_is_64_hex_chars() {
        let id = CorrelationId::fresh();
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!id.is_none());
    }

    #[test]
    fn sentinel_is_none() {
        assert!(CorrelationId::NONE.is_none());
        assert_eq!(CorrelationId::NONE.as_str(), "");
    }

    #[test]
    fn request_wire_shape_is_id_and_body() {
        let request = Request {
            id: fixed_id(),
            body: json!({"op": "sum", "args": [1, 2]}),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"id": "ab".repeat(32), "body": {"op": "sum", "args": [1, 2]}})
        );
    }

    #[test]
    fn request_round_trips_through_bytes() {
        let request = Request::new(json!({"key": "value"}));
        let decoded = Request::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded.id, request.id);
        assert_eq!(decoded.body, request.body);
    }

    #[test]
    fn response_round_trips_through_bytes() {
        let response = Response::new(fixed_id(), json!([1, 2, 3]));
        let decoded = Response::decode(&response.encode().unwrap()).unwrap();
        assert_eq!(decoded.id, response.id);
        assert_eq!(decoded.body, response.body);
    }

    #[test]
    fn push_response_serializes() {
        let response = Response::push(json!("ping"));
        insta::assert_json_snapshot!(response, @r#"
        {
          "id": "",
          "body": "ping"
        }
        "#);
    }

    #[test]
    fn byte_bodies_round_trip_through_base64() {
        let raw = [0u8, 1, 2, 254, 255];
        let body = bytes_to_body(&raw);
        assert!(body.is_string());
        assert_eq!(body_to_bytes(&body).unwrap(), raw);
    }

    #[test]
    fn non_string_body_is_not_bytes() {
        assert!(body_to_bytes(&json!(42)).is_none());
    }
}
