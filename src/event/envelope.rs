//! # Wire Envelopes
//!
//! Messages crossing the frame boundary are plain JSON objects discriminated
//! by their `type` field.
//!
//! ```text
//! frame ──▶ parent   { type: "IFRAME_EVENT", action, eventId, timestamp, payload }
//! parent ──▶ frame   { type: "IFRAME_EVENT_RESPONSE", eventId, success, data?, error? }
//! ```
//!
//! The parent must echo `eventId` unchanged. Anything else arriving on the
//! inbound side is dropped without error.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{timestamp::Timestamp, MessengerError, MessengerResult};

/// Discriminator of outbound requests.
pub const REQUEST_TYPE: &str = "IFRAME_EVENT";
/// Discriminator of inbound responses.
pub const RESPONSE_TYPE: &str = "IFRAME_EVENT_RESPONSE";

/// Correlation key tying a request to its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Fresh identifier backed by a random (v4) UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request posted from the frame to its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    pub event_id: RequestId,
    pub timestamp: Timestamp,
    pub payload: Map<String, Value>,
}

impl RequestEnvelope {
    /// Builds a request whose payload starts with a default `message` field.
    /// Caller fields are merged on top and win on key collision.
    pub fn new(action: &str, event_id: RequestId, payload: Option<Map<String, Value>>) -> Self {
        let mut merged = Map::new();
        merged.insert(
            "message".to_string(),
            Value::String(format!("{} event triggered", action)),
        );
        if let Some(payload) = payload {
            merged.extend(payload);
        }

        Self {
            kind: REQUEST_TYPE.to_string(),
            action: action.to_string(),
            event_id,
            timestamp: Timestamp::now(),
            payload: merged,
        }
    }

    /// Parses an outbound message as seen by the parent. Returns `None` for
    /// anything that is not a well-formed request.
    pub fn from_message(message: &Value) -> Option<Self> {
        if message.get("type").and_then(Value::as_str) != Some(REQUEST_TYPE) {
            return None;
        }
        serde_json::from_value(message.clone()).ok()
    }

    pub fn to_message(&self) -> MessengerResult<Value> {
        serde_json::to_value(self).map_err(|e| MessengerError::InvalidPayload(e.to_string()))
    }
}

/// Outcome delivered for a request.
///
/// `success: false` is an application-level result, not a transport failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<T = Value> {
    pub event_id: RequestId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ResponseEnvelope<T> {
    pub fn success(event_id: RequestId, data: Option<T>) -> Self {
        Self {
            event_id,
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(event_id: RequestId, error: Option<String>) -> Self {
        Self {
            event_id,
            success: false,
            data: None,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Keeps only the fields meaningful for the outcome: `data` on success,
    /// `error` on failure.
    pub fn normalized(self) -> Self {
        if self.success {
            Self::success(self.event_id, self.data)
        } else {
            Self::failure(self.event_id, self.error)
        }
    }
}

impl ResponseEnvelope<Value> {
    /// Extracts a response from an arbitrary inbound message.
    ///
    /// Never fails: messages with another `type`, a missing or non-string
    /// `eventId`, or a non-object shape yield `None`. A missing or
    /// non-boolean `success` counts as failure and `data: null` as absent.
    pub fn from_message(message: &Value) -> Option<Self> {
        let object = message.as_object()?;
        if object.get("type").and_then(Value::as_str) != Some(RESPONSE_TYPE) {
            return None;
        }
        let event_id = object.get("eventId")?.as_str()?;
        let success = object
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let data = object.get("data").filter(|v| !v.is_null()).cloned();
        let error = object
            .get("error")
            .and_then(Value::as_str)
            .map(String::from);

        let envelope = Self {
            event_id: RequestId::from(event_id),
            success,
            data,
            error,
        };
        Some(envelope.normalized())
    }

    /// Wire form as posted by the parent.
    pub fn to_message(&self) -> Value {
        let mut message = json!({
            "type": RESPONSE_TYPE,
            "eventId": self.event_id,
            "success": self.success,
        });
        if let Some(data) = &self.data {
            message["data"] = data.clone();
        }
        if let Some(error) = &self.error {
            message["error"] = Value::String(error.clone());
        }
        message
    }

    /// Decodes `data` into a concrete type. Failure envelopes pass through.
    pub fn decode<T: DeserializeOwned>(self) -> MessengerResult<ResponseEnvelope<T>> {
        let data = self.data.map(serde_json::from_value).transpose()?;
        Ok(ResponseEnvelope {
            event_id: self.event_id,
            success: self.success,
            data,
            error: self.error,
        })
    }
}
