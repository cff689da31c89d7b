use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::name::EventName;
use crate::error::DecodeError;
use crate::sse::SseFrame;

/// Event names the backend uses purely as keep-alives.
const KEEPALIVE_EVENTS: &[&str] = &["ping", "heartbeat"];

/// The unit delivered to bus listeners: a name and an opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub name: EventName,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Wire shape of a frame that carries its name inside the JSON body.
#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(alias = "event", alias = "type")]
    name: Option<String>,
    #[serde(default, alias = "data")]
    payload: Value,
}

impl EventEnvelope {
    pub fn new(name: impl Into<EventName>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Decode one SSE frame.
    ///
    /// A named frame (`event: x`) carries its payload as the data field; an
    /// empty data field yields a `null` payload. An unnamed frame, or one
    /// named `message`, must carry a `{"name": .., "payload": ..}` envelope.
    pub fn from_frame(frame: &SseFrame) -> Result<Self, DecodeError> {
        let envelope = match frame.event.as_deref() {
            Some(name) if !name.is_empty() && name != "message" => {
                let payload = if frame.data.trim().is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(&frame.data)
                        .map_err(|e| DecodeError::invalid_json(name, &e))?
                };
                EventEnvelope::new(name, payload)
            }
            _ => {
                let wire: WireEnvelope = serde_json::from_str(&frame.data)
                    .map_err(|e| DecodeError::invalid_json("message", &e))?;
                match wire.name {
                    Some(name) if !name.is_empty() => EventEnvelope::new(name, wire.payload),
                    _ => return Err(DecodeError::MissingName),
                }
            }
        };

        Ok(match &frame.id {
            Some(id) => envelope.with_id(id.clone()),
            None => envelope,
        })
    }

    /// Deserialize the payload into a concrete type.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        decode_payload(self.name.as_str(), &self.payload)
    }

    /// Keep-alive frames reset the idle timer but are never published.
    pub fn is_keepalive(&self) -> bool {
        KEEPALIVE_EVENTS.contains(&self.name.as_str())
    }
}

pub(crate) fn decode_payload<T: DeserializeOwned>(
    event: &str,
    payload: &Value,
) -> Result<T, DecodeError> {
    // `T::deserialize(&Value)` avoids cloning the payload tree
    T::deserialize(payload).map_err(|e| DecodeError::payload_mismatch(event, &e))
}
