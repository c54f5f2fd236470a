// Wire protocol DTOs and conversions for the local window bus and the relay.
// Both are JSON objects discriminated by a kebab-case `type` field.

use crate::domain::math::Vec3;
use crate::domain::object::{ObjectId, PropsPatch, SceneObject};
use crate::domain::window::WindowRect;
use crate::use_cases::types::{BusEnvelope, BusMessage, ObjectEvent, RelayInbound, RelayOutbound};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug)]
pub enum ProtocolError {
    Json(serde_json::Error),
    /// A well-formed message that is not valid in this direction.
    Unexpected(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Json(e) => write!(f, "malformed message: {e}"),
            ProtocolError::Unexpected(kind) => write!(f, "unexpected {kind} message"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Json(e)
    }
}

/// Local bus envelope: `{ "sender": ..., "type": ..., ...fields }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEnvelopeDto {
    pub sender: String,
    #[serde(flatten)]
    pub message: BusMessageDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum BusMessageDto {
    ObjectAdd { object: SceneObject },
    ObjectMove { id: ObjectId, position: Vec3 },
    ObjectUpdate { id: ObjectId, properties: PropsPatch },
    ObjectRemove { id: ObjectId },
    ObjectRequest,
    WindowAnnounce { label: String, bounds: WindowRect },
    WindowUpdate { label: String, bounds: WindowRect },
    WindowClose { label: String },
}

impl From<BusEnvelope> for BusEnvelopeDto {
    fn from(envelope: BusEnvelope) -> Self {
        let message = match envelope.message {
            BusMessage::Object(ObjectEvent::Add { object }) => BusMessageDto::ObjectAdd { object },
            BusMessage::Object(ObjectEvent::Move { id, position }) => {
                BusMessageDto::ObjectMove { id, position }
            }
            BusMessage::Object(ObjectEvent::Update { id, properties }) => {
                BusMessageDto::ObjectUpdate { id, properties }
            }
            BusMessage::Object(ObjectEvent::Remove { id }) => BusMessageDto::ObjectRemove { id },
            BusMessage::ObjectRequest => BusMessageDto::ObjectRequest,
            BusMessage::WindowAnnounce { label, bounds } => {
                BusMessageDto::WindowAnnounce { label, bounds }
            }
            BusMessage::WindowUpdate { label, bounds } => BusMessageDto::WindowUpdate { label, bounds },
            BusMessage::WindowClose { label } => BusMessageDto::WindowClose { label },
        };
        Self {
            sender: envelope.sender,
            message,
        }
    }
}

impl From<BusEnvelopeDto> for BusEnvelope {
    fn from(dto: BusEnvelopeDto) -> Self {
        let message = match dto.message {
            BusMessageDto::ObjectAdd { object } => BusMessage::Object(ObjectEvent::Add { object }),
            BusMessageDto::ObjectMove { id, position } => {
                BusMessage::Object(ObjectEvent::Move { id, position })
            }
            BusMessageDto::ObjectUpdate { id, properties } => {
                BusMessage::Object(ObjectEvent::Update { id, properties })
            }
            BusMessageDto::ObjectRemove { id } => BusMessage::Object(ObjectEvent::Remove { id }),
            BusMessageDto::ObjectRequest => BusMessage::ObjectRequest,
            BusMessageDto::WindowAnnounce { label, bounds } => {
                BusMessage::WindowAnnounce { label, bounds }
            }
            BusMessageDto::WindowUpdate { label, bounds } => BusMessage::WindowUpdate { label, bounds },
            BusMessageDto::WindowClose { label } => BusMessage::WindowClose { label },
        };
        Self {
            sender: dto.sender,
            message,
        }
    }
}

pub fn encode_bus(envelope: BusEnvelope) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&BusEnvelopeDto::from(envelope))?)
}

pub fn decode_bus(text: &str) -> Result<BusEnvelope, ProtocolError> {
    let dto: BusEnvelopeDto = serde_json::from_str(text)?;
    Ok(dto.into())
}

/// Every message exchanged with the relay, in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RelayMessage {
    Connect { code: String },
    Connected { code: String },
    ConnectError { message: String },
    Heartbeat { code: String },
    MergeRequest { from_code: String, to_code: String },
    MergeObjects { from_code: String, objects: Vec<SceneObject> },
    MergeError { message: String },
    UniverseMerged { code: String },
    UniverseDisconnected { code: String },
    ObjectAdd { code: String, object: SceneObject },
    ObjectMove { code: String, id: ObjectId, position: Vec3 },
    ObjectUpdate { code: String, id: ObjectId, properties: PropsPatch },
    ObjectRemove { code: String, id: ObjectId },
}

impl RelayMessage {
    fn object(code: String, event: ObjectEvent) -> Self {
        match event {
            ObjectEvent::Add { object } => RelayMessage::ObjectAdd { code, object },
            ObjectEvent::Move { id, position } => RelayMessage::ObjectMove { code, id, position },
            ObjectEvent::Update { id, properties } => {
                RelayMessage::ObjectUpdate { code, id, properties }
            }
            ObjectEvent::Remove { id } => RelayMessage::ObjectRemove { code, id },
        }
    }

    /// Splits an object message into its code and event.
    pub fn into_object_event(self) -> Result<(String, ObjectEvent), Self> {
        match self {
            RelayMessage::ObjectAdd { code, object } => Ok((code, ObjectEvent::Add { object })),
            RelayMessage::ObjectMove { code, id, position } => {
                Ok((code, ObjectEvent::Move { id, position }))
            }
            RelayMessage::ObjectUpdate {
                code,
                id,
                properties,
            } => Ok((code, ObjectEvent::Update { id, properties })),
            RelayMessage::ObjectRemove { code, id } => Ok((code, ObjectEvent::Remove { id })),
            other => Err(other),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Connect { .. } => "connect",
            RelayMessage::Connected { .. } => "connected",
            RelayMessage::ConnectError { .. } => "connect-error",
            RelayMessage::Heartbeat { .. } => "heartbeat",
            RelayMessage::MergeRequest { .. } => "merge-request",
            RelayMessage::MergeObjects { .. } => "merge-objects",
            RelayMessage::MergeError { .. } => "merge-error",
            RelayMessage::UniverseMerged { .. } => "universe-merged",
            RelayMessage::UniverseDisconnected { .. } => "universe-disconnected",
            RelayMessage::ObjectAdd { .. } => "object-add",
            RelayMessage::ObjectMove { .. } => "object-move",
            RelayMessage::ObjectUpdate { .. } => "object-update",
            RelayMessage::ObjectRemove { .. } => "object-remove",
        }
    }
}

impl From<RelayOutbound> for RelayMessage {
    fn from(message: RelayOutbound) -> Self {
        match message {
            RelayOutbound::Connect { code } => RelayMessage::Connect { code },
            RelayOutbound::Heartbeat { code } => RelayMessage::Heartbeat { code },
            RelayOutbound::MergeRequest { from_code, to_code } => {
                RelayMessage::MergeRequest { from_code, to_code }
            }
            RelayOutbound::Object { code, event } => RelayMessage::object(code, event),
        }
    }
}

impl From<RelayInbound> for RelayMessage {
    fn from(message: RelayInbound) -> Self {
        match message {
            RelayInbound::Connected { code } => RelayMessage::Connected { code },
            RelayInbound::ConnectError { message } => RelayMessage::ConnectError { message },
            RelayInbound::MergeObjects { from_code, objects } => {
                RelayMessage::MergeObjects { from_code, objects }
            }
            RelayInbound::MergeError { message } => RelayMessage::MergeError { message },
            RelayInbound::UniverseMerged { code } => RelayMessage::UniverseMerged { code },
            RelayInbound::UniverseDisconnected { code } => {
                RelayMessage::UniverseDisconnected { code }
            }
            RelayInbound::Object { code, event } => RelayMessage::object(code, event),
        }
    }
}

/// Client side: what the relay may send us.
impl TryFrom<RelayMessage> for RelayInbound {
    type Error = ProtocolError;

    fn try_from(message: RelayMessage) -> Result<Self, Self::Error> {
        let message = match message.into_object_event() {
            Ok((code, event)) => return Ok(RelayInbound::Object { code, event }),
            Err(other) => other,
        };
        match message {
            RelayMessage::Connected { code } => Ok(RelayInbound::Connected { code }),
            RelayMessage::ConnectError { message } => Ok(RelayInbound::ConnectError { message }),
            RelayMessage::MergeObjects { from_code, objects } => {
                Ok(RelayInbound::MergeObjects { from_code, objects })
            }
            RelayMessage::MergeError { message } => Ok(RelayInbound::MergeError { message }),
            RelayMessage::UniverseMerged { code } => Ok(RelayInbound::UniverseMerged { code }),
            RelayMessage::UniverseDisconnected { code } => {
                Ok(RelayInbound::UniverseDisconnected { code })
            }
            other => Err(ProtocolError::Unexpected(other.kind())),
        }
    }
}

/// Server side: what a client may send the relay.
impl TryFrom<RelayMessage> for RelayOutbound {
    type Error = ProtocolError;

    fn try_from(message: RelayMessage) -> Result<Self, Self::Error> {
        let message = match message.into_object_event() {
            Ok((code, event)) => return Ok(RelayOutbound::Object { code, event }),
            Err(other) => other,
        };
        match message {
            RelayMessage::Connect { code } => Ok(RelayOutbound::Connect { code }),
            RelayMessage::Heartbeat { code } => Ok(RelayOutbound::Heartbeat { code }),
            RelayMessage::MergeRequest { from_code, to_code } => {
                Ok(RelayOutbound::MergeRequest { from_code, to_code })
            }
            other => Err(ProtocolError::Unexpected(other.kind())),
        }
    }
}

pub fn encode_relay(message: impl Into<RelayMessage>) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&message.into())?)
}

pub fn decode_relay(text: &str) -> Result<RelayMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
