use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::ProjectedRow;

/// Marker value sent once a session has replayed every row
pub const STREAM_END: &str = "[STREAM_END]";

/// Event name used for every server-to-client payload
pub const DATA_EVENT: &str = "data";

/// Payload pushed to a client
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// `{ "time": ..., "sensorN": ... }`
    Row(ProjectedRow),
    /// `{ "message": "[STREAM_END]" }`
    End,
    /// `{ "error": ... }`
    Error(String),
}

impl Emission {
    pub fn is_row(&self) -> bool {
        matches!(self, Emission::Row(_))
    }

    /// Wrap in the `{ "event": "data", "data": ... }` envelope
    pub fn to_frame(&self) -> serde_json::Result<String> {
        #[derive(serde::Serialize)]
        struct Frame<'a> {
            event: &'static str,
            data: &'a Emission,
        }

        serde_json::to_string(&Frame {
            event: DATA_EVENT,
            data: self,
        })
    }
}

impl Serialize for Emission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Emission::Row(row) => row.serialize(serializer),
            Emission::End => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("message", STREAM_END)?;
                map.end()
            }
            Emission::Error(error) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Payload of a `requestSensors` command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRequest {
    #[serde(default)]
    pub sensor_query: String,
    #[serde(default)]
    pub interval_duration: Option<u64>,
}

/// Commands a client can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    RequestSensors(SensorRequest),
    StopSensors,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown event '{0}'")]
    UnknownEvent(String),
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ClientCommand {
    /// Parse a `{ "event": ..., "data": ... }` text frame
    pub fn from_frame(text: &str) -> Result<Self, ProtocolError> {
        let frame: RawFrame = serde_json::from_str(text)?;

        match frame.event.as_str() {
            "requestSensors" => {
                let data = if frame.data.is_null() {
                    Value::Object(Default::default())
                } else {
                    frame.data
                };
                Ok(ClientCommand::RequestSensors(serde_json::from_value(data)?))
            }
            "stopSensors" => Ok(ClientCommand::StopSensors),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}
