pub mod event;
pub mod ready;
pub mod stats;
pub mod state;

use std::num::NonZeroU64;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Payloads that can be received from the node.
#[derive(Debug, Clone)]
pub enum IncomingPayload {
    Ready(ready::Ready),
    Stats(stats::Stats),
    PlayerUpdate(state::PlayerUpdate),
    Event(event::Event),
    /// Any payload the client doesn't know about.
    Unknown(Value)
}

impl IncomingPayload {
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(data)?)
    }

    /// Decodes a payload by its `op` field.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let op = value.get("op").and_then(Value::as_str).unwrap_or_default();

        Ok(match op {
            "ready" => Self::Ready(Deserialize::deserialize(&value)?),
            "stats" => Self::Stats(Deserialize::deserialize(&value)?),
            "playerUpdate" => Self::PlayerUpdate(Deserialize::deserialize(&value)?),
            "event" => match event::Event::deserialize(&value) {
                Ok(event) => Self::Event(event),
                Err(_) => Self::Unknown(value)
            },
            _ => Self::Unknown(value)
        })
    }
}

/// Reads a discord id sent either as a string or as a number.
pub(crate) fn deserialize_snowflake<'de, D>(deserializer: D) -> Result<NonZeroU64, D::Error>
where
    D: Deserializer<'de>
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Snowflake {
        Text(String),
        Number(u64)
    }

    let raw = match Snowflake::deserialize(deserializer)? {
        Snowflake::Text(t) => t.parse::<u64>().map_err(serde::de::Error::custom)?,
        Snowflake::Number(n) => n
    };

    NonZeroU64::new(raw).ok_or_else(|| serde::de::Error::custom("id can't be zero"))
}
