use std::num::NonZeroU64;
use std::time::Duration;

use serde::Deserialize;

use crate::model::gateway::deserialize_snowflake;
use crate::model::track::duration_from_millis;

/// Player state update, sent periodically for every player of the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    /// Guild the player belongs to.
    #[serde(deserialize_with = "deserialize_snowflake")]
    pub guild_id: NonZeroU64,
    pub state: PlayerState
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PlayerState {
    /// Unix timestamp in milliseconds when the state was taken.
    #[serde(default)]
    pub time: u64,
    /// Position of the track.
    #[serde(default, deserialize_with = "duration_from_millis")]
    pub position: Duration,
    /// Whether if the node is connected to the voice gateway.
    #[serde(default)]
    pub connected: bool,
    /// Ping of the voice connection in milliseconds, -1 when not connected.
    #[serde(default)]
    pub ping: i64
}
