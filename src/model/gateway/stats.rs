use std::time::Duration;
use serde::Deserialize;
use crate::model::track::duration_from_millis;

/// Load statistics periodically sent by the node.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    /// Number of players on the node.
    pub players: u64,
    /// Number of players currently playing.
    pub playing_players: u64,
    /// Uptime of the node.
    #[serde(deserialize_with = "duration_from_millis")]
    pub uptime: Duration,
    pub memory: MemoryStats,
    pub cpu: CpuStats,
    /// Frame statistics, only present when players exist.
    pub frame_stats: Option<FrameStats>
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MemoryStats {
    /// Free memory in bytes.
    pub free: u64,
    /// Used memory in bytes.
    pub used: u64,
    /// Allocated memory in bytes.
    pub allocated: u64,
    /// Reservable memory in bytes.
    pub reservable: u64
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuStats {
    /// Number of cores.
    pub cores: u32,
    /// Total system load.
    pub system_load: f64,
    /// Load caused by the node.
    #[serde(alias = "nodeLoad")]
    pub lavalink_load: f64
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FrameStats {
    /// Frames sent to discord in the last minute.
    pub sent: i64,
    /// Frames nulled in the last minute.
    pub nulled: i64,
    /// Frames that were missing in the last minute.
    pub deficit: i64
}
