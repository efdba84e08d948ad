use std::num::NonZeroU64;
use std::time::Duration;
use serde::Serialize;
use crate::model::connection::VoiceState;
use crate::model::filters::Filters;
use crate::model::track::Track;
use crate::player::{PlayerStatus, RepeatMode};

/// A partial update of a remote player.
///
/// Only the fields that are set are sent to the node.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    /// `Some(None)` clears the current track.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_track: Option<Option<String>>,
    /// Position in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceState>
}

impl PlayerUpdate {
    pub fn play(track: &Track) -> Self {
        Self {
            encoded_track: Some(Some(track.encoded.clone())),
            paused: Some(false),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            encoded_track: Some(None),
            ..Default::default()
        }
    }

    pub fn pause(paused: bool) -> Self {
        Self {
            paused: Some(paused),
            ..Default::default()
        }
    }

    pub fn seek(position: Duration) -> Self {
        Self {
            position: Some(position.as_millis() as _),
            ..Default::default()
        }
    }

    pub fn volume(volume: u16) -> Self {
        Self {
            volume: Some(volume),
            ..Default::default()
        }
    }

    pub fn filters(filters: Filters) -> Self {
        Self {
            filters: Some(filters),
            ..Default::default()
        }
    }

    pub fn voice(voice: VoiceState) -> Self {
        Self {
            voice: Some(voice),
            ..Default::default()
        }
    }

    /// Sets the position the update should start playing at.
    pub fn at(mut self, position: Duration) -> Self {
        self.position = Some(position.as_millis() as _);
        self
    }
}

/// Snapshot of a player.
#[derive(Clone, Debug)]
pub struct PlayerInfo {
    pub guild_id: NonZeroU64,
    /// Identifier of the node the player lives on.
    pub node: String,
    pub status: PlayerStatus,
    pub voice_channel_id: Option<NonZeroU64>,
    pub text_channel_id: Option<NonZeroU64>,
    pub paused: bool,
    pub playing: bool,
    pub volume: u16,
    /// Last position reported by the node.
    pub position: Duration,
    /// Unix timestamp in milliseconds of the last state sent by the node.
    pub timestamp: u64,
    /// Whether if the node is connected to the voice gateway.
    pub connected: bool,
    /// Voice ping in milliseconds, -1 when not connected.
    pub ping: i64,
    pub filters: Filters,
    pub repeat_mode: RepeatMode,
    pub autoplay: bool,
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub history: Vec<Track>
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    #[test]
    fn stop_serializes_null_track() {
        assert_eq!(
            serde_json::to_value(PlayerUpdate::stop()).unwrap(),
            json!({ "encodedTrack": null })
        );
    }

    #[test]
    fn play_at_position() {
        let update = PlayerUpdate::play(&Track::from_encoded("QA")).at(Duration::from_secs(3));

        assert_eq!(
            serde_json::to_value(update).unwrap(),
            json!({ "encodedTrack": "QA", "paused": false, "position": 3000 })
        );
    }
}
