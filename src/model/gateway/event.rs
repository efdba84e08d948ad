use std::num::NonZeroU64;
use std::time::Duration;

use serde::Deserialize;

use crate::model::error::Exception;
use crate::model::gateway::deserialize_snowflake;
use crate::model::track::Track;

/// Player related events received from the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A track has started playing.
    #[serde(rename = "TrackStartEvent")]
    TrackStart(TrackStart),
    /// A track ended playing, either by skipping or naturally finished.
    #[serde(rename = "TrackEndEvent")]
    TrackEnd(TrackEnd),
    /// A track threw an exception while playing.
    #[serde(rename = "TrackExceptionEvent")]
    TrackException(TrackException),
    /// A track got stuck while playing.
    #[serde(rename = "TrackStuckEvent")]
    TrackStuck(TrackStuck),
    /// The voice websocket of the player was closed.
    #[serde(rename = "WebSocketClosedEvent")]
    WebSocketClosed(WebSocketClosed)
}

impl Event {
    /// Guild the event belongs to.
    pub fn guild_id(&self) -> NonZeroU64 {
        match self {
            Self::TrackStart(e) => e.guild_id,
            Self::TrackEnd(e) => e.guild_id,
            Self::TrackException(e) => e.guild_id,
            Self::TrackStuck(e) => e.guild_id,
            Self::WebSocketClosed(e) => e.guild_id
        }
    }
}

/// A track as sent inside events, legacy nodes only send the encoded payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TrackPayload {
    Full(Track),
    Encoded(String)
}

impl TrackPayload {
    pub fn encoded(&self) -> &str {
        match self {
            Self::Full(t) => &t.encoded,
            Self::Encoded(e) => e
        }
    }

    /// Converts the payload into a track, using `known` when it is the same track so
    /// metadata is not lost.
    pub fn into_track(self, known: Option<&Track>) -> Track {
        match self {
            Self::Full(t) => t,
            Self::Encoded(e) => match known {
                Some(track) if track.encoded == e => track.clone(),
                _ => Track::from_encoded(e)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStart {
    #[serde(deserialize_with = "deserialize_snowflake")]
    pub guild_id: NonZeroU64,
    pub track: TrackPayload
}

/// Event fired when a track finishes its playback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEnd {
    #[serde(deserialize_with = "deserialize_snowflake")]
    pub guild_id: NonZeroU64,
    pub track: TrackPayload,
    /// Why the track ended.
    pub reason: TrackEndReason
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    /// The track finished playing.
    #[serde(alias = "FINISHED")]
    Finished,
    /// The track failed to load.
    #[serde(alias = "LOAD_FAILED")]
    LoadFailed,
    /// The track was stopped.
    #[serde(alias = "STOPPED")]
    Stopped,
    /// The track was replaced by another one.
    #[serde(alias = "REPLACED")]
    Replaced,
    /// The player was cleaned up.
    #[serde(alias = "CLEANUP")]
    Cleanup
}

impl TrackEndReason {
    /// Whether if the next track of the queue should be started.
    pub fn may_start_next(self) -> bool {
        matches!(self, Self::Finished | Self::LoadFailed)
    }
}

/// Event fired when a track had an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackException {
    #[serde(deserialize_with = "deserialize_snowflake")]
    pub guild_id: NonZeroU64,
    pub track: TrackPayload,
    /// The error that occurred.
    pub exception: Exception
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStuck {
    #[serde(deserialize_with = "deserialize_snowflake")]
    pub guild_id: NonZeroU64,
    pub track: TrackPayload,
    /// Threshold the track was stuck for.
    #[serde(rename = "thresholdMs", deserialize_with = "crate::model::track::duration_from_millis")]
    pub threshold: Duration
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketClosed {
    #[serde(deserialize_with = "deserialize_snowflake")]
    pub guild_id: NonZeroU64,
    /// Close code sent by discord.
    pub code: u16,
    pub reason: String,
    /// Whether if discord closed the connection.
    pub by_remote: bool
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    #[test]
    fn decodes_session_track_end() {
        let event: Event = serde_json::from_value(json!({
            "op": "event",
            "type": "TrackEndEvent",
            "guildId": "817327181659111454",
            "track": { "encoded": "QA", "info": { "title": "t", "author": "a", "length": 1 } },
            "reason": "finished"
        })).unwrap();

        let Event::TrackEnd(end) = event else { panic!("expected a track end") };
        assert_eq!(end.guild_id.get(), 817327181659111454);
        assert_eq!(end.reason, TrackEndReason::Finished);
        assert_eq!(end.track.encoded(), "QA");
    }

    #[test]
    fn decodes_legacy_track_end() {
        let event: Event = serde_json::from_value(json!({
            "op": "event",
            "type": "TrackEndEvent",
            "guildId": "1",
            "track": "QA",
            "reason": "LOAD_FAILED"
        })).unwrap();

        let Event::TrackEnd(end) = event else { panic!("expected a track end") };
        assert!(end.reason.may_start_next());
        assert!(matches!(end.track, TrackPayload::Encoded(_)));
    }

    #[test]
    fn only_terminal_reasons_start_next() {
        assert!(TrackEndReason::Finished.may_start_next());
        assert!(!TrackEndReason::Replaced.may_start_next());
        assert!(!TrackEndReason::Stopped.may_start_next());
        assert!(!TrackEndReason::Cleanup.may_start_next());
    }

    #[test]
    fn encoded_payload_reuses_known_metadata() {
        let mut known = Track::from_encoded("QA");
        known.info.title = "known".into();

        let track = TrackPayload::Encoded("QA".into()).into_track(Some(&known));
        assert_eq!(track.info.title, "known");

        let other = TrackPayload::Encoded("QB".into()).into_track(Some(&known));
        assert!(other.info.title.is_empty());
    }

    #[test]
    fn decodes_stuck_threshold() {
        let event: Event = serde_json::from_value(json!({
            "type": "TrackStuckEvent",
            "guildId": "2",
            "track": "QA",
            "thresholdMs": 10000
        })).unwrap();

        let Event::TrackStuck(stuck) = event else { panic!("expected a stuck event") };
        assert_eq!(stuck.threshold, Duration::from_secs(10));
    }
}
