use std::num::NonZeroU64;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::model::error::Exception;
use crate::model::gateway::event::TrackEndReason;
use crate::model::gateway::stats::Stats;
use crate::model::track::Track;

/// Notifications emitted by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The control channel of a node was opened.
    NodeConnect { node: String },
    /// A node sent its session id.
    NodeReady { node: String, session_id: String, resumed: bool },
    /// The control channel of a node was closed.
    NodeDisconnect { node: String, code: Option<u16>, reason: String },
    /// A connection attempt failed.
    NodeError { node: String, error: String },
    /// A node ran out of reconnect attempts and won't reconnect on its own.
    NodeFailure { node: String, attempts: u32 },
    /// A node sent new load statistics.
    NodeStats { node: String, stats: Stats },
    /// A node sent a payload this client doesn't know about.
    NodeMessage { node: String, payload: Value },
    TrackStart { guild_id: NonZeroU64, track: Track },
    TrackEnd { guild_id: NonZeroU64, track: Track, reason: TrackEndReason },
    TrackException { guild_id: NonZeroU64, track: Track, exception: Exception },
    TrackStuck { guild_id: NonZeroU64, track: Track, threshold: Duration },
    /// The voice websocket of a player was closed by discord.
    SocketClosed { guild_id: NonZeroU64, code: u16, reason: String, by_remote: bool },
    /// The queue of a player ran out of tracks, also emitted when autoplay found nothing to add.
    QueueEnd { guild_id: NonZeroU64 },
    /// Autoplay picked a track.
    Autoplay { guild_id: NonZeroU64, track: Track },
    /// The bot was moved to another voice channel.
    PlayerMove { guild_id: NonZeroU64, old_channel: NonZeroU64, new_channel: NonZeroU64 },
    /// The bot left the voice channel.
    PlayerDisconnect { guild_id: NonZeroU64 },
    PlayerDestroy { guild_id: NonZeroU64 }
}

/// Sending half of the notification channel of a client.
#[derive(Clone)]
pub(crate) struct EventSender(UnboundedSender<ClientEvent>);

impl EventSender {
    pub fn new(sender: UnboundedSender<ClientEvent>) -> Self {
        Self(sender)
    }

    /// Emits an event, events are dropped if nobody listens.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.0.send(event);
    }
}
