use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::MutexGuard;
use tracing::{debug, trace, warn};
use typemap_rev::TypeMap;

use crate::autoplay;
use crate::error::{Error, Result};
use crate::events::{ClientEvent, EventSender};
use crate::model::connection::{VoiceServerUpdate, VoiceStateUpdate, VoiceUpdateState};
use crate::model::filters::Filters;
use crate::model::gateway::event::{Event, TrackEnd, TrackEndReason};
use crate::model::gateway::state::PlayerState;
use crate::model::player::{PlayerInfo, PlayerUpdate};
use crate::model::track::Track;
use crate::node::Node;
use crate::queue::Queue;
use crate::{GatewaySend, Shared};

/// Highest volume accepted by the node.
pub const MAX_VOLUME: u16 = 1000;

/// Playback status of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    /// A track was requested and the node hasn't started it yet.
    Loading,
    Playing,
    Paused,
    /// The player was destroyed, no operation can be performed anymore.
    Destroyed
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RepeatMode {
    #[default]
    Off,
    /// Plays the current track again when it finishes.
    Track,
    /// Puts finished tracks back at the end of the queue.
    Queue
}

/// Options used to create a player.
#[derive(Clone, Debug)]
pub struct PlayerOptions {
    pub guild_id: NonZeroU64,
    pub voice_channel_id: Option<NonZeroU64>,
    pub text_channel_id: Option<NonZeroU64>,
    pub self_deaf: bool,
    pub self_mute: bool,
    pub autoplay: bool
}

impl PlayerOptions {
    pub fn new(guild_id: NonZeroU64) -> Self {
        Self {
            guild_id,
            voice_channel_id: None,
            text_channel_id: None,
            self_deaf: false,
            self_mute: false,
            autoplay: false
        }
    }
}

/// Inputs processed in order by the inbox of a player.
#[derive(Debug)]
pub(crate) enum PlayerEvent {
    State(PlayerState),
    Event(Event),
    /// The node lost the player and it must be sent again.
    Resync
}

struct PlayerInner {
    voice_channel_id: Option<NonZeroU64>,
    text_channel_id: Option<NonZeroU64>,
    self_deaf: bool,
    self_mute: bool,
    position: Duration,
    timestamp: u64,
    connected: bool,
    ping: i64,
    playing: bool,
    loading: bool,
    paused: bool,
    volume: u16,
    filters: Filters,
    repeat: RepeatMode,
    autoplay: bool,
    /// Set by `skip` so the next stop advances the queue.
    skipping: bool,
    voice: VoiceUpdateState,
    queue: Queue
}

/// The player of a guild.
pub struct Player {
    guild_id: NonZeroU64,
    node: Arc<Node>,
    shared: Weak<Shared>,
    events: EventSender,
    gateway: GatewaySend,
    auto_resume: bool,
    destroyed: AtomicBool,
    inner: tokio::sync::Mutex<PlayerInner>,
    inbox: Mutex<Option<UnboundedSender<PlayerEvent>>>,
    data: RwLock<TypeMap>
}

impl Player {
    pub(crate) fn new(
        options: &PlayerOptions,
        node: Arc<Node>,
        shared: Weak<Shared>,
        events: EventSender,
        gateway: GatewaySend
    ) -> Arc<Self> {
        let auto_resume = node.auto_resume();

        Arc::new(Self {
            guild_id: options.guild_id,
            node,
            shared,
            events,
            gateway,
            auto_resume,
            destroyed: AtomicBool::new(false),
            inner: tokio::sync::Mutex::new(PlayerInner {
                voice_channel_id: options.voice_channel_id,
                text_channel_id: options.text_channel_id,
                self_deaf: options.self_deaf,
                self_mute: options.self_mute,
                position: Duration::ZERO,
                timestamp: 0,
                connected: false,
                ping: -1,
                playing: false,
                loading: false,
                paused: false,
                volume: 100,
                filters: Filters::default(),
                repeat: RepeatMode::Off,
                autoplay: options.autoplay,
                skipping: false,
                voice: VoiceUpdateState::default(),
                queue: Queue::new()
            }),
            inbox: Mutex::new(None),
            data: RwLock::new(TypeMap::new())
        })
    }

    /// Starts the task processing the events of this player.
    pub(crate) fn spawn_inbox(self: &Arc<Self>) {
        let (sender, mut receiver) = unbounded_channel();
        *self.inbox.lock() = Some(sender);
        let player = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let Some(player) = player.upgrade() else { break };

                match player.handle_event(event).await {
                    Ok(()) => {},
                    Err(Error::PlayerDestroyed) => break,
                    Err(e) => warn!("Player {} failed to handle an event: {e}", player.guild_id)
                }
            }
        });
    }

    /// Queues an event for the inbox, dropped if the player was destroyed.
    pub(crate) fn deliver(&self, event: PlayerEvent) {
        if let Some(inbox) = self.inbox.lock().as_ref() {
            let _ = inbox.send(event);
        }
    }

    pub fn guild_id(&self) -> NonZeroU64 {
        self.guild_id
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Data attached to this player by the application.
    pub fn data(&self) -> &RwLock<TypeMap> {
        &self.data
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    async fn lock(&self) -> Result<MutexGuard<'_, PlayerInner>> {
        if self.is_destroyed() {
            return Err(Error::PlayerDestroyed);
        }

        let inner = self.inner.lock().await;

        if self.is_destroyed() {
            return Err(Error::PlayerDestroyed);
        }

        Ok(inner)
    }

    fn status(&self, inner: &PlayerInner) -> PlayerStatus {
        if self.is_destroyed() {
            PlayerStatus::Destroyed
        } else if inner.loading {
            PlayerStatus::Loading
        } else if inner.playing && inner.paused {
            PlayerStatus::Paused
        } else if inner.playing {
            PlayerStatus::Playing
        } else {
            PlayerStatus::Idle
        }
    }

    /// Snapshot of the player state.
    pub async fn info(&self) -> Result<PlayerInfo> {
        let inner = self.lock().await?;

        Ok(PlayerInfo {
            guild_id: self.guild_id,
            node: self.node.id().to_string(),
            status: self.status(&inner),
            voice_channel_id: inner.voice_channel_id,
            text_channel_id: inner.text_channel_id,
            paused: inner.paused,
            playing: inner.playing,
            volume: inner.volume,
            position: inner.position,
            timestamp: inner.timestamp,
            connected: inner.connected,
            ping: inner.ping,
            filters: inner.filters.clone(),
            repeat_mode: inner.repeat,
            autoplay: inner.autoplay,
            current: inner.queue.current().cloned(),
            queue: inner.queue.tracks().iter().cloned().collect(),
            history: inner.queue.history().to_vec()
        })
    }

    /// Runs `f` with exclusive access to the queue.
    pub async fn with_queue<R>(&self, f: impl FnOnce(&mut Queue) -> R) -> Result<R> {
        let mut inner = self.lock().await?;
        Ok(f(&mut inner.queue))
    }

    /// Plays a track.
    ///
    /// Without a track, the current one is played, or the next one of the queue. If the
    /// queue is empty and autoplay is enabled, autoplay picks one. Does nothing if there's
    /// nothing to play.
    pub async fn play(&self, track: Option<Track>) -> Result<()> {
        let mut inner = self.lock().await?;
        self.play_locked(&mut inner, track).await
    }

    async fn play_locked(&self, inner: &mut PlayerInner, track: Option<Track>) -> Result<()> {
        let track = match track {
            Some(track) => {
                inner.queue.set_current(track.clone());
                track
            },
            None => match inner.queue.current().cloned() {
                Some(current) => current,
                None => match inner.queue.next().cloned() {
                    Some(next) => next,
                    None => {
                        if inner.autoplay {
                            self.autoplay_locked(inner).await?;
                        }

                        return Ok(());
                    }
                }
            }
        };

        self.start(inner, &track, None).await
    }

    /// Sends the play request, flags are restored if it fails.
    async fn start(&self, inner: &mut PlayerInner, track: &Track, position: Option<Duration>) -> Result<()> {
        let previous = (inner.playing, inner.loading);
        inner.playing = true;
        inner.loading = true;

        let mut update = PlayerUpdate::play(track);
        if let Some(position) = position {
            update = update.at(position);
        }

        debug!("Player {} playing {}", self.guild_id, track.info.title);
        let result = self.node.update_player(self.guild_id, &update).await;

        if self.is_destroyed() {
            return Err(Error::PlayerDestroyed);
        }

        match result {
            Ok(()) => {
                inner.paused = false;
                Ok(())
            },
            Err(e) => {
                (inner.playing, inner.loading) = previous;
                Err(e)
            }
        }
    }

    /// Loads a track related to the last played one and queues it, returns whether a track
    /// was picked. Load failures are not errors.
    async fn autoplay_locked(&self, inner: &mut PlayerInner) -> Result<bool> {
        let Some(seed) = autoplay::seed(&inner.queue).cloned() else { return Ok(false) };
        let identifier = autoplay::identifier(&seed);

        debug!("Autoplay of player {} loading {identifier}", self.guild_id);
        let result = match self.node.load_tracks(&identifier).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Autoplay of player {} failed: {e}", self.guild_id);
                return Ok(false);
            }
        };

        if self.is_destroyed() {
            return Err(Error::PlayerDestroyed);
        }

        let Some(track) = autoplay::pick(&seed, &result.tracks, &inner.queue) else { return Ok(false) };

        inner.queue.add(track.clone());
        self.events.emit(ClientEvent::Autoplay { guild_id: self.guild_id, track });

        if !inner.playing {
            if let Some(next) = inner.queue.next().cloned() {
                self.start(inner, &next, None).await?;
            }
        }

        Ok(true)
    }

    /// Plays the next track of the queue, autoplay or ending the queue if there's none.
    async fn advance_locked(&self, inner: &mut PlayerInner) -> Result<()> {
        if let Some(next) = inner.queue.next().cloned() {
            return self.start(inner, &next, None).await;
        }

        inner.playing = false;
        inner.loading = false;

        if inner.autoplay && self.autoplay_locked(inner).await? {
            return Ok(());
        }

        debug!("Queue of player {} ended", self.guild_id);
        self.events.emit(ClientEvent::QueueEnd { guild_id: self.guild_id });
        Ok(())
    }

    pub async fn pause(&self, paused: bool) -> Result<()> {
        let mut inner = self.lock().await?;
        self.update(PlayerUpdate::pause(paused)).await?;
        inner.paused = paused;

        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.pause(false).await
    }

    /// Stops the current track, the queue is kept.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.lock().await?;
        inner.skipping = false;
        self.update(PlayerUpdate::stop()).await?;
        inner.playing = false;
        inner.loading = false;

        Ok(())
    }

    /// Stops the current track so the next one of the queue is played.
    pub async fn skip(&self) -> Result<()> {
        let mut inner = self.lock().await?;
        inner.skipping = inner.playing;

        if let Err(e) = self.update(PlayerUpdate::stop()).await {
            inner.skipping = false;
            return Err(e);
        }

        inner.playing = false;
        inner.loading = false;
        Ok(())
    }

    /// Skips to the track at `index` of the queue, the skipped tracks go into the history.
    ///
    /// Returns false if the index is out of bounds.
    pub async fn skip_to(&self, index: usize) -> Result<bool> {
        let mut inner = self.lock().await?;

        if !inner.queue.skip_to(index) {
            return Ok(false);
        }

        if inner.playing {
            inner.skipping = true;

            if let Err(e) = self.update(PlayerUpdate::stop()).await {
                inner.skipping = false;
                return Err(e);
            }
        } else {
            self.advance_locked(&mut inner).await?;
        }

        Ok(true)
    }

    /// Plays the last played track again, returns false if there's none.
    pub async fn previous(&self) -> Result<bool> {
        let mut inner = self.lock().await?;

        let Some(track) = inner.queue.previous().cloned() else { return Ok(false) };
        self.start(&mut inner, &track, None).await?;

        Ok(true)
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        let _inner = self.lock().await?;
        self.update(PlayerUpdate::seek(position)).await
    }

    /// Sets the volume, clamped to [`MAX_VOLUME`].
    pub async fn set_volume(&self, volume: u16) -> Result<()> {
        let mut inner = self.lock().await?;
        let volume = volume.min(MAX_VOLUME);

        self.update(PlayerUpdate::volume(volume)).await?;
        inner.volume = volume;

        Ok(())
    }

    /// Merges `patch` over the current filters and applies the result.
    pub async fn set_filters(&self, patch: Filters) -> Result<()> {
        let mut inner = self.lock().await?;
        let filters = inner.filters.merge(patch);

        self.update(PlayerUpdate::filters(filters.clone())).await?;
        inner.filters = filters;

        Ok(())
    }

    /// Removes every filter.
    pub async fn clear_filters(&self) -> Result<()> {
        let mut inner = self.lock().await?;

        self.update(PlayerUpdate::filters(Filters::default())).await?;
        inner.filters = Filters::default();

        Ok(())
    }

    pub async fn bass_boost(&self, gain: f32) -> Result<()> {
        self.set_filters(Filters::bass_boost(gain)).await
    }

    pub async fn nightcore(&self) -> Result<()> {
        self.set_filters(Filters::nightcore()).await
    }

    pub async fn vaporwave(&self) -> Result<()> {
        self.set_filters(Filters::vaporwave()).await
    }

    pub async fn karaoke(&self) -> Result<()> {
        self.set_filters(Filters::karaoke()).await
    }

    pub async fn eight_d(&self) -> Result<()> {
        self.set_filters(Filters::eight_d()).await
    }

    pub async fn tremolo(&self, frequency: f32, depth: f32) -> Result<()> {
        self.set_filters(Filters::tremolo(frequency, depth)).await
    }

    pub async fn vibrato(&self, frequency: f32, depth: f32) -> Result<()> {
        self.set_filters(Filters::vibrato(frequency, depth)).await
    }

    pub async fn set_speed(&self, speed: f64) -> Result<()> {
        self.set_filters(Filters::speed(speed)).await
    }

    pub async fn set_pitch(&self, pitch: f64) -> Result<()> {
        self.set_filters(Filters::pitch(pitch)).await
    }

    pub async fn set_rate(&self, rate: f64) -> Result<()> {
        self.set_filters(Filters::rate(rate)).await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.lock().await?.repeat = mode;
        Ok(())
    }

    pub async fn set_autoplay(&self, autoplay: bool) -> Result<()> {
        self.lock().await?.autoplay = autoplay;
        Ok(())
    }

    pub async fn set_text_channel(&self, channel: Option<NonZeroU64>) -> Result<()> {
        self.lock().await?.text_channel_id = channel;
        Ok(())
    }

    /// Asks the gateway to join a voice channel.
    pub async fn connect(&self, channel: NonZeroU64, self_deaf: bool, self_mute: bool) -> Result<()> {
        let mut inner = self.lock().await?;

        self.send_voice_state(Some(channel), self_deaf, self_mute);
        inner.voice_channel_id = Some(channel);
        inner.self_deaf = self_deaf;
        inner.self_mute = self_mute;

        Ok(())
    }

    /// Asks the gateway to leave the voice channel.
    pub async fn disconnect(&self) -> Result<()> {
        let mut inner = self.lock().await?;

        self.send_voice_state(None, inner.self_deaf, inner.self_mute);
        inner.voice.clear_server();

        if inner.voice_channel_id.take().is_some() {
            self.events.emit(ClientEvent::PlayerDisconnect { guild_id: self.guild_id });
        }

        Ok(())
    }

    fn send_voice_state(&self, channel: Option<NonZeroU64>, self_deaf: bool, self_mute: bool) {
        (self.gateway)(self.guild_id, json!({
            "op": 4,
            "d": {
                "guild_id": self.guild_id.to_string(),
                "channel_id": channel.map(|c| c.to_string()),
                "self_mute": self_mute,
                "self_deaf": self_deaf
            }
        }));
    }

    /// Destroys the player, both locally and on the node.
    ///
    /// The player can't be used after this call, even if destroying the remote player
    /// failed. Destroying it again does nothing.
    pub async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        debug!("Destroying player {}", self.guild_id);
        let result = self.node.destroy_player(self.guild_id).await;

        if let Some(shared) = self.shared.upgrade() {
            shared.players.remove_if_same(self);
        }

        self.inbox.lock().take();
        self.events.emit(ClientEvent::PlayerDestroy { guild_id: self.guild_id });

        result
    }

    async fn update(&self, update: PlayerUpdate) -> Result<()> {
        self.node.update_player(self.guild_id, &update).await?;

        if self.is_destroyed() {
            return Err(Error::PlayerDestroyed);
        }

        Ok(())
    }

    pub(crate) async fn on_voice_state(&self, update: &VoiceStateUpdate) {
        let Ok(mut inner) = self.lock().await else { return };

        match (inner.voice_channel_id, update.channel_id) {
            (Some(old), Some(new)) if old != new => self.events.emit(ClientEvent::PlayerMove {
                guild_id: self.guild_id,
                old_channel: old,
                new_channel: new
            }),
            (Some(_), None) => self.events.emit(ClientEvent::PlayerDisconnect { guild_id: self.guild_id }),
            _ => {}
        }

        inner.voice_channel_id = update.channel_id;
        inner.voice.set_session(&update.session_id);

        if update.channel_id.is_none() {
            inner.voice.clear_server();
            return;
        }

        self.flush_voice(&mut inner).await;
    }

    pub(crate) async fn on_voice_server(&self, update: &VoiceServerUpdate) {
        let Ok(mut inner) = self.lock().await else { return };

        inner.voice.set_server(update);
        self.flush_voice(&mut inner).await;
    }

    /// Sends the voice state to the node if both halves are present and it changed.
    async fn flush_voice(&self, inner: &mut PlayerInner) {
        let Some(voice) = inner.voice.take_pending() else {
            trace!("Voice state of player {} not ready", self.guild_id);
            return;
        };

        debug!("Sending voice update of player {}", self.guild_id);
        if let Err(e) = self.node.update_player(self.guild_id, &PlayerUpdate::voice(voice)).await {
            warn!("Failed to send voice update of player {}: {e}", self.guild_id);
            inner.voice.mark_dirty();
        }
    }

    pub(crate) async fn handle_event(&self, event: PlayerEvent) -> Result<()> {
        match event {
            PlayerEvent::State(state) => {
                let mut inner = self.lock().await?;
                inner.position = state.position;
                inner.timestamp = state.time;
                inner.connected = state.connected;
                inner.ping = state.ping;
            },
            PlayerEvent::Resync => self.resync().await?,
            PlayerEvent::Event(Event::TrackEnd(end)) => self.on_track_end(end).await?,
            PlayerEvent::Event(Event::TrackStart(start)) => {
                let mut inner = self.lock().await?;
                let track = start.track.into_track(inner.queue.current());
                inner.loading = false;
                inner.playing = true;

                self.events.emit(ClientEvent::TrackStart { guild_id: self.guild_id, track });
            },
            PlayerEvent::Event(Event::TrackException(e)) => {
                let inner = self.lock().await?;
                warn!("Track exception on player {}: {}", self.guild_id, e.exception);

                self.events.emit(ClientEvent::TrackException {
                    guild_id: self.guild_id,
                    track: e.track.into_track(inner.queue.current()),
                    exception: e.exception
                });
            },
            PlayerEvent::Event(Event::TrackStuck(e)) => {
                let inner = self.lock().await?;
                warn!("Track stuck on player {} for {:?}", self.guild_id, e.threshold);

                self.events.emit(ClientEvent::TrackStuck {
                    guild_id: self.guild_id,
                    track: e.track.into_track(inner.queue.current()),
                    threshold: e.threshold
                });
            },
            PlayerEvent::Event(Event::WebSocketClosed(e)) => {
                warn!("Voice connection of player {} closed with code {}", self.guild_id, e.code);

                self.events.emit(ClientEvent::SocketClosed {
                    guild_id: self.guild_id,
                    code: e.code,
                    reason: e.reason,
                    by_remote: e.by_remote
                });
            }
        }

        Ok(())
    }

    async fn on_track_end(&self, end: TrackEnd) -> Result<()> {
        let mut inner = self.lock().await?;
        let track = end.track.into_track(inner.queue.current());

        self.events.emit(ClientEvent::TrackEnd {
            guild_id: self.guild_id,
            track,
            reason: end.reason
        });

        let skipped = end.reason == TrackEndReason::Stopped && std::mem::take(&mut inner.skipping);

        if !end.reason.may_start_next() && !skipped {
            if end.reason != TrackEndReason::Replaced {
                inner.playing = false;
                inner.loading = false;
            }

            return Ok(());
        }

        inner.skipping = false;

        if !skipped && inner.repeat == RepeatMode::Track {
            if let Some(current) = inner.queue.current().cloned() {
                return self.start(&mut inner, &current, None).await;
            }
        }

        if inner.repeat == RepeatMode::Queue {
            if let Some(current) = inner.queue.current().cloned() {
                inner.queue.add(current);
            }
        }

        self.advance_locked(&mut inner).await
    }

    /// Sends the voice state again and, when resuming, restarts the current track where it was.
    async fn resync(&self) -> Result<()> {
        let mut inner = self.lock().await?;

        inner.voice.mark_dirty();
        self.flush_voice(&mut inner).await;

        if self.auto_resume && inner.playing {
            if let Some(track) = inner.queue.current().cloned() {
                let position = inner.position;
                self.start(&mut inner, &track, Some(position)).await?;
            }
        }

        Ok(())
    }
}
