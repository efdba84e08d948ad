use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::trace;

use crate::config::{NodeConfig, ProtocolVersion};
use crate::error::{Error, Result, SocketError};
use crate::model::gateway::stats::Stats;
use crate::model::info::NodeInfo;
use crate::model::load::LoadResult;
use crate::model::player::PlayerUpdate;
use crate::msg::ToSocketMessage;
use crate::rest::RestClient;
use crate::source::SearchSource;

/// Connection state of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready
}

/// What to do after the control channel closed unexpectedly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reconnect {
    After(Duration),
    GiveUp(u32)
}

/// A remote node.
///
/// Messages sent through the control channel are dropped while the node is not connected,
/// player mutations on session based nodes go through the rest api instead.
pub struct Node {
    id: String,
    config: NodeConfig,
    order: usize,
    auto_resume: bool,
    http: RestClient,
    state: RwLock<ConnectionState>,
    session: RwLock<Option<String>>,
    stats: RwLock<Option<Stats>>,
    attempts: AtomicU32,
    sender: UnboundedSender<ToSocketMessage>
}

impl Node {
    /// Creates a node, the receiver must be driven by a socket task.
    pub(crate) fn new(
        mut config: NodeConfig,
        order: usize,
        auto_resume: bool
    ) -> (Arc<Self>, UnboundedReceiver<ToSocketMessage>) {
        if auto_resume && config.version == ProtocolVersion::V3 && config.resume_key.is_none() {
            config.resume_key = Some(uuid::Uuid::new_v4().to_string());
        }

        let (sender, receiver) = unbounded_channel();
        let node = Self {
            id: config.identifier(),
            http: RestClient::new(&config),
            config,
            order,
            auto_resume,
            state: RwLock::new(ConnectionState::Disconnected),
            session: RwLock::new(None),
            stats: RwLock::new(None),
            attempts: AtomicU32::new(0),
            sender
        };

        (Arc::new(node), receiver)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn version(&self) -> ProtocolVersion {
        self.config.version
    }

    pub(crate) fn order(&self) -> usize {
        self.order
    }

    pub(crate) fn auto_resume(&self) -> bool {
        self.auto_resume
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Whether if players can be created on this node.
    pub fn is_available(&self) -> bool {
        self.is_connected()
            && (self.config.version == ProtocolVersion::V3 || self.session.read().is_some())
    }

    /// Session id sent by the node, `None` until the node is ready.
    pub fn session_id(&self) -> Option<String> {
        self.session.read().clone()
    }

    pub(crate) fn set_session(&self, session: Option<String>) {
        *self.session.write() = session;
    }

    pub fn stats(&self) -> Option<Stats> {
        self.stats.read().clone()
    }

    pub(crate) fn set_stats(&self, stats: Stats) {
        *self.stats.write() = Some(stats);
    }

    /// Number of players reported by the node.
    pub fn players(&self) -> u64 {
        self.stats.read().as_ref().map(|s| s.players).unwrap_or(0)
    }

    /// Reconnect attempts made since the node was last ready.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    pub(crate) fn reset_attempts(&self) {
        self.attempts.store(0, Ordering::Release);
    }

    /// Records an unexpected closure and decides whether to reconnect.
    pub(crate) fn record_unexpected_close(&self) -> Reconnect {
        let attempts = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;

        if attempts >= self.config.retry_amount {
            Reconnect::GiveUp(attempts)
        } else {
            Reconnect::After(self.config.retry_delay)
        }
    }

    /// Opens the control channel, does nothing if already connected or connecting.
    pub fn connect(&self) {
        let _ = self.sender.send(ToSocketMessage::Connect);
    }

    /// Closes the control channel and cancels any pending reconnect.
    pub fn disconnect(&self) {
        let _ = self.sender.send(ToSocketMessage::Disconnect);
    }

    pub(crate) fn kill(&self) {
        let _ = self.sender.send(ToSocketMessage::Kill);
    }

    /// Sends a message through the control channel, it is silently dropped if the node isn't connected.
    pub fn send(&self, payload: Value) {
        if !self.is_connected() {
            trace!("Dropping message to disconnected node {}", self.id);
            return;
        }

        let _ = self.sender.send(ToSocketMessage::Send(payload));
    }

    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResult> {
        self.http.load_tracks(identifier).await
    }

    pub async fn search(&self, query: &str, source: &SearchSource) -> Result<LoadResult> {
        self.load_tracks(&source.identifier(query)).await
    }

    pub async fn info(&self) -> Result<NodeInfo> {
        self.http.info().await
    }

    /// Applies an update to the remote player of the guild.
    pub async fn update_player(&self, guild: NonZeroU64, update: &PlayerUpdate) -> Result<()> {
        match self.config.version {
            ProtocolVersion::V4 => {
                let session = self.session_id().ok_or(Error::NoSession)?;
                self.http.update_player(&session, guild, update).await
            },
            ProtocolVersion::V3 => {
                for op in legacy_ops(guild, update) {
                    self.send(op);
                }

                Ok(())
            }
        }
    }

    /// Destroys the remote player of the guild.
    pub async fn destroy_player(&self, guild: NonZeroU64) -> Result<()> {
        match self.config.version {
            ProtocolVersion::V4 => match self.session_id() {
                Some(session) => self.http.destroy_player(&session, guild).await,
                None => Ok(())
            },
            ProtocolVersion::V3 => {
                self.send(json!({ "op": "stop", "guildId": guild.to_string() }));
                self.send(json!({ "op": "destroy", "guildId": guild.to_string() }));
                Ok(())
            }
        }
    }

    pub(crate) async fn configure_resuming(&self) -> Result<()> {
        let session = self.session_id().ok_or(Error::NoSession)?;
        self.http.configure_resuming(&session, self.config.resume_timeout).await
    }

    /// Message sent after opening a legacy connection so the session can be resumed.
    pub(crate) fn resume_payload(&self) -> Option<Value> {
        let key = self.config.resume_key.as_ref()?;

        Some(json!({
            "op": "configureResuming",
            "key": key,
            "timeout": self.config.resume_timeout.as_secs()
        }))
    }

    pub(crate) fn request(&self, user_id: Option<NonZeroU64>) -> Result<Request, SocketError> {
        let mut request = self.config.ws_url().into_client_request()?;
        let headers = request.headers_mut();

        headers.insert("Authorization", HeaderValue::from_str(&self.config.password)?);
        headers.insert("Client-Name", HeaderValue::from_static(crate::CLIENT_NAME));
        headers.insert(
            "User-Id",
            HeaderValue::from_str(&user_id.map(|u| u.get()).unwrap_or(0).to_string())?
        );

        match self.config.version {
            ProtocolVersion::V3 => if let Some(key) = &self.config.resume_key {
                headers.insert("Resume-Key", HeaderValue::from_str(key)?);
            },
            ProtocolVersion::V4 => if let Some(session) = self.session_id().filter(|_| self.auto_resume) {
                headers.insert("Session-Id", HeaderValue::from_str(&session)?);
            }
        }

        Ok(request)
    }
}

/// Translates a player update into the operations understood by legacy nodes.
pub(crate) fn legacy_ops(guild: NonZeroU64, update: &PlayerUpdate) -> Vec<Value> {
    let guild = guild.to_string();
    let mut ops = Vec::new();

    if let Some(voice) = &update.voice {
        ops.push(json!({
            "op": "voiceUpdate",
            "guildId": guild,
            "sessionId": voice.session_id,
            "event": {
                "token": voice.token,
                "endpoint": voice.endpoint,
                "guild_id": guild
            }
        }));
    }

    match &update.encoded_track {
        Some(Some(track)) => {
            let mut op = json!({
                "op": "play",
                "guildId": guild,
                "track": track,
                "noReplace": false
            });

            if let Some(position) = update.position {
                op["startTime"] = json!(position);
            }
            if let Some(paused) = update.paused {
                op["pause"] = json!(paused);
            }
            if let Some(volume) = update.volume {
                op["volume"] = json!(volume);
            }

            ops.push(op);
            return ops;
        },
        Some(None) => ops.push(json!({ "op": "stop", "guildId": guild })),
        None => {}
    }

    if let Some(paused) = update.paused {
        ops.push(json!({ "op": "pause", "guildId": guild, "pause": paused }));
    }

    if let Some(position) = update.position {
        ops.push(json!({ "op": "seek", "guildId": guild, "position": position }));
    }

    if let Some(volume) = update.volume {
        ops.push(json!({ "op": "volume", "guildId": guild, "volume": volume }));
    }

    if let Some(filters) = &update.filters {
        let mut op = match serde_json::to_value(filters) {
            Ok(Value::Object(map)) => map,
            _ => Map::new()
        };
        op.insert("op".into(), json!("filters"));
        op.insert("guildId".into(), json!(guild));
        ops.push(Value::Object(op));
    }

    ops
}
