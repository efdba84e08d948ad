pub mod model;
pub mod config;
mod error;
mod socket;
mod player;
mod rest;
mod msg;
mod events;
mod manager;
mod node;
mod dispatch;
mod queue;
mod autoplay;
mod source;
mod stream;
mod plugin;
#[cfg(feature = "twilight")]
mod twilight;

use std::num::NonZeroU64;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::config::{Config, NodeConfig};
use crate::events::EventSender;
use crate::manager::{NodeManager, PlayerManager};
use crate::model::connection::{VoiceServerUpdate, VoiceStateUpdate};
use crate::model::load::LoadResult;

pub use error::{Error, Result};
pub use events::ClientEvent;
pub use node::{ConnectionState, Node};
pub use player::{Player, PlayerOptions, PlayerStatus, RepeatMode, MAX_VOLUME};
pub use plugin::Plugin;
pub use queue::Queue;
pub use source::SearchSource;
pub use stream::EventStream;
pub use typemap_rev::{TypeMap, TypeMapKey};
#[cfg(feature = "twilight")]
pub use twilight::{MissingGuild, ShardSenders};

/// Name sent to the nodes to identify this client.
pub(crate) const CLIENT_NAME: &str = concat!("framelink-client/", env!("CARGO_PKG_VERSION"));

/// Callback used to send payloads to the discord gateway shard of a guild.
pub type GatewaySend = Arc<dyn Fn(NonZeroU64, Value) + Send + Sync>;

pub(crate) struct Shared {
    pub players: PlayerManager,
    pub nodes: NodeManager,
    pub config: RwLock<Config>,
    pub user_id: RwLock<Option<NonZeroU64>>,
    pub events: EventSender,
    pub gateway: GatewaySend
}

/// A client managing nodes and the players living on them.
///
/// Nodes and players spawn tasks, so the client must be used inside a tokio runtime.
pub struct FramelinkClient {
    shared: Arc<Shared>,
    events: Mutex<Option<UnboundedReceiver<ClientEvent>>>
}

impl FramelinkClient {
    /// Creates a client and loads its plugins, nodes are created on [`init`].
    ///
    /// `send` is called with voice state payloads that must be sent through the gateway
    /// shard of the guild.
    ///
    /// [`init`]: FramelinkClient::init
    pub fn new(config: Config, send: impl Fn(NonZeroU64, Value) + Send + Sync + 'static) -> Self {
        let (sender, receiver) = unbounded_channel();
        let plugins = config.plugins.clone();

        let shared = Arc::new(Shared {
            players: PlayerManager::new(),
            nodes: NodeManager::new(),
            user_id: RwLock::new(config.user_id),
            config: RwLock::new(config),
            events: EventSender::new(sender),
            gateway: Arc::new(send)
        });

        let client = Self {
            shared,
            events: Mutex::new(Some(receiver))
        };

        for plugin in plugins {
            info!("Loading plugin {}", plugin.name());
            plugin.load(&client);
        }

        client
    }

    /// Sets the id of the bot user and connects to the configured nodes.
    pub fn init(&self, user_id: NonZeroU64) {
        *self.shared.user_id.write() = Some(user_id);

        let (nodes, auto_resume) = {
            let config = self.shared.config.read();
            (config.nodes.clone(), config.auto_resume)
        };

        for node in nodes {
            self.shared.nodes.create(node, auto_resume, Arc::downgrade(&self.shared));
        }
    }

    pub fn user_id(&self) -> Option<NonZeroU64> {
        *self.shared.user_id.read()
    }

    /// Registers a node and starts connecting to it.
    pub fn create_node(&self, config: NodeConfig) -> Arc<Node> {
        let auto_resume = self.shared.config.read().auto_resume;
        self.shared.nodes.create(config, auto_resume, Arc::downgrade(&self.shared))
    }

    /// Destroys the players of a node, then disconnects and unregisters it.
    pub async fn remove_node(&self, id: &str) -> Result<()> {
        if self.shared.nodes.get(id).is_none() {
            return Err(Error::NodeNotFound(id.to_string()));
        }

        for player in self.shared.players.on_node(id) {
            if let Err(e) = player.destroy().await {
                warn!("Failed to destroy player {} of removed node {id}: {e}", player.guild_id());
            }
        }

        self.shared.nodes.remove(id);
        info!("Removed node {id}");
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<Arc<Node>> {
        self.shared.nodes.get(id)
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.shared.nodes.all()
    }

    /// The connected node with the fewest players.
    pub fn best_node(&self) -> Option<Arc<Node>> {
        self.shared.nodes.best()
    }

    /// Returns the player of the guild, creating it on the best node if it doesn't exist.
    pub fn create_player(&self, options: PlayerOptions) -> Result<Arc<Player>> {
        let shared = &self.shared;

        let (player, created) = shared.players.get_or_create(options.guild_id.get(), || {
            let node = shared.nodes.best().ok_or(Error::NoAvailableNode)?;
            let player = Player::new(
                &options,
                node,
                Arc::downgrade(shared),
                shared.events.clone(),
                Arc::clone(&shared.gateway)
            );
            player.spawn_inbox();

            Ok::<_, Error>(player)
        })?;

        if created {
            debug!("Created player {} on node {}", options.guild_id, player.node().id());
        }

        Ok(player)
    }

    pub fn player(&self, guild: NonZeroU64) -> Option<Arc<Player>> {
        self.shared.players.get(guild.get())
    }

    pub fn players(&self) -> Vec<Arc<Player>> {
        self.shared.players.all()
    }

    /// Destroys the player of the guild, returns false if there was none.
    pub async fn destroy_player(&self, guild: NonZeroU64) -> Result<bool> {
        let Some(player) = self.shared.players.remove(guild.get()) else { return Ok(false) };

        player.destroy().await?;
        Ok(true)
    }

    /// Searches tracks on the best node.
    pub async fn search(&self, query: &str, source: &SearchSource) -> Result<LoadResult> {
        let node = self.best_node().ok_or(Error::NoAvailableNode)?;
        node.search(query, source).await
    }

    /// Loads an identifier on the best node as is.
    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResult> {
        let node = self.best_node().ok_or(Error::NoAvailableNode)?;
        node.load_tracks(identifier).await
    }

    /// Forwards a voice state update received from the gateway.
    ///
    /// Updates of other users and guilds without a player are ignored.
    pub async fn handle_voice_state_update(&self, update: VoiceStateUpdate) {
        if self.user_id() != Some(update.user_id) {
            return;
        }

        if let Some(player) = self.player(update.guild_id) {
            player.on_voice_state(&update).await;
        }
    }

    /// Forwards a voice server update received from the gateway.
    pub async fn handle_voice_server_update(&self, update: VoiceServerUpdate) {
        if let Some(player) = self.player(update.guild_id) {
            player.on_voice_server(&update).await;
        }
    }

    /// Returns a stream of the events of the client, `None` if another stream is alive.
    pub fn events(&self) -> Option<EventStream<'_>> {
        EventStream::new(&self.events)
    }

    /// Destroys every player, disconnects every node and unloads the plugins.
    pub async fn destroy(&self) {
        for player in self.shared.players.all() {
            if let Err(e) = player.destroy().await {
                warn!("Failed to destroy player {}: {e}", player.guild_id());
            }
        }

        for node in self.shared.nodes.all() {
            self.shared.nodes.remove(node.id());
        }

        let plugins = self.shared.config.read().plugins.clone();
        for plugin in plugins {
            info!("Unloading plugin {}", plugin.name());
            plugin.unload();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::StreamExt;
    use serde_json::json;

    use crate::config::ProtocolVersion;
    use crate::model::gateway::stats::Stats;
    use crate::msg::ToSocketMessage;
    use super::*;

    fn client() -> FramelinkClient {
        FramelinkClient::new(Config::default(), |_, _| {})
    }

    fn legacy(host: &str) -> NodeConfig {
        NodeConfig {
            version: ProtocolVersion::V3,
            ..NodeConfig::new(host)
        }
    }

    fn guild(id: u64) -> NonZeroU64 {
        NonZeroU64::new(id).unwrap()
    }

    #[tokio::test]
    async fn creating_a_player_twice_returns_the_same_one() {
        let client = client();
        let (node, _rx) = client.shared.nodes.insert_detached(legacy("a"));
        node.set_state(ConnectionState::Ready);

        let first = client.create_player(PlayerOptions::new(guild(1))).unwrap();
        let second = client.create_player(PlayerOptions::new(guild(1))).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(client.players().len(), 1);
        assert!(Arc::ptr_eq(&client.player(guild(1)).unwrap(), &first));
    }

    #[tokio::test]
    async fn players_need_a_connected_node() {
        let client = client();
        client.shared.nodes.insert_detached(legacy("a"));

        assert!(matches!(
            client.create_player(PlayerOptions::new(guild(1))),
            Err(Error::NoAvailableNode)
        ));
        assert!(matches!(
            client.search("song", &SearchSource::Youtube).await,
            Err(Error::NoAvailableNode)
        ));
        assert!(client.player(guild(1)).is_none());
    }

    #[tokio::test]
    async fn players_go_to_the_least_loaded_node() {
        let client = client();
        let (a, _ra) = client.shared.nodes.insert_detached(legacy("a"));
        let (b, _rb) = client.shared.nodes.insert_detached(legacy("b"));

        a.set_state(ConnectionState::Ready);
        b.set_state(ConnectionState::Ready);
        a.set_stats(Stats { players: 0, ..Default::default() });
        b.set_stats(Stats { players: 5, ..Default::default() });

        assert_eq!(client.best_node().unwrap().id(), "a");
        let player = client.create_player(PlayerOptions::new(guild(1))).unwrap();
        assert_eq!(player.node().id(), "a");
    }

    #[tokio::test]
    async fn destroying_players() {
        let client = client();
        let mut events = client.events.lock().take().unwrap();
        let (node, _rx) = client.shared.nodes.insert_detached(legacy("a"));
        node.set_state(ConnectionState::Ready);

        assert!(!client.destroy_player(guild(1)).await.unwrap());

        let player = client.create_player(PlayerOptions::new(guild(1))).unwrap();
        assert!(client.destroy_player(guild(1)).await.unwrap());
        assert!(player.is_destroyed());
        assert!(client.player(guild(1)).is_none());
        assert!(matches!(events.try_recv(), Ok(ClientEvent::PlayerDestroy { .. })));

        let player = client.create_player(PlayerOptions::new(guild(2))).unwrap();
        player.destroy().await.unwrap();
        assert!(client.player(guild(2)).is_none());
    }

    #[tokio::test]
    async fn voice_updates_of_other_users_are_ignored() {
        let client = client();
        client.init(guild(99));
        let (node, mut ops) = client.shared.nodes.insert_detached(legacy("a"));
        node.set_state(ConnectionState::Ready);
        client.create_player(PlayerOptions::new(guild(1))).unwrap();

        let server = VoiceServerUpdate {
            guild_id: guild(1),
            token: "token".into(),
            endpoint: Some("endpoint".into())
        };
        let mut state = VoiceStateUpdate {
            guild_id: guild(1),
            user_id: guild(5),
            channel_id: Some(guild(10)),
            session_id: "session".into()
        };

        client.handle_voice_server_update(server).await;
        client.handle_voice_state_update(state.clone()).await;
        assert!(ops.try_recv().is_err());

        state.user_id = guild(99);
        client.handle_voice_state_update(state).await;
        assert!(matches!(ops.try_recv(), Ok(ToSocketMessage::Send(op)) if op["op"] == "voiceUpdate"));
    }

    #[tokio::test]
    async fn only_one_event_stream_at_a_time() {
        let client = client();

        let stream = client.events().unwrap();
        assert!(client.events().is_none());
        drop(stream);

        client.shared.events.emit(ClientEvent::QueueEnd { guild_id: guild(1) });
        let mut stream = client.events().unwrap();
        assert!(matches!(stream.next().await, Some(ClientEvent::QueueEnd { .. })));
    }

    struct Counter(Arc<AtomicUsize>);

    impl Plugin for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn load(&self, client: &FramelinkClient) {
            assert!(client.nodes().is_empty());
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn unload(&self) {
            self.0.fetch_add(10, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn plugins_are_loaded_and_unloaded() {
        let count = Arc::new(AtomicUsize::new(0));
        let config = Config {
            plugins: vec![Arc::new(Counter(Arc::clone(&count))) as Arc<dyn Plugin>],
            ..Default::default()
        };

        let client = FramelinkClient::new(config, |_, _| {});
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let (node, _rx) = client.shared.nodes.insert_detached(legacy("a"));
        node.set_state(ConnectionState::Ready);
        client.create_player(PlayerOptions::new(guild(1))).unwrap();

        client.destroy().await;
        assert_eq!(count.load(Ordering::SeqCst), 11);
        assert!(client.players().is_empty());
        assert!(client.nodes().is_empty());
    }

    #[tokio::test]
    async fn gateway_receives_voice_payloads() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let client = FramelinkClient::new(Config::default(), move |guild, payload| sink.lock().push((guild, payload)));
        let (node, _rx) = client.shared.nodes.insert_detached(legacy("a"));
        node.set_state(ConnectionState::Ready);

        let player = client.create_player(PlayerOptions::new(guild(3))).unwrap();
        player.connect(guild(4), false, false).await.unwrap();

        let sent = sent.lock();
        assert_eq!(sent[0].0, guild(3));
        assert_eq!(sent[0].1["d"]["channel_id"], json!("4"));
    }
}
