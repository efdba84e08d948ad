use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::config::ProtocolVersion;
use crate::events::ClientEvent;
use crate::model::gateway::IncomingPayload;
use crate::node::Node;
use crate::player::PlayerEvent;
use crate::Shared;

/// Routes a payload received from `node` to the node itself, the owning player or the
/// application.
pub(crate) fn dispatch(shared: &Shared, node: &Arc<Node>, payload: IncomingPayload) {
    match payload {
        IncomingPayload::Ready(ready) => {
            info!("Node {} is ready (session: {}, resumed: {})", node.id(), ready.session_id, ready.resumed);
            node.set_session(Some(ready.session_id.clone()));

            shared.events.emit(ClientEvent::NodeReady {
                node: node.id().to_string(),
                session_id: ready.session_id,
                resumed: ready.resumed
            });

            if node.auto_resume() && node.version() == ProtocolVersion::V4 {
                let node = Arc::clone(node);
                tokio::spawn(async move {
                    if let Err(e) = node.configure_resuming().await {
                        warn!("Failed to enable resuming on node {}: {e}", node.id());
                    }
                });
            }

            if !ready.resumed {
                resync_players(shared, node);
            }
        },
        IncomingPayload::Stats(stats) => {
            trace!("Received stats from node {}", node.id());
            node.set_stats(stats.clone());
            shared.events.emit(ClientEvent::NodeStats { node: node.id().to_string(), stats });
        },
        IncomingPayload::PlayerUpdate(update) => match shared.players.get(update.guild_id.get()) {
            Some(player) => player.deliver(PlayerEvent::State(update.state)),
            None => trace!("Dropping state of unknown player {}", update.guild_id)
        },
        IncomingPayload::Event(event) => {
            let guild = event.guild_id();

            match shared.players.get(guild.get()) {
                Some(player) => player.deliver(PlayerEvent::Event(event)),
                None => debug!("Dropping event of unknown player {guild}")
            }
        },
        IncomingPayload::Unknown(payload) => {
            debug!("Received unknown payload from node {}", node.id());
            shared.events.emit(ClientEvent::NodeMessage { node: node.id().to_string(), payload });
        }
    }
}

/// Makes every player of `node` replay its state after the node lost it.
pub(crate) fn resync_players(shared: &Shared, node: &Arc<Node>) {
    for player in shared.players.on_node(node.id()) {
        player.deliver(PlayerEvent::Resync);
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use crate::config::{Config, NodeConfig};
    use crate::events::ClientEvent;
    use crate::msg::ToSocketMessage;
    use crate::node::ConnectionState;
    use crate::player::PlayerOptions;
    use crate::FramelinkClient;
    use super::*;

    fn payload(value: serde_json::Value) -> IncomingPayload {
        IncomingPayload::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn ready_records_session() {
        let client = FramelinkClient::new(Config::default(), |_, _| {});
        let mut events = client.events.lock().take().unwrap();
        let (node, _rx) = client.shared.nodes.insert_detached(NodeConfig::new("a"));
        node.set_state(ConnectionState::Ready);
        assert!(!node.is_available());

        dispatch(&client.shared, &node, payload(json!({ "op": "ready", "resumed": false, "sessionId": "abc" })));

        assert_eq!(node.session_id().as_deref(), Some("abc"));
        assert!(node.is_available());
        assert!(matches!(
            events.try_recv(),
            Ok(ClientEvent::NodeReady { session_id, resumed: false, .. }) if session_id == "abc"
        ));
    }

    #[tokio::test]
    async fn stats_and_unknown_payloads_are_published() {
        let client = FramelinkClient::new(Config::default(), |_, _| {});
        let mut events = client.events.lock().take().unwrap();
        let (node, _rx) = client.shared.nodes.insert_detached(NodeConfig::new("a"));

        dispatch(&client.shared, &node, payload(json!({ "op": "stats", "players": 4 })));
        dispatch(&client.shared, &node, payload(json!({ "op": "somethingNew" })));

        assert_eq!(node.players(), 4);
        assert!(matches!(events.try_recv(), Ok(ClientEvent::NodeStats { stats, .. }) if stats.players == 4));
        assert!(matches!(events.try_recv(), Ok(ClientEvent::NodeMessage { payload, .. }) if payload["op"] == "somethingNew"));
    }

    #[tokio::test]
    async fn player_payloads_reach_their_player() {
        let client = FramelinkClient::new(Config::default(), |_, _| {});
        let mut events = client.events.lock().take().unwrap();
        let (node, _rx) = client.shared.nodes.insert_detached(NodeConfig {
            version: crate::config::ProtocolVersion::V3,
            ..NodeConfig::new("a")
        });
        node.set_state(ConnectionState::Ready);
        let player = client.create_player(PlayerOptions::new(NonZeroU64::new(1).unwrap())).unwrap();

        dispatch(&client.shared, &node, payload(json!({
            "op": "playerUpdate",
            "guildId": "2",
            "state": { "position": 5000 }
        })));
        dispatch(&client.shared, &node, payload(json!({
            "op": "playerUpdate",
            "guildId": "1",
            "state": { "time": 10, "position": 5000, "connected": true, "ping": 20 }
        })));
        dispatch(&client.shared, &node, payload(json!({
            "op": "event",
            "type": "WebSocketClosedEvent",
            "guildId": "1",
            "code": 4006,
            "reason": "Session is no longer valid.",
            "byRemote": true
        })));

        let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        assert!(matches!(event, ClientEvent::SocketClosed { code: 4006, by_remote: true, .. }));

        let info = player.info().await.unwrap();
        assert_eq!(info.position, Duration::from_secs(5));
        assert_eq!(info.ping, 20);
        assert!(info.connected);
    }

    #[tokio::test]
    async fn fresh_sessions_replay_voice_state() {
        let client = FramelinkClient::new(Config::default(), |_, _| {});
        client.init(NonZeroU64::new(9).unwrap());
        let (node, mut ops) = client.shared.nodes.insert_detached(NodeConfig {
            version: crate::config::ProtocolVersion::V3,
            ..NodeConfig::new("a")
        });
        node.set_state(ConnectionState::Ready);

        let guild = NonZeroU64::new(1).unwrap();
        client.create_player(PlayerOptions::new(guild)).unwrap();
        client.handle_voice_state_update(crate::model::connection::VoiceStateUpdate {
            guild_id: guild,
            user_id: NonZeroU64::new(9).unwrap(),
            channel_id: NonZeroU64::new(3),
            session_id: "session".into()
        }).await;
        client.handle_voice_server_update(crate::model::connection::VoiceServerUpdate {
            guild_id: guild,
            token: "token".into(),
            endpoint: Some("endpoint".into())
        }).await;
        assert!(matches!(ops.try_recv(), Ok(ToSocketMessage::Send(op)) if op["op"] == "voiceUpdate"));

        dispatch(&client.shared, &node, payload(json!({ "op": "ready", "resumed": true, "sessionId": "s" })));
        dispatch(&client.shared, &node, payload(json!({ "op": "ready", "resumed": false, "sessionId": "s" })));

        let replayed = timeout(Duration::from_secs(1), ops.recv()).await.unwrap();
        assert!(matches!(replayed, Some(ToSocketMessage::Send(op)) if op["op"] == "voiceUpdate"));
        assert!(ops.try_recv().is_err());
    }
}
