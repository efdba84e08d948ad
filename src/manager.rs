use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::node::Node;
use crate::player::Player;
use crate::socket::NodeRunner;
use crate::Shared;

/// Players of a client, keyed by guild id.
pub(crate) struct PlayerManager {
    players: DashMap<u64, Arc<Player>>
}

impl PlayerManager {
    pub fn new() -> Self {
        Self {
            players: DashMap::new()
        }
    }

    pub fn get(&self, guild: u64) -> Option<Arc<Player>> {
        self.players.get(&guild).map(|p| Arc::clone(p.value()))
    }

    /// Returns the player of the guild, creating it with `create` if there is none.
    ///
    /// The entry stays locked while `create` runs, so concurrent calls for the same guild
    /// always get the same player.
    pub fn get_or_create<E>(
        &self,
        guild: u64,
        create: impl FnOnce() -> Result<Arc<Player>, E>
    ) -> Result<(Arc<Player>, bool), E> {
        match self.players.entry(guild) {
            Entry::Occupied(e) => Ok((Arc::clone(e.get()), false)),
            Entry::Vacant(e) => {
                let player = create()?;
                e.insert(Arc::clone(&player));
                Ok((player, true))
            }
        }
    }

    pub fn remove(&self, guild: u64) -> Option<Arc<Player>> {
        self.players.remove(&guild).map(|(_, p)| p)
    }

    /// Removes the player of its guild, only if it wasn't replaced by another one.
    pub fn remove_if_same(&self, player: &Player) {
        self.players.remove_if(&player.guild_id().get(), |_, p| std::ptr::eq(Arc::as_ptr(p), player));
    }

    pub fn all(&self) -> Vec<Arc<Player>> {
        self.players.iter().map(|p| Arc::clone(p.value())).collect()
    }

    /// Players living on the given node.
    pub fn on_node(&self, node: &str) -> Vec<Arc<Player>> {
        self.players.iter()
            .filter(|p| p.node().id() == node)
            .map(|p| Arc::clone(p.value()))
            .collect()
    }
}

/// Nodes of a client, keyed by their identifier.
pub(crate) struct NodeManager {
    nodes: DashMap<String, Arc<Node>>,
    counter: AtomicUsize
}

impl NodeManager {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            counter: AtomicUsize::new(0)
        }
    }

    /// Registers a node, spawns its socket task and starts connecting.
    ///
    /// A node already registered with the same identifier is shut down and replaced.
    pub fn create(&self, config: NodeConfig, auto_resume: bool, shared: Weak<Shared>) -> Arc<Node> {
        let order = self.counter.fetch_add(1, Ordering::Relaxed);
        let (node, receiver) = Node::new(config, order, auto_resume);

        if let Some(old) = self.nodes.insert(node.id().to_string(), Arc::clone(&node)) {
            debug!("Replacing node {}", old.id());
            old.kill();
        }

        tokio::spawn(NodeRunner::new(Arc::clone(&node), shared, receiver).run());
        info!("Created node {}", node.id());
        node.connect();

        node
    }

    pub fn get(&self, id: &str) -> Option<Arc<Node>> {
        self.nodes.get(id).map(|n| Arc::clone(n.value()))
    }

    /// Unregisters a node and shuts down its socket task.
    pub fn remove(&self, id: &str) -> Option<Arc<Node>> {
        let (_, node) = self.nodes.remove(id)?;
        node.kill();
        Some(node)
    }

    pub fn all(&self) -> Vec<Arc<Node>> {
        let mut nodes = self.nodes.iter().map(|n| Arc::clone(n.value())).collect::<Vec<_>>();
        nodes.sort_by_key(|n| n.order());
        nodes
    }

    /// The available node with the fewest players, the oldest one wins ties.
    pub fn best(&self) -> Option<Arc<Node>> {
        self.nodes.iter()
            .filter(|n| n.is_available())
            .min_by_key(|n| (n.players(), n.order()))
            .map(|n| Arc::clone(n.value()))
    }

    /// Registers a node without a socket task.
    #[cfg(test)]
    pub(crate) fn insert_detached(&self, config: NodeConfig) -> (Arc<Node>, tokio::sync::mpsc::UnboundedReceiver<crate::msg::ToSocketMessage>) {
        let order = self.counter.fetch_add(1, Ordering::Relaxed);
        let (node, receiver) = Node::new(config, order, false);
        self.nodes.insert(node.id().to_string(), Arc::clone(&node));

        (node, receiver)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ProtocolVersion;
    use crate::model::gateway::stats::Stats;
    use crate::node::ConnectionState;
    use super::*;

    fn legacy(host: &str) -> NodeConfig {
        NodeConfig {
            version: ProtocolVersion::V3,
            ..NodeConfig::new(host)
        }
    }

    fn stats(players: u64) -> Stats {
        Stats {
            players,
            ..Default::default()
        }
    }

    #[test]
    fn best_node_has_fewest_players() {
        let nodes = NodeManager::new();
        let (a, _ra) = nodes.insert_detached(legacy("a"));
        let (b, _rb) = nodes.insert_detached(legacy("b"));
        assert!(nodes.best().is_none());

        a.set_state(ConnectionState::Ready);
        a.set_stats(stats(0));
        assert_eq!(nodes.best().unwrap().id(), "a");

        b.set_state(ConnectionState::Ready);
        b.set_stats(stats(5));
        assert_eq!(nodes.best().unwrap().id(), "a");

        a.set_stats(stats(6));
        assert_eq!(nodes.best().unwrap().id(), "b");
    }

    #[test]
    fn ties_go_to_the_oldest_node() {
        let nodes = NodeManager::new();
        let (a, _ra) = nodes.insert_detached(legacy("a"));
        let (b, _rb) = nodes.insert_detached(legacy("b"));
        a.set_state(ConnectionState::Ready);
        b.set_state(ConnectionState::Ready);

        assert_eq!(nodes.best().unwrap().id(), "a");
        assert_eq!(nodes.all().iter().map(|n| n.id()).collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn session_nodes_need_their_session() {
        let nodes = NodeManager::new();
        let (a, _ra) = nodes.insert_detached(NodeConfig::new("a"));
        a.set_state(ConnectionState::Ready);
        assert!(nodes.best().is_none());

        a.set_session(Some("session".into()));
        assert_eq!(nodes.best().unwrap().id(), "a");
    }

    #[test]
    fn removing_a_node_stops_its_task() {
        let nodes = NodeManager::new();
        let (_a, mut receiver) = nodes.insert_detached(legacy("a"));

        assert!(nodes.remove("a").is_some());
        assert!(nodes.get("a").is_none());
        assert!(matches!(receiver.try_recv(), Ok(crate::msg::ToSocketMessage::Kill)));
        assert!(nodes.remove("a").is_none());
    }
}
