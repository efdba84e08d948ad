use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use crate::plugin::Plugin;

/// Protocol spoken by a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// Operations are sent through the websocket.
    V3,
    /// Players are updated through the rest api, addressed by session.
    #[default]
    V4
}

/// Configuration of a single node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Identifier of the node, the host is used if none is given.
    pub id: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Whether to use `wss`/`https`.
    pub ssl: bool,
    pub version: ProtocolVersion,
    /// Times the node reconnects before giving up.
    pub retry_amount: u32,
    /// Delay between reconnects.
    pub retry_delay: Duration,
    /// Key used to resume legacy sessions.
    pub resume_key: Option<String>,
    /// Time the node keeps a session alive after disconnecting.
    pub resume_timeout: Duration
}

impl NodeConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn identifier(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.host.clone())
    }

    pub(crate) fn http_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    pub(crate) fn ws_url(&self) -> String {
        let scheme = if self.ssl { "wss" } else { "ws" };
        let path = match self.version {
            ProtocolVersion::V3 => "",
            ProtocolVersion::V4 => "/v4/websocket"
        };

        format!("{scheme}://{}:{}{path}", self.host, self.port)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: None,
            host: String::from("localhost"),
            port: 2333,
            password: String::from("youshallnotpass"),
            ssl: false,
            version: ProtocolVersion::V4,
            retry_amount: 5,
            retry_delay: Duration::from_secs(5),
            resume_key: None,
            resume_timeout: Duration::from_secs(60)
        }
    }
}

#[derive(Clone, Default)]
pub struct Config {
    /// Nodes created when the client is initialized.
    pub nodes: Vec<NodeConfig>,
    /// Id of the bot user, can also be provided later on `init`.
    pub user_id: Option<NonZeroU64>,
    /// Whether to resume sessions and players after the node reconnects.
    pub auto_resume: bool,
    pub plugins: Vec<Arc<dyn Plugin>>
}
