use thiserror::Error;

/// Errors returned by the client.
#[derive(Debug, Error)]
pub enum Error {
    /// There's no connected node to use.
    #[error("No available nodes")]
    NoAvailableNode,
    /// The requested node isn't registered.
    #[error("Node {0} not found")]
    NodeNotFound(String),
    /// The player was destroyed and can't be used anymore.
    #[error("The player was destroyed")]
    PlayerDestroyed,
    /// The node hasn't sent its session id yet.
    #[error("The node has no session yet")]
    NoSession,
    /// Http request failed.
    #[error("Http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The node returned an unsuccessful status.
    #[error("Node responded with status {status}: {message}")]
    Server {
        status: u16,
        message: String
    },
    /// The node returned a malformed response.
    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error)
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub(crate) enum SocketError {
    #[error(transparent)]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),
    #[error(transparent)]
    Header(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),
    #[error("Timed out while connecting")]
    Timeout
}
