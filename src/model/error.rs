use serde::Deserialize;
use thiserror::Error;

/// Error body returned by the node on unsuccessful requests.
#[derive(Deserialize, Debug, Error)]
#[error("Node responded with an error: {message}")]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Http status reported by the node.
    #[serde(default)]
    pub status: u16,
    /// Short reason phrase of the status.
    #[serde(default)]
    pub error: String,
    /// Detailed message.
    #[serde(default)]
    pub message: String,
    /// The route that failed.
    #[serde(default)]
    pub path: String
}

/// Exception reported by the node when loading or playing a track fails.
#[derive(Deserialize, Debug, Clone, Error)]
#[error("{severity:?} exception: {}", .message.as_deref().unwrap_or("unknown"))]
pub struct Exception {
    /// Message of the exception, if any.
    #[serde(default)]
    pub message: Option<String>,
    pub severity: Severity,
    /// Cause of the exception.
    #[serde(default)]
    pub cause: String
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The cause is known and expected.
    #[serde(alias = "COMMON")]
    Common,
    /// The cause might not be exactly known, but is possibly caused by outside factors.
    #[serde(alias = "SUSPICIOUS")]
    Suspicious,
    /// The probable cause is an issue with the node or a bug in it.
    #[serde(alias = "FAULT")]
    Fault
}
