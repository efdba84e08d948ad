use serde::Deserialize;

/// Sent by a node once its control channel is open.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ready {
    /// Legacy nodes don't send it.
    #[serde(default)]
    pub resumed: bool,
    /// Identifies the session in the node's REST routes.
    pub session_id: String
}
