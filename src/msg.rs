use serde_json::Value;

/// Commands sent from a node handle to its socket task.
#[derive(Debug)]
pub(crate) enum ToSocketMessage {
    Connect,
    Disconnect,
    Send(Value),
    Kill
}
