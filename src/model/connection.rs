use std::num::NonZeroU64;
use serde::Serialize;

/// A voice state update received from the gateway.
#[derive(Clone, Debug)]
pub struct VoiceStateUpdate {
    /// Guild the voice state belongs to.
    pub guild_id: NonZeroU64,
    /// User the voice state belongs to, only our own updates are used.
    pub user_id: NonZeroU64,
    /// Channel the user is in, `None` if it left voice.
    pub channel_id: Option<NonZeroU64>,
    /// Session id of the voice connection.
    pub session_id: String
}

/// A voice server update received from the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceServerUpdate {
    pub guild_id: NonZeroU64,
    /// Token of the connection.
    pub token: String,
    /// Endpoint to connect to, `None` while discord allocates a new server.
    pub endpoint: Option<String>
}

/// Voice information sent to the node so it can join the voice channel.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub token: String,
    pub endpoint: String,
    pub session_id: String
}

/// Both halves of a voice update, they arrive independently from each other.
///
/// The state is kept after being sent so it can be replayed after the node reconnects.
#[derive(Default, Debug)]
pub(crate) struct VoiceUpdateState {
    session_id: Option<String>,
    server: Option<VoiceServerUpdate>,
    dirty: bool
}

impl VoiceUpdateState {
    pub fn set_session(&mut self, session_id: &str) {
        if self.session_id.as_deref() != Some(session_id) {
            self.session_id = Some(session_id.to_string());
            self.dirty = true;
        }
    }

    pub fn set_server(&mut self, server: &VoiceServerUpdate) {
        if self.server.as_ref() != Some(server) {
            self.server = Some(server.clone());
            self.dirty = true;
        }
    }

    /// Drops the server half, the session id is kept for a later resume.
    pub fn clear_server(&mut self) {
        self.server = None;
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn server(&self) -> Option<&VoiceServerUpdate> {
        self.server.as_ref()
    }

    pub fn complete(&self) -> bool {
        self.session_id.is_some()
            && self.server.as_ref().map(|s| s.endpoint.is_some()).unwrap_or(false)
    }

    /// Marks the current halves as not sent yet.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns the merged voice state if both halves are present and changed since the
    /// last call.
    pub fn take_pending(&mut self) -> Option<VoiceState> {
        if !self.dirty || !self.complete() {
            return None;
        }

        let state = self.to_voice()?;
        self.dirty = false;
        Some(state)
    }

    pub fn to_voice(&self) -> Option<VoiceState> {
        let server = self.server.as_ref()?;

        Some(VoiceState {
            token: server.token.clone(),
            endpoint: server.endpoint.clone()?,
            session_id: self.session_id.clone()?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(token: &str) -> VoiceServerUpdate {
        VoiceServerUpdate {
            guild_id: NonZeroU64::new(1).unwrap(),
            token: token.to_string(),
            endpoint: Some("eu-west.discord.media:443".into())
        }
    }

    #[test]
    fn single_half_is_never_sent() {
        let mut state = VoiceUpdateState::default();
        state.set_session("session");
        assert!(state.take_pending().is_none());

        let mut state = VoiceUpdateState::default();
        state.set_server(&server("token"));
        assert!(state.take_pending().is_none());
    }

    #[test]
    fn complete_pair_is_sent_once() {
        let mut state = VoiceUpdateState::default();
        state.set_session("session");
        state.set_server(&server("token"));

        let voice = state.take_pending().unwrap();
        assert_eq!(voice.session_id, "session");
        assert_eq!(voice.token, "token");
        assert!(state.take_pending().is_none());

        state.set_session("session");
        assert!(state.take_pending().is_none());

        state.set_server(&server("other"));
        assert_eq!(state.take_pending().unwrap().token, "other");
    }

    #[test]
    fn state_survives_sending() {
        let mut state = VoiceUpdateState::default();
        state.set_session("session");
        state.set_server(&server("token"));
        state.take_pending();

        state.mark_dirty();
        assert!(state.take_pending().is_some());
    }

    #[test]
    fn missing_endpoint_is_incomplete() {
        let mut state = VoiceUpdateState::default();
        state.set_session("session");
        state.set_server(&VoiceServerUpdate { endpoint: None, ..server("token") });

        assert!(!state.complete());
        assert!(state.take_pending().is_none());
    }

    #[test]
    fn clearing_server_keeps_session() {
        let mut state = VoiceUpdateState::default();
        state.set_session("session");
        state.set_server(&server("token"));
        state.clear_server();

        assert_eq!(state.session_id(), Some("session"));
        assert!(state.server().is_none());
        assert!(!state.complete());
    }
}
