use std::collections::HashMap;
use std::num::NonZeroU64;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use twilight_gateway::MessageSender;
use twilight_model::gateway::event::Event;
use twilight_model::gateway::payload::incoming;

use crate::model::connection::{VoiceServerUpdate, VoiceStateUpdate};
use crate::FramelinkClient;

/// The voice state was received outside of a guild.
#[derive(Debug, Error)]
#[error("The voice state doesn't belong to a guild")]
pub struct MissingGuild;

impl TryFrom<&incoming::VoiceStateUpdate> for VoiceStateUpdate {
    type Error = MissingGuild;

    fn try_from(update: &incoming::VoiceStateUpdate) -> Result<Self, Self::Error> {
        let state = &update.0;

        Ok(Self {
            guild_id: state.guild_id.ok_or(MissingGuild)?.into_nonzero(),
            user_id: state.user_id.into_nonzero(),
            channel_id: state.channel_id.map(|c| c.into_nonzero()),
            session_id: state.session_id.clone()
        })
    }
}

impl From<&incoming::VoiceServerUpdate> for VoiceServerUpdate {
    fn from(update: &incoming::VoiceServerUpdate) -> Self {
        Self {
            guild_id: update.guild_id.into_nonzero(),
            token: update.token.clone(),
            endpoint: update.endpoint.clone()
        }
    }
}

/// Senders of the shards of a bot, used to route voice payloads to the shard of each guild.
pub struct ShardSenders {
    shards: HashMap<u64, MessageSender>
}

impl ShardSenders {
    pub fn new(shards: HashMap<u64, MessageSender>) -> Self {
        Self {
            shards
        }
    }

    pub fn for_guild(&self, guild: NonZeroU64) -> Option<&MessageSender> {
        self.shards.get(&shard_id(guild.get(), self.shards.len() as _)?)
    }

    /// Sends a payload through the shard of the guild, failures are logged.
    pub fn send(&self, guild: NonZeroU64, payload: Value) {
        let Some(sender) = self.for_guild(guild) else {
            warn!("No shard available for guild {guild}");
            return;
        };

        if let Err(e) = sender.send(payload.to_string()) {
            warn!("Failed to send voice payload of guild {guild}: {e}");
        }
    }
}

#[inline]
fn shard_id(guild_id: u64, shard_count: u64) -> Option<u64> {
    (shard_count > 0).then(|| (guild_id >> 22) % shard_count)
}

impl FramelinkClient {
    /// Forwards the voice events of a gateway event, anything else is ignored.
    pub async fn process(&self, event: &Event) {
        match event {
            Event::VoiceStateUpdate(update) => {
                if let Ok(update) = VoiceStateUpdate::try_from(&**update) {
                    self.handle_voice_state_update(update).await;
                }
            },
            Event::VoiceServerUpdate(update) => self.handle_voice_server_update(update.into()).await,
            _ => {}
        }
    }
}
