use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::sink::{AudioSink, VoiceTransport};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("failed to join voice channel: {0}")]
    Join(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannel {
    pub id: ChannelId,
    pub name: String,
}

impl VoiceChannel {
    pub fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A live connection to one voice channel with the player's sink attached.
///
/// Consumed by [`VoiceSubscription::destroy`], so it can only be torn down once.
pub struct VoiceSubscription<C> {
    channel: VoiceChannel,
    connection: C,
}

impl<C> VoiceSubscription<C> {
    /// Joins `channel` and binds `sink` to it. Failures are logged and returned;
    /// reconnecting is left to the caller.
    pub async fn create<S, T>(
        transport: &T,
        guild_id: GuildId,
        channel: VoiceChannel,
        sink: &Arc<S>,
    ) -> Result<Self, VoiceError>
    where
        S: AudioSink,
        T: VoiceTransport<S, Connection = C>,
    {
        match transport.connect(guild_id, channel.id, sink).await {
            Ok(connection) => {
                info!("🔊 Subscribed to {} in guild {}", channel.name, guild_id);
                Ok(Self {
                    channel,
                    connection,
                })
            }
            Err(e) => {
                warn!("Could not subscribe to {} in guild {}: {}", channel.name, guild_id, e);
                Err(e)
            }
        }
    }

    pub fn channel(&self) -> &VoiceChannel {
        &self.channel
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel.id
    }

    /// Unbinds the sink and releases the connection.
    pub async fn destroy<S, T>(self, transport: &T, guild_id: GuildId, sink: &Arc<S>)
    where
        S: AudioSink,
        T: VoiceTransport<S, Connection = C>,
    {
        transport.disconnect(guild_id, self.connection, sink).await;
        info!("👋 Unsubscribed from {} in guild {}", self.channel.name, guild_id);
    }
}
