use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, sync::Arc};
use thiserror::Error;

use super::subscription::VoiceError;

/// Identifies one resource handed to a sink. Events carry it back so the
/// player can tell a current event from a stale one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackId(pub u64);

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEventKind {
    /// The resource finished or was halted; the sink is idle.
    Idle,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEvent {
    pub playback: PlaybackId,
    pub kind: SinkEventKind,
}

impl SinkEvent {
    pub fn idle(playback: PlaybackId) -> Self {
        Self {
            playback,
            kind: SinkEventKind::Idle,
        }
    }

    pub fn error(playback: PlaybackId, message: impl Into<String>) -> Self {
        Self {
            playback,
            kind: SinkEventKind::Error(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("audio sink is not attached to a voice connection")]
    Detached,
    #[error("audio sink rejected the resource: {0}")]
    Rejected(String),
}

/// The single audio output owned by a player.
///
/// Playing a resource replaces whatever the sink was playing before. The sink
/// reports `Idle`/`Error` transitions as [`SinkEvent`]s on a channel handed to
/// it at construction.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    type Resource: Send + 'static;

    async fn play(&self, playback: PlaybackId, resource: Self::Resource) -> Result<(), SinkError>;

    /// Halts the current resource. Returns `false` if nothing was playing.
    async fn stop(&self) -> bool;
}

/// Voice transport that carries a sink's output to a channel.
#[async_trait]
pub trait VoiceTransport<S: AudioSink>: Send + Sync + 'static {
    type Connection: Send + Sync + 'static;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        sink: &Arc<S>,
    ) -> Result<Self::Connection, VoiceError>;

    async fn disconnect(&self, guild_id: GuildId, connection: Self::Connection, sink: &Arc<S>);

    /// Frees whatever per-guild state the transport keeps between
    /// connections. Called once when the guild's player is destroyed.
    async fn release(&self, _guild_id: GuildId) {}
}
