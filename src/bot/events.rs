use serenity::{async_trait, model::id::GuildId};
use songbird::{
    Call, CoreEvent, Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::audio::sink::{PlaybackId, SinkEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardedEvent {
    Idle,
    Error,
}

/// Relays songbird track events to the owning player, tagged with the
/// playback they belong to.
pub struct SinkEventForwarder {
    pub playback: PlaybackId,
    pub kind: ForwardedEvent,
    pub events: UnboundedSender<SinkEvent>,
}

#[async_trait]
impl VoiceEventHandler for SinkEventForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        let event = match self.kind {
            ForwardedEvent::Idle => SinkEvent::idle(self.playback),
            ForwardedEvent::Error => {
                let reason = match ctx {
                    EventContext::Track(track_list) => track_list
                        .iter()
                        .map(|(state, _handle)| format!("{:?}", state.playing))
                        .collect::<Vec<_>>()
                        .join(", "),
                    _ => "unknown track error".to_string(),
                };
                SinkEvent::error(self.playback, reason)
            }
        };

        if self.events.send(event).is_err() {
            debug!("Player for {} is gone, dropping sink event", self.playback);
        }

        None
    }
}

/// Logs driver-level connection changes for a guild.
pub struct ConnectionLogger {
    pub guild_id: GuildId,
}

#[async_trait]
impl VoiceEventHandler for ConnectionLogger {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        match ctx {
            EventContext::DriverConnect(_) => {
                info!("🔗 Voice driver connected in guild {}", self.guild_id);
            }
            EventContext::DriverReconnect(_) => {
                info!("🔄 Voice driver reconnected in guild {}", self.guild_id);
            }
            EventContext::DriverDisconnect(data) => {
                warn!(
                    "🔌 Voice driver disconnected in guild {}: {:?}",
                    self.guild_id, data.reason
                );
            }
            _ => {}
        }

        None
    }
}

pub fn register_connection_events(call: &mut Call, guild_id: GuildId) {
    for event in [
        CoreEvent::DriverConnect,
        CoreEvent::DriverReconnect,
        CoreEvent::DriverDisconnect,
    ] {
        call.add_global_event(event.into(), ConnectionLogger { guild_id });
    }
}
