use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{input::Input, tracks::TrackHandle, Call, Event, Songbird, TrackEvent};
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::{debug, info, warn};

use super::{
    sink::{AudioSink, PlaybackId, SinkError, SinkEvent, VoiceTransport},
    subscription::VoiceError,
};
use crate::bot::events::{register_connection_events, ForwardedEvent, SinkEventForwarder};

/// Songbird-backed output of one guild's player.
///
/// The sink plays into whichever `Call` its subscription attached. Track end
/// and error events are tagged with the playback id and sent to the player.
pub struct SongbirdSink {
    guild_id: GuildId,
    call: Mutex<Option<Arc<Mutex<Call>>>>,
    current: parking_lot::Mutex<Option<TrackHandle>>,
    events: UnboundedSender<SinkEvent>,
}

impl SongbirdSink {
    pub fn new(guild_id: GuildId, events: UnboundedSender<SinkEvent>) -> Self {
        Self {
            guild_id,
            call: Mutex::new(None),
            current: parking_lot::Mutex::new(None),
            events,
        }
    }

    pub async fn attach(&self, call: Arc<Mutex<Call>>) {
        *self.call.lock().await = Some(call);
    }

    /// Forgets the call. The current track is not halted.
    pub async fn detach(&self) {
        self.call.lock().await.take();
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    type Resource = Input;

    async fn play(&self, playback: PlaybackId, resource: Input) -> Result<(), SinkError> {
        let call = self.call.lock().await.clone().ok_or(SinkError::Detached)?;
        let handle = call.lock().await.play_only_input(resource);

        for (event, kind) in [
            (TrackEvent::End, ForwardedEvent::Idle),
            (TrackEvent::Error, ForwardedEvent::Error),
        ] {
            handle
                .add_event(
                    Event::Track(event),
                    SinkEventForwarder {
                        playback,
                        kind,
                        events: self.events.clone(),
                    },
                )
                .map_err(|e| SinkError::Rejected(e.to_string()))?;
        }

        debug!("Sink in guild {} started {}", self.guild_id, playback);
        self.current.lock().replace(handle);
        Ok(())
    }

    async fn stop(&self) -> bool {
        let Some(handle) = self.current.lock().take() else {
            return false;
        };
        handle.stop().is_ok()
    }
}

/// Joins and leaves voice channels through the shared songbird manager.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceTransport<SongbirdSink> for SongbirdTransport {
    type Connection = Arc<Mutex<Call>>;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        sink: &Arc<SongbirdSink>,
    ) -> Result<Self::Connection, VoiceError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Join(e.to_string()))?;

        {
            let mut handler = call.lock().await;
            handler.remove_all_global_events();
            register_connection_events(&mut handler, guild_id);
        }
        sink.attach(call.clone()).await;

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(call)
    }

    async fn disconnect(&self, guild_id: GuildId, call: Self::Connection, sink: &Arc<SongbirdSink>) {
        sink.detach().await;
        // Leaving keeps the driver alive so a later join resumes the same mixer.
        if let Err(e) = call.lock().await.leave().await {
            warn!("Error leaving voice channel in guild {}: {:?}", guild_id, e);
        }
    }

    async fn release(&self, guild_id: GuildId) {
        if let Err(e) = self.manager.remove(guild_id).await {
            debug!("No voice call to remove for guild {}: {:?}", guild_id, e);
        }
    }
}
