use parking_lot::RwLock;
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    queue::TrackQueue,
    sink::{AudioSink, PlaybackId, SinkError, SinkEvent, SinkEventKind, VoiceTransport},
    subscription::{VoiceChannel, VoiceError, VoiceSubscription},
    track::{SharedTrack, TrackContentError},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerState {
    #[default]
    Idle,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("player is not subscribed to a voice channel")]
    NotSubscribed,
    #[error(transparent)]
    ContentUnavailable(#[from] TrackContentError),
    #[error("playback changed while the track was loading")]
    Superseded,
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("audio device error: {0}")]
    Device(String),
    #[error(transparent)]
    Voice(#[from] VoiceError),
    #[error("player has been destroyed")]
    Destroyed,
}

pub type ErrorListener = Box<dyn Fn(&PlayerError) + Send + Sync>;

struct PlayerInner<R, C> {
    state: PlayerState,
    now_playing: Option<SharedTrack<R>>,
    queue: TrackQueue<R>,
    subscription: Option<VoiceSubscription<C>>,
    idle_since: Option<Instant>,
    /// Resource currently owned by the sink. Cleared once its idle event is consumed.
    playback: Option<PlaybackId>,
    /// Load whose content is still being resolved.
    pending_load: Option<PlaybackId>,
    last_playback: u64,
    destroyed: bool,
}

impl<R, C> PlayerInner<R, C> {
    fn ensure_can_load(&self) -> Result<(), PlayerError> {
        if self.destroyed {
            return Err(PlayerError::Destroyed);
        }
        if self.subscription.is_none() {
            return Err(PlayerError::NotSubscribed);
        }
        Ok(())
    }

    fn start_load(&mut self) -> PlaybackId {
        self.last_playback += 1;
        let load = PlaybackId(self.last_playback);
        self.pending_load = Some(load);
        load
    }

    fn is_busy(&self) -> bool {
        self.state == PlayerState::Playing || self.pending_load.is_some()
    }
}

/// Per-guild playback state machine.
///
/// Holds at most one voice subscription and feeds at most one resource to its
/// sink. State lives behind an async mutex that is never held while a track's
/// content is being resolved, so a `stop` can land mid-load; the load then
/// finishes and its result is discarded.
pub struct MusicPlayer<S: AudioSink, T: VoiceTransport<S>> {
    guild_id: GuildId,
    sink: Arc<S>,
    transport: Arc<T>,
    inner: Mutex<PlayerInner<S::Resource, T::Connection>>,
    listeners: RwLock<Vec<ErrorListener>>,
}

impl<S, T> MusicPlayer<S, T>
where
    S: AudioSink,
    T: VoiceTransport<S>,
{
    pub fn new(guild_id: GuildId, sink: Arc<S>, transport: Arc<T>) -> Self {
        Self {
            guild_id,
            sink,
            transport,
            inner: Mutex::new(PlayerInner {
                state: PlayerState::Idle,
                now_playing: None,
                queue: TrackQueue::new(),
                subscription: None,
                idle_since: Some(Instant::now()),
                playback: None,
                pending_load: None,
                last_playback: 0,
                destroyed: false,
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Makes `channel` the voice channel the sink plays into. No-op when
    /// already there; otherwise the old subscription is destroyed first.
    pub async fn subscribe_channel(&self, channel: VoiceChannel) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.destroyed {
            return Err(PlayerError::Destroyed);
        }

        if let Some(current) = &inner.subscription {
            if current.channel_id() == channel.id {
                return Ok(());
            }
        }
        if let Some(old) = inner.subscription.take() {
            old.destroy(&*self.transport, self.guild_id, &self.sink).await;
        }

        let subscription =
            VoiceSubscription::create(&*self.transport, self.guild_id, channel, &self.sink).await?;
        inner.subscription = Some(subscription);
        Ok(())
    }

    /// Drops the voice subscription. Playback state is left alone.
    pub async fn unsubscribe_channel(&self) -> Result<VoiceChannel, PlayerError> {
        let mut inner = self.inner.lock().await;
        let subscription = inner.subscription.take().ok_or(PlayerError::NotSubscribed)?;
        inner.pending_load = None;

        let channel = subscription.channel().clone();
        subscription
            .destroy(&*self.transport, self.guild_id, &self.sink)
            .await;
        Ok(channel)
    }

    pub async fn subscribed_channel(&self) -> Option<VoiceChannel> {
        let inner = self.inner.lock().await;
        inner.subscription.as_ref().map(|s| s.channel().clone())
    }

    /// Resolves `track` and hands it to the sink.
    ///
    /// On failure the state is left as it was.
    pub async fn play_track(&self, track: SharedTrack<S::Resource>) -> Result<(), PlayerError> {
        let load = {
            let mut inner = self.inner.lock().await;
            inner.ensure_can_load()?;
            inner.start_load()
        };
        self.finish_load(load, track).await
    }

    /// Plays `track` right away when the player is free, else queues it.
    ///
    /// Returns `0` when playback started, otherwise the queue length after
    /// insertion.
    pub async fn play_or_add_to_queue(
        &self,
        track: SharedTrack<S::Resource>,
    ) -> Result<usize, PlayerError> {
        let load = {
            let mut inner = self.inner.lock().await;
            if inner.destroyed {
                return Err(PlayerError::Destroyed);
            }
            if inner.is_busy() {
                inner.queue.add(track);
                return Ok(inner.queue.len());
            }
            inner.ensure_can_load()?;
            inner.start_load()
        };

        self.finish_load(load, track).await?;
        Ok(0)
    }

    /// Plays the head of the queue, or stops when the queue is empty.
    ///
    /// Returns the track that started, `None` if playback stopped.
    pub async fn play_next_or_stop(&self) -> Result<Option<SharedTrack<S::Resource>>, PlayerError> {
        let (load, track) = {
            let mut inner = self.inner.lock().await;
            // The head stays queued when the player cannot load it.
            if !inner.queue.is_empty() {
                inner.ensure_can_load()?;
            }
            let Ok(track) = inner.queue.next() else {
                drop(inner);
                self.stop().await;
                return Ok(None);
            };
            (inner.start_load(), track)
        };

        self.finish_load(load, track.clone()).await?;
        Ok(Some(track))
    }

    async fn finish_load(
        &self,
        load: PlaybackId,
        track: SharedTrack<S::Resource>,
    ) -> Result<(), PlayerError> {
        debug!("Loading {} as {} in guild {}", track.name(), load, self.guild_id);
        let resource = track.create_audio_resource().await;

        let mut inner = self.inner.lock().await;
        if inner.pending_load != Some(load) {
            debug!("Discarding {} ({}), playback changed while loading", track.name(), load);
            return Err(PlayerError::Superseded);
        }
        inner.pending_load = None;

        let resource = resource.map_err(|e| {
            warn!("Could not load {} in guild {}: {}", track.name(), self.guild_id, e);
            PlayerError::from(e)
        })?;
        inner.ensure_can_load()?;

        self.sink.play(load, resource).await?;
        info!("▶️ Now playing {} in guild {}", track.name(), self.guild_id);
        inner.now_playing = Some(track);
        inner.state = PlayerState::Playing;
        inner.playback = Some(load);
        inner.idle_since = None;
        Ok(())
    }

    /// Halts the sink and goes idle. Also cancels a pending load. Queued
    /// tracks are kept.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.pending_load = None;
        if inner.state != PlayerState::Playing {
            return;
        }

        inner.state = PlayerState::Idle;
        inner.now_playing = None;
        inner.playback = None;
        inner.idle_since = Some(Instant::now());
        if !self.sink.stop().await {
            debug!("Audio sink had nothing to stop in guild {}", self.guild_id);
        }
        info!("⏹️ Playback stopped in guild {}", self.guild_id);
    }

    /// Feeds an event reported by the sink into the state machine.
    ///
    /// Events for anything other than the resource currently playing are
    /// stale and ignored.
    pub async fn handle_sink_event(&self, event: SinkEvent) {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != PlayerState::Playing || inner.playback != Some(event.playback) {
                debug!("Ignoring stale {:?} for {} in guild {}", event.kind, event.playback, self.guild_id);
                return;
            }
            if event.kind == SinkEventKind::Idle {
                inner.playback = None;
            }
        }

        match event.kind {
            SinkEventKind::Idle => {
                debug!("Track {} ended in guild {}", event.playback, self.guild_id);
                self.advance().await;
            }
            SinkEventKind::Error(message) => {
                warn!("❌ Audio device error in guild {}: {}", self.guild_id, message);
                self.stop().await;
                self.notify(&PlayerError::Device(message));
            }
        }
    }

    /// Moves on to the next queued track. Failures stop playback and go to
    /// the error listeners, since there is no caller to return them to.
    pub async fn advance(&self) {
        match self.play_next_or_stop().await {
            Ok(Some(track)) => debug!("Advanced to {} in guild {}", track.name(), self.guild_id),
            Ok(None) => debug!("Queue exhausted in guild {}", self.guild_id),
            Err(PlayerError::Superseded) => {}
            Err(e) => {
                warn!("Could not advance queue in guild {}: {}", self.guild_id, e);
                self.stop().await;
                self.notify(&e);
            }
        }
    }

    pub fn on_error(&self, listener: impl Fn(&PlayerError) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    fn notify(&self, error: &PlayerError) {
        for listener in self.listeners.read().iter() {
            listener(error);
        }
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn now_playing(&self) -> Option<SharedTrack<S::Resource>> {
        self.inner.lock().await.now_playing.clone()
    }

    pub async fn queued_tracks(&self) -> Vec<SharedTrack<S::Resource>> {
        self.inner.lock().await.queue.items()
    }

    pub async fn queue_length(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// When the player went idle, `None` while playing.
    pub async fn time_idling_started(&self) -> Option<Instant> {
        let inner = self.inner.lock().await;
        match inner.state {
            PlayerState::Playing => None,
            PlayerState::Idle => inner.idle_since,
        }
    }

    /// Tears down the subscription and halts the sink. The player refuses
    /// further work afterwards.
    pub async fn destroy(&self) {
        let mut inner = self.inner.lock().await;
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        inner.pending_load = None;

        if let Some(subscription) = inner.subscription.take() {
            subscription
                .destroy(&*self.transport, self.guild_id, &self.sink)
                .await;
        }
        self.transport.release(self.guild_id).await;
        self.sink.stop().await;

        if inner.state == PlayerState::Playing {
            inner.idle_since = Some(Instant::now());
        }
        inner.state = PlayerState::Idle;
        inner.now_playing = None;
        inner.playback = None;
        drop(inner);

        self.listeners.write().clear();
        info!("🗑️ Player destroyed for guild {}", self.guild_id);
    }
}
