//! In-memory stand-ins for the voice seams. Resources are plain strings
//! (the track name), connections are the joined channel id.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc::UnboundedSender, Notify};

use super::{
    sink::{AudioSink, PlaybackId, SinkError, SinkEvent, VoiceTransport},
    subscription::{VoiceChannel, VoiceError},
    track::{Requester, SharedTrack, Track, TrackContentError, TrackLength},
};
use crate::sources::{ResolveError, TrackProvider};

pub fn channel(id: u64, name: &str) -> VoiceChannel {
    VoiceChannel::new(ChannelId::new(id), name)
}

pub fn requester() -> Requester {
    Requester::new(UserId::new(42), "tester")
        .with_avatar_url(Some("https://cdn.example/avatar.png".to_string()))
}

/// Lets a test hold a track mid-load.
#[derive(Clone, Default)]
pub struct LoadGate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

pub struct FakeTrack {
    name: String,
    url: String,
    length: TrackLength,
    requester: Requester,
    fail: bool,
    gate: Option<LoadGate>,
}

impl FakeTrack {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", name),
            length: TrackLength::new(97).unwrap(),
            requester: requester(),
            fail: false,
            gate: None,
        }
    }

    pub fn shared(name: &str) -> SharedTrack<String> {
        Arc::new(Self::new(name))
    }

    pub fn failing(name: &str) -> SharedTrack<String> {
        Arc::new(Self {
            fail: true,
            ..Self::new(name)
        })
    }

    pub fn gated(name: &str) -> (SharedTrack<String>, LoadGate) {
        let gate = LoadGate::default();
        let track = Self {
            gate: Some(gate.clone()),
            ..Self::new(name)
        };
        (Arc::new(track), gate)
    }
}

#[async_trait]
impl Track<String> for FakeTrack {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn length(&self) -> TrackLength {
        self.length
    }

    fn requester(&self) -> &Requester {
        &self.requester
    }

    async fn create_audio_resource(&self) -> Result<String, TrackContentError> {
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if self.fail {
            return Err(TrackContentError::not_available("stream refused"));
        }
        Ok(self.name.clone())
    }
}

#[derive(Default)]
pub struct FakeSink {
    played: Mutex<Vec<(PlaybackId, String)>>,
    stops: AtomicUsize,
    reject: AtomicBool,
    events: Option<UnboundedSender<SinkEvent>>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: UnboundedSender<SinkEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn reject_plays(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn played_names(&self) -> Vec<String> {
        self.played.lock().iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn last_playback(&self) -> Option<PlaybackId> {
        self.played.lock().last().map(|(id, _)| *id)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Reports the current resource as finished, the way a device would.
    pub fn finish_current(&self) {
        if let (Some(events), Some(playback)) = (&self.events, self.last_playback()) {
            let _ = events.send(SinkEvent::idle(playback));
        }
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    type Resource = String;

    async fn play(&self, playback: PlaybackId, resource: String) -> Result<(), SinkError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected("test sink".to_string()));
        }
        self.played.lock().push((playback, resource));
        Ok(())
    }

    async fn stop(&self) -> bool {
        self.stops.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[derive(Default)]
pub struct FakeTransport {
    connects: Mutex<Vec<ChannelId>>,
    disconnects: Mutex<Vec<ChannelId>>,
    releases: AtomicUsize,
    fail: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connects(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> Vec<ChannelId> {
        self.connects.lock().clone()
    }

    pub fn disconnects(&self) -> Vec<ChannelId> {
        self.disconnects.lock().clone()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceTransport<FakeSink> for FakeTransport {
    type Connection = ChannelId;

    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
        _sink: &Arc<FakeSink>,
    ) -> Result<ChannelId, VoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Join("missing permissions".to_string()));
        }
        self.connects.lock().push(channel_id);
        Ok(channel_id)
    }

    async fn disconnect(&self, _guild_id: GuildId, connection: ChannelId, _sink: &Arc<FakeSink>) {
        self.disconnects.lock().push(connection);
    }

    async fn release(&self, _guild_id: GuildId) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Resolves every query to a track named after it, unless told otherwise.
#[derive(Default)]
pub struct FakeProvider {
    error: Mutex<Option<ResolveError>>,
    failing_content: AtomicBool,
    unplayable: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, LoadGate>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: ResolveError) {
        *self.error.lock() = Some(error);
    }

    pub fn yield_unplayable_tracks(&self) {
        self.failing_content.store(true, Ordering::SeqCst);
    }

    /// Only the track resolved from `query` fails to load.
    pub fn make_unplayable(&self, query: &str) {
        self.unplayable.lock().insert(query.to_string());
    }

    /// Tracks resolved from `query` wait on the returned gate while loading.
    pub fn gate(&self, query: &str) -> LoadGate {
        let gate = LoadGate::default();
        self.gates.lock().insert(query.to_string(), gate.clone());
        gate
    }
}

#[async_trait]
impl TrackProvider<String> for FakeProvider {
    async fn resolve(
        &self,
        query: &str,
        requester: Requester,
    ) -> Result<SharedTrack<String>, ResolveError> {
        if let Some(error) = self.error.lock().clone() {
            return Err(error);
        }
        let track = FakeTrack {
            requester,
            fail: self.failing_content.load(Ordering::SeqCst) || self.unplayable.lock().contains(query),
            gate: self.gates.lock().get(query).cloned(),
            ..FakeTrack::new(query)
        };
        Ok(Arc::new(track))
    }
}
