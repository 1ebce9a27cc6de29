use dashmap::DashMap;
use futures::future::join_all;
use serenity::model::id::GuildId;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use super::context::GuildContext;
use crate::audio::{
    player::MusicPlayer,
    sink::{AudioSink, SinkEvent, VoiceTransport},
};

pub type SinkFactory<S> = Box<dyn Fn(GuildId, UnboundedSender<SinkEvent>) -> S + Send + Sync>;

/// Process-wide map of guild contexts, created on first use.
pub struct GuildRegistry<S: AudioSink, T: VoiceTransport<S>> {
    contexts: DashMap<GuildId, Arc<GuildContext<S, T>>>,
    transport: Arc<T>,
    sink_factory: SinkFactory<S>,
}

impl<S, T> GuildRegistry<S, T>
where
    S: AudioSink,
    T: VoiceTransport<S>,
{
    pub fn new(
        transport: Arc<T>,
        sink_factory: impl Fn(GuildId, UnboundedSender<SinkEvent>) -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            contexts: DashMap::new(),
            transport,
            sink_factory: Box::new(sink_factory),
        }
    }

    /// Returns the live context for `guild_id`, creating one if needed.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildContext<S, T>> {
        let mut entry = self
            .contexts
            .entry(guild_id)
            .or_insert_with(|| self.create_context(guild_id));
        if entry.is_destroyed() {
            *entry = self.create_context(guild_id);
        }
        Arc::clone(&entry)
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildContext<S, T>>> {
        self.contexts
            .get(&guild_id)
            .map(|entry| entry.value().clone())
            .filter(|context| !context.is_destroyed())
    }

    /// Forgets the context without destroying it.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<GuildContext<S, T>>> {
        self.contexts.remove(&guild_id).map(|(_, context)| context)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    fn create_context(&self, guild_id: GuildId) -> Arc<GuildContext<S, T>> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let sink = Arc::new((self.sink_factory)(guild_id, events_tx));
        let player = Arc::new(MusicPlayer::new(guild_id, sink, self.transport.clone()));
        player.on_error(move |error| {
            warn!("⚠️ Playback error in guild {}: {}", guild_id, error);
        });

        info!("🆕 Created guild context for {}", guild_id);
        Arc::new(GuildContext::new(guild_id, player, events_rx))
    }

    /// Destroys and forgets every context idle for longer than `max_idle`.
    /// Returns how many were removed.
    pub async fn reap_idle(&self, max_idle: Duration, now: Instant) -> usize {
        let contexts: Vec<_> = self
            .contexts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut reaped = 0;
        for context in contexts {
            let Some(idle) = context.time_idle(now).await else {
                continue;
            };
            if idle <= max_idle {
                continue;
            }

            context.destroy().await;
            self.contexts
                .remove_if(&context.guild_id(), |_, current| Arc::ptr_eq(current, &context));
            debug!(
                "Reaped guild {} after {} idle",
                context.guild_id(),
                humantime::format_duration(idle)
            );
            reaped += 1;
        }

        if reaped > 0 {
            info!("🧹 {} guild contexts removed for idling", reaped);
        }
        reaped
    }

    /// Destroys every context. Used on shutdown.
    pub async fn destroy_all(&self) {
        let guild_ids: Vec<GuildId> = self.contexts.iter().map(|entry| *entry.key()).collect();
        let contexts: Vec<_> = guild_ids
            .into_iter()
            .filter_map(|guild_id| self.remove(guild_id))
            .collect();

        info!("🛑 Destroying {} guild contexts", contexts.len());
        join_all(contexts.iter().map(|context| context.destroy())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{channel, FakeSink, FakeTrack, FakeTransport};
    use pretty_assertions::assert_eq;

    fn registry() -> (GuildRegistry<FakeSink, FakeTransport>, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        let registry = GuildRegistry::new(transport.clone(), |_, events| FakeSink::with_events(events));
        (registry, transport)
    }

    #[tokio::test]
    async fn get_or_create_reuses_contexts() {
        let (registry, _) = registry();

        let first = registry.get_or_create(GuildId::new(1));
        let again = registry.get_or_create(GuildId::new(1));
        let other = registry.get_or_create(GuildId::new(2));

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
        assert!(registry.get(GuildId::new(3)).is_none());
    }

    #[tokio::test]
    async fn destroyed_contexts_are_replaced() {
        let (registry, _) = registry();
        let first = registry.get_or_create(GuildId::new(1));
        first.destroy().await;

        assert!(registry.get(GuildId::new(1)).is_none());
        let second = registry.get_or_create(GuildId::new(1));
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_destroyed());
    }

    #[tokio::test]
    async fn reaps_only_idle_guilds() {
        let (registry, transport) = registry();
        let idle = registry.get_or_create(GuildId::new(1));
        idle.player().subscribe_channel(channel(1, "C1")).await.unwrap();

        let busy = registry.get_or_create(GuildId::new(2));
        busy.player().subscribe_channel(channel(2, "C2")).await.unwrap();
        busy.player().play_or_add_to_queue(FakeTrack::shared("a")).await.unwrap();

        let fresh = registry.get_or_create(GuildId::new(3));
        fresh.touch();

        let now = Instant::now() + Duration::from_secs(601);
        fresh.record_command_at(now - Duration::from_secs(10));

        let reaped = registry.reap_idle(Duration::from_secs(600), now).await;

        assert_eq!(reaped, 1);
        assert!(idle.is_destroyed());
        assert!(registry.get(GuildId::new(1)).is_none());
        assert!(registry.get(GuildId::new(2)).is_some());
        assert!(registry.get(GuildId::new(3)).is_some());
        assert_eq!(transport.disconnects(), vec![serenity::model::id::ChannelId::new(1)]);
    }

    #[tokio::test]
    async fn destroy_all_empties_the_registry() {
        let (registry, transport) = registry();
        for id in 1..=3 {
            registry.get_or_create(GuildId::new(id));
        }

        registry.destroy_all().await;

        assert!(registry.is_empty());
        assert_eq!(transport.releases(), 3);
    }
}
