use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::{Duration, Instant},
};
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tracing::{debug, info};

use crate::audio::{
    player::MusicPlayer,
    sink::{AudioSink, SinkEvent, VoiceTransport},
};

/// Everything the bot keeps for one guild: its player and when it was last
/// told to do something.
pub struct GuildContext<S: AudioSink, T: VoiceTransport<S>> {
    guild_id: GuildId,
    player: Arc<MusicPlayer<S, T>>,
    last_command: Mutex<Instant>,
    destroyed: AtomicBool,
    event_pump: Mutex<Option<JoinHandle<()>>>,
}

impl<S, T> GuildContext<S, T>
where
    S: AudioSink,
    T: VoiceTransport<S>,
{
    /// Wraps `player` and starts delivering the sink's events to it.
    pub fn new(
        guild_id: GuildId,
        player: Arc<MusicPlayer<S, T>>,
        events: UnboundedReceiver<SinkEvent>,
    ) -> Self {
        let pump = tokio::spawn(pump_sink_events(Arc::downgrade(&player), events));
        Self {
            guild_id,
            player,
            last_command: Mutex::new(Instant::now()),
            destroyed: AtomicBool::new(false),
            event_pump: Mutex::new(Some(pump)),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn player(&self) -> Arc<MusicPlayer<S, T>> {
        self.player.clone()
    }

    pub fn touch(&self) {
        self.record_command_at(Instant::now());
    }

    pub fn record_command_at(&self, at: Instant) {
        let mut last = self.last_command.lock();
        if at > *last {
            *last = at;
        }
    }

    pub fn time_last_command_received(&self) -> Instant {
        *self.last_command.lock()
    }

    /// How long the guild has gone without music or commands, whichever is
    /// shorter. `None` while something is playing.
    pub async fn time_idle(&self, now: Instant) -> Option<Duration> {
        let idle_since = self.player.time_idling_started().await?;
        let last_command = self.time_last_command_received();
        Some(
            now.saturating_duration_since(idle_since)
                .min(now.saturating_duration_since(last_command)),
        )
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Destroys the player and stops event delivery. Safe to call twice.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(pump) = self.event_pump.lock().take() {
            pump.abort();
        }
        self.player.destroy().await;
        info!("🧹 Guild context for {} destroyed", self.guild_id);
    }
}

async fn pump_sink_events<S, T>(player: Weak<MusicPlayer<S, T>>, mut events: UnboundedReceiver<SinkEvent>)
where
    S: AudioSink,
    T: VoiceTransport<S>,
{
    while let Some(event) = events.recv().await {
        let Some(player) = player.upgrade() else {
            break;
        };
        player.handle_sink_event(event).await;
    }
    debug!("Sink event pump finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        player::PlayerState,
        testing::{channel, FakeSink, FakeTrack, FakeTransport},
    };
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn context() -> (GuildContext<FakeSink, FakeTransport>, Arc<FakeSink>, Arc<FakeTransport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(FakeSink::with_events(tx));
        let transport = Arc::new(FakeTransport::new());
        let player = Arc::new(MusicPlayer::new(GuildId::new(3), sink.clone(), transport.clone()));
        (GuildContext::new(GuildId::new(3), player, rx), sink, transport)
    }

    #[tokio::test]
    async fn idle_time_is_the_shorter_of_both_clocks() {
        let (context, _, _) = context();
        let idle_since = context.player().time_idling_started().await.unwrap();

        let later = idle_since + Duration::from_secs(120);
        context.record_command_at(idle_since + Duration::from_secs(100));
        assert_eq!(context.time_idle(later).await, Some(Duration::from_secs(20)));

    }

    #[tokio::test]
    async fn idle_time_counts_from_stop_after_the_last_command() {
        let (context, _, _) = context();
        let player = context.player();
        player.subscribe_channel(channel(1, "C1")).await.unwrap();
        player.play_or_add_to_queue(FakeTrack::shared("a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        player.stop().await;

        let idle_since = player.time_idling_started().await.unwrap();
        assert!(context.time_last_command_received() < idle_since);
        assert_eq!(
            context.time_idle(idle_since + Duration::from_secs(30)).await,
            Some(Duration::from_secs(30))
        );
    }

    #[tokio::test]
    async fn not_idle_while_playing() {
        let (context, _, _) = context();
        let player = context.player();
        player.subscribe_channel(channel(1, "C1")).await.unwrap();
        player.play_or_add_to_queue(FakeTrack::shared("a")).await.unwrap();

        assert_eq!(context.time_idle(Instant::now() + Duration::from_secs(3600)).await, None);
    }

    #[tokio::test]
    async fn sink_events_reach_the_player() {
        let (context, sink, _) = context();
        let player = context.player();
        player.subscribe_channel(channel(1, "C1")).await.unwrap();
        player.play_or_add_to_queue(FakeTrack::shared("a")).await.unwrap();
        player.play_or_add_to_queue(FakeTrack::shared("b")).await.unwrap();

        sink.finish_current();
        for _ in 0..50 {
            if sink.played_names().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(sink.played_names(), vec!["a", "b"]);
        assert_eq!(player.state().await, PlayerState::Playing);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let (context, _, transport) = context();
        context.player().subscribe_channel(channel(1, "C1")).await.unwrap();

        context.destroy().await;
        context.destroy().await;

        assert!(context.is_destroyed());
        assert_eq!(transport.disconnects().len(), 1);
        assert_eq!(transport.releases(), 1);
    }
}
