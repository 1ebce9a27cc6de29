use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    audio::sink::{AudioSink, VoiceTransport},
    guild::GuildRegistry,
};

/// Periodically destroys guild contexts that have been idle longer than
/// `max_idle`.
pub fn spawn_idle_reaper<S, T>(
    registry: Arc<GuildRegistry<S, T>>,
    max_idle: Duration,
    period: Duration,
) -> JoinHandle<()>
where
    S: AudioSink,
    T: VoiceTransport<S>,
{
    info!(
        "🔧 Idle reaper running every {}, threshold {}",
        humantime::format_duration(period),
        humantime::format_duration(max_idle)
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let reaped = registry.reap_idle(max_idle, Instant::now()).await;
            debug!("Idle reaper pass done, {} reaped, {} active", reaped, registry.len());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{FakeSink, FakeTransport};
    use serenity::model::id::GuildId;

    #[tokio::test]
    async fn reaper_removes_idle_guilds() {
        let registry = Arc::new(GuildRegistry::new(Arc::new(FakeTransport::new()), |_, events| {
            FakeSink::with_events(events)
        }));
        let context = registry.get_or_create(GuildId::new(1));

        let reaper = spawn_idle_reaper(registry.clone(), Duration::ZERO, Duration::from_millis(10));
        for _ in 0..50 {
            if registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        reaper.abort();

        assert!(registry.is_empty());
        assert!(context.is_destroyed());
    }
}
