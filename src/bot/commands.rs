use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        player::{PlayerError, PlayerState},
        sink::{AudioSink, VoiceTransport},
        subscription::VoiceChannel,
        track::Requester,
    },
    guild::{GuildContext, GuildRegistry},
    sources::TrackProvider,
    ui::messages::{self, Reply},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Leave,
    NowPlaying,
    Play(String),
    Stop,
    Skip,
    Queue,
}

impl Command {
    /// Parses `<prefix><name> [args...]`. Unknown names and messages without
    /// the prefix yield `None`.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let body = content.strip_prefix(prefix)?;
        let (name, rest) = body.split_once(' ').unwrap_or((body, ""));

        let command = match name {
            "join" => Command::Join,
            "leave" => Command::Leave,
            "np" => Command::NowPlaying,
            "play" => Command::Play(rest.split_whitespace().collect::<Vec<_>>().join(" ")),
            "stop" => Command::Stop,
            "skip" => Command::Skip,
            "queue" => Command::Queue,
            _ => return None,
        };
        Some(command)
    }
}

/// Who sent a command and where they are.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub guild_id: GuildId,
    pub requester: Requester,
    pub voice_channel: Option<VoiceChannel>,
}

/// Executes parsed commands against the guild registry.
pub struct CommandHandler<S: AudioSink, T: VoiceTransport<S>, P> {
    registry: Arc<GuildRegistry<S, T>>,
    provider: Arc<P>,
    prefix: String,
}

impl<S, T, P> CommandHandler<S, T, P>
where
    S: AudioSink,
    T: VoiceTransport<S>,
    P: TrackProvider<S::Resource>,
{
    pub fn new(registry: Arc<GuildRegistry<S, T>>, provider: Arc<P>, prefix: impl Into<String>) -> Self {
        Self {
            registry,
            provider,
            prefix: prefix.into(),
        }
    }

    pub async fn handle(&self, invocation: &Invocation, command: Command) -> Reply {
        info!(
            "📝 {:?} from {} in guild {}",
            command, invocation.requester.name, invocation.guild_id
        );

        let reply = match command {
            Command::Join => self.join(invocation).await,
            Command::Leave => self.leave(invocation).await,
            Command::NowPlaying => self.now_playing(invocation).await,
            Command::Play(query) => self.play(invocation, &query).await,
            Command::Stop => self.stop(invocation).await,
            Command::Skip => self.skip(invocation).await,
            Command::Queue => self.queue(invocation).await,
        };
        debug!("Replying in guild {}: {}", invocation.guild_id, reply.summary());
        reply
    }

    fn context(&self, guild_id: GuildId) -> Arc<GuildContext<S, T>> {
        let context = self.registry.get_or_create(guild_id);
        context.touch();
        context
    }

    async fn join(&self, invocation: &Invocation) -> Reply {
        let Some(channel) = &invocation.voice_channel else {
            return messages::not_in_voice_channel();
        };

        let player = self.context(invocation.guild_id).player();
        match player.subscribe_channel(channel.clone()).await {
            Ok(()) => messages::join(&channel.name),
            Err(e) => {
                warn!("Join failed in guild {}: {}", invocation.guild_id, e);
                messages::join_failed(&channel.name)
            }
        }
    }

    async fn leave(&self, invocation: &Invocation) -> Reply {
        let player = self.context(invocation.guild_id).player();
        match player.unsubscribe_channel().await {
            Ok(channel) => {
                player.stop().await;
                messages::leave(&channel.name)
            }
            Err(_) => messages::not_connected(),
        }
    }

    async fn now_playing(&self, invocation: &Invocation) -> Reply {
        let player = self.context(invocation.guild_id).player();
        match player.now_playing().await {
            Some(track) => messages::now_playing(track.as_ref()),
            None => messages::not_playing(),
        }
    }

    async fn play(&self, invocation: &Invocation, query: &str) -> Reply {
        if query.is_empty() {
            return messages::play_usage(&self.prefix);
        }
        let Some(channel) = &invocation.voice_channel else {
            return messages::not_in_voice_channel();
        };

        let track = match self.provider.resolve(query, invocation.requester.clone()).await {
            Ok(track) => track,
            Err(e) => {
                debug!("Could not resolve {:?}: {}", query, e);
                return messages::resolve_failed(query, &e);
            }
        };

        // The context may have been reaped while the query was resolving.
        let player = self.context(invocation.guild_id).player();
        if let Err(e) = player.subscribe_channel(channel.clone()).await {
            warn!("Join failed in guild {}: {}", invocation.guild_id, e);
            return messages::join_failed(&channel.name);
        }

        match player.play_or_add_to_queue(track.clone()).await {
            Ok(0) => messages::now_playing(track.as_ref()),
            Ok(position) => messages::added_to_queue(position, track.as_ref()),
            Err(e) => {
                // Tracks queued behind a failed load would otherwise wait forever.
                // A superseded load was cancelled on purpose and must stay stopped.
                let load_failed = matches!(e, PlayerError::ContentUnavailable(_) | PlayerError::Sink(_));
                if load_failed && player.state().await == PlayerState::Idle && player.queue_length().await > 0 {
                    tokio::spawn(async move { player.advance().await });
                }
                messages::play_failed(track.as_ref(), &e)
            }
        }
    }

    async fn stop(&self, invocation: &Invocation) -> Reply {
        let player = self.context(invocation.guild_id).player();
        player.stop().await;
        messages::stop()
    }

    async fn skip(&self, invocation: &Invocation) -> Reply {
        let player = self.context(invocation.guild_id).player();
        if player.state().await == PlayerState::Idle {
            return messages::not_playing();
        }

        match player.play_next_or_stop().await {
            Ok(Some(track)) => messages::now_playing(track.as_ref()),
            Ok(None) => messages::stop(),
            Err(PlayerError::Superseded) => messages::stop(),
            Err(e) => {
                warn!("Skip failed in guild {}: {}", invocation.guild_id, e);
                player.stop().await;
                messages::skip_failed(&e)
            }
        }
    }

    async fn queue(&self, invocation: &Invocation) -> Reply {
        let player = self.context(invocation.guild_id).player();
        let queued = player.queued_tracks().await;
        let now_playing = player.now_playing().await;
        messages::queue(&queued, now_playing.as_deref())
    }
}
