//! # Bot Module
//!
//! Discord surface of the bot: text commands come in through [`MusicBot`],
//! are parsed by [`commands::Command::parse`] and executed by
//! [`commands::CommandHandler`]. Songbird callbacks live in [`events`].

use serenity::{
    all::{Context, EventHandler, GuildId, Message, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod commands;
pub mod events;

use crate::{
    audio::{
        subscription::VoiceChannel,
        track::Requester,
        voice::{SongbirdSink, SongbirdTransport},
    },
    config::Config,
    guild::GuildRegistry,
    sources::YouTubeProvider,
    ui::embeds,
};
use commands::{Command, CommandHandler, Invocation};

pub type SongbirdRegistry = GuildRegistry<SongbirdSink, SongbirdTransport>;

/// Main Discord event handler.
pub struct MusicBot {
    config: Arc<Config>,
    registry: Arc<SongbirdRegistry>,
    commands: CommandHandler<SongbirdSink, SongbirdTransport, YouTubeProvider>,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, registry: Arc<SongbirdRegistry>, provider: Arc<YouTubeProvider>) -> Self {
        let commands = CommandHandler::new(registry.clone(), provider, config.command_prefix.clone());
        Self {
            config,
            registry,
            commands,
        }
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(command) = Command::parse(&msg.content, &self.config.command_prefix) else {
            return;
        };
        let Some(guild_id) = msg.guild_id else {
            debug!("Ignoring {:?} outside a guild", command);
            return;
        };

        let invocation = Invocation {
            guild_id,
            requester: Requester::new(msg.author.id, msg.author.name.clone())
                .with_avatar_url(msg.author.avatar_url()),
            voice_channel: user_voice_channel(&ctx, guild_id, msg.author.id),
        };

        let reply = self.commands.handle(&invocation, command).await;
        let message = embeds::render(&reply).reference_message(&msg);
        if let Err(e) = msg.channel_id.send_message(&ctx.http, message).await {
            error!("Error sending reply in guild {}: {:?}", guild_id, e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }
        let (Some(guild_id), Some(old_channel)) = (new.guild_id, old.and_then(|o| o.channel_id)) else {
            return;
        };
        let Some(context) = self.registry.get(guild_id) else {
            return;
        };

        // A channel switch also reports leaving the old channel; only react
        // when the channel we were subscribed to is gone.
        let player = context.player();
        let subscribed = player.subscribed_channel().await.map(|c| c.id);
        if subscribed != Some(old_channel) {
            return;
        }

        info!("🔌 Bot disconnected from voice in guild {}", guild_id);
        if player.unsubscribe_channel().await.is_ok() {
            player.stop().await;
        }
    }
}

/// Voice channel the user is in, from the guild cache.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<VoiceChannel> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    let channel_id = guild.voice_states.get(&user_id)?.channel_id?;
    let name = guild
        .channels
        .get(&channel_id)
        .map(|channel| channel.name.clone())
        .unwrap_or_else(|| channel_id.to_string());
    Some(VoiceChannel::new(channel_id, name))
}
