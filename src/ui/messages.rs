//! Chat replies as plain data, so command handling can be tested without a
//! Discord connection. [`super::embeds`] turns them into serenity messages.

use std::fmt::Write;

use crate::{
    audio::{
        player::PlayerError,
        track::{SharedTrack, Track},
    },
    sources::ResolveError,
};

/// Discord rejects embed descriptions longer than 4096 characters.
const DESCRIPTION_LIMIT: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Embed(EmbedPayload),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedPayload {
    pub author: Option<EmbedAuthor>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedAuthor {
    pub name: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline,
        }
    }
}

impl Reply {
    fn text(content: impl Into<String>) -> Self {
        Reply::Text(content.into())
    }

    /// The visible text of the reply, for logging.
    pub fn summary(&self) -> &str {
        match self {
            Reply::Text(content) => content.as_str(),
            Reply::Embed(embed) => embed
                .author
                .as_ref()
                .map(|a| a.name.as_str())
                .or(embed.title.as_deref())
                .or(embed.description.as_deref())
                .unwrap_or("embed"),
        }
    }
}

pub fn join(channel_name: &str) -> Reply {
    Reply::text(format!("Joining {}", channel_name))
}

pub fn leave(channel_name: &str) -> Reply {
    Reply::text(format!("Leaving {}", channel_name))
}

pub fn now_playing<R>(track: &dyn Track<R>) -> Reply {
    Reply::Embed(EmbedPayload {
        author: Some(EmbedAuthor {
            name: "Now playing".to_string(),
            icon_url: None,
        }),
        title: Some(track.name().to_string()),
        url: Some(track.url().to_string()),
        description: None,
        fields: vec![
            EmbedField::new("Length", track.length().human_readable(), true),
            EmbedField::new("Requester", track.requester().name.clone(), false),
        ],
    })
}

pub fn added_to_queue<R>(position: usize, track: &dyn Track<R>) -> Reply {
    Reply::Embed(EmbedPayload {
        author: Some(EmbedAuthor {
            name: "Added to queue".to_string(),
            icon_url: track.requester().avatar_url.clone(),
        }),
        title: Some(track.name().to_string()),
        url: Some(track.url().to_string()),
        description: None,
        fields: vec![
            EmbedField::new("Position in queue", position.to_string(), true),
            EmbedField::new("Length", track.length().human_readable(), true),
        ],
    })
}

pub fn stop() -> Reply {
    Reply::Embed(EmbedPayload {
        description: Some("Stopped playing".to_string()),
        ..EmbedPayload::default()
    })
}

fn format_track_line<R>(track: &dyn Track<R>) -> String {
    format!(
        "[{}]({}) | `{} Requested by: {}`",
        track.name(),
        track.url(),
        track.length().human_readable(),
        track.requester().name
    )
}

pub fn queue<R>(queued: &[SharedTrack<R>], now_playing: Option<&dyn Track<R>>) -> Reply {
    if queued.is_empty() && now_playing.is_none() {
        return Reply::Embed(EmbedPayload {
            title: Some("Queue".to_string()),
            description: Some("Empty".to_string()),
            ..EmbedPayload::default()
        });
    }

    let mut description = String::new();
    if let Some(track) = now_playing {
        description.push_str("**Now Playing:**\n");
        let _ = write!(description, "{}\n\n", format_track_line(track));
    }

    if !queued.is_empty() {
        description.push_str("**Queue:**\n");
        for (index, track) in queued.iter().enumerate() {
            let line = format!("`{}.` {}\n\n", index + 1, format_track_line(track.as_ref()));
            if description.len() + line.len() > DESCRIPTION_LIMIT {
                let _ = write!(description, "…and {} more", queued.len() - index);
                break;
            }
            description.push_str(&line);
        }
    }

    Reply::Embed(EmbedPayload {
        title: Some("Queue".to_string()),
        description: Some(description),
        ..EmbedPayload::default()
    })
}

pub fn not_in_voice_channel() -> Reply {
    Reply::text("You are not inside a voice channel")
}

pub fn not_connected() -> Reply {
    Reply::text("Bot is not connected to a voice channel")
}

pub fn not_playing() -> Reply {
    Reply::text("Bot is not playing anything")
}

pub fn play_usage(prefix: &str) -> Reply {
    Reply::text(format!("Usage: {}play <YouTube link or search terms>", prefix))
}

pub fn join_failed(channel_name: &str) -> Reply {
    Reply::text(format!("Could not join {}", channel_name))
}

pub fn resolve_failed(query: &str, error: &ResolveError) -> Reply {
    match error {
        ResolveError::InvalidUrl(e) => Reply::text(e.to_string()),
        ResolveError::NotAvailable => Reply::text("That video is not available"),
        ResolveError::NoResult => Reply::text(format!("No results for \"{}\"", query)),
    }
}

pub fn play_failed<R>(track: &dyn Track<R>, error: &PlayerError) -> Reply {
    match error {
        PlayerError::ContentUnavailable(_) => {
            Reply::text(format!("Could not play {}, the stream is not available", track.name()))
        }
        PlayerError::Superseded => Reply::text(format!("Playback changed before {} could start", track.name())),
        PlayerError::NotSubscribed => not_connected(),
        _ => Reply::text(format!("Could not play {}", track.name())),
    }
}

pub fn skip_failed(error: &PlayerError) -> Reply {
    match error {
        PlayerError::ContentUnavailable(_) => {
            Reply::text("Next track is not available, stopped playing")
        }
        _ => Reply::text("Could not skip, stopped playing"),
    }
}
