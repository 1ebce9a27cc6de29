use serenity::builder::{CreateEmbed, CreateEmbedAuthor, CreateMessage};

use super::messages::{EmbedPayload, Reply};

/// Bot colour palette
pub mod colors {
    use serenity::all::Colour;

    pub const DARK_RED: Colour = Colour::from_rgb(0x87, 0x02, 0x09);
}

/// Renders a reply as a serenity message.
pub fn render(reply: &Reply) -> CreateMessage {
    match reply {
        Reply::Text(content) => CreateMessage::new().content(content),
        Reply::Embed(payload) => CreateMessage::new().embed(create_embed(payload)),
    }
}

pub fn create_embed(payload: &EmbedPayload) -> CreateEmbed {
    let mut embed = CreateEmbed::default().color(colors::DARK_RED);

    if let Some(author) = &payload.author {
        let mut header = CreateEmbedAuthor::new(&author.name);
        if let Some(icon_url) = &author.icon_url {
            header = header.icon_url(icon_url);
        }
        embed = embed.author(header);
    }
    if let Some(title) = &payload.title {
        embed = embed.title(title);
    }
    if let Some(url) = &payload.url {
        embed = embed.url(url);
    }
    if let Some(description) = &payload.description {
        embed = embed.description(description);
    }
    for field in &payload.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }

    embed
}
