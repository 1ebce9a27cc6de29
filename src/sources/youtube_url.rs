use regex::Regex;
use std::{fmt, sync::LazyLock};
use thiserror::Error;
use url::Url;

const WATCH_HOSTS: [&str; 4] = [
    "www.youtube.com",
    "youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];
const SHORT_HOST: &str = "youtu.be";

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{6,20}$").expect("video id pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL, used as the track's public link.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a link could not be turned into a video id. The messages are shown
/// to users as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoIdError {
    #[error("Enter a valid URL")]
    InvalidUrl,
    #[error("Video id parameter missing from YouTube URL")]
    MissingId,
    #[error("Enter a valid shorthand URL")]
    InvalidShortUrl,
    #[error("That does not look like a YouTube video id")]
    MalformedId,
    #[error("Only YouTube URLs are supported")]
    UnsupportedHost,
}

pub fn looks_like_url(query: &str) -> bool {
    query.starts_with("https://") || query.starts_with("http://")
}

/// Extracts the video id from a watch link (`?v=<id>`) or a `youtu.be/<id>`
/// short link.
pub fn parse_video_id(raw: &str) -> Result<VideoId, VideoIdError> {
    let url = Url::parse(raw).map_err(|_| VideoIdError::InvalidUrl)?;

    let id = match url.host_str() {
        Some(host) if WATCH_HOSTS.contains(&host) => url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or(VideoIdError::MissingId)?,
        Some(SHORT_HOST) => {
            let segments: Vec<&str> = url
                .path_segments()
                .map(|segments| segments.collect())
                .unwrap_or_default();
            match segments.as_slice() {
                [id] if !id.is_empty() => id.to_string(),
                _ => return Err(VideoIdError::InvalidShortUrl),
            }
        }
        _ => return Err(VideoIdError::UnsupportedHost),
    };

    if !VIDEO_ID.is_match(&id) {
        return Err(VideoIdError::MalformedId);
    }
    Ok(VideoId(id))
}
