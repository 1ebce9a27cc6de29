use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use songbird::input::{HttpRequest, Input};
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{
    youtube_url::{looks_like_url, parse_video_id, VideoId},
    ResolveError, TrackProvider,
};
use crate::audio::track::{Requester, SharedTrack, Track, TrackContentError, TrackLength};

const YTDLP: &str = "yt-dlp";
const SEARCH_LIMIT: usize = 10;
const MAX_CONCURRENT_LOOKUPS: usize = 3;
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// One line of `--flat-playlist --dump-json` search output.
#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<String>,
    ie_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: String,
    duration: Option<f64>,
}

/// Finds YouTube videos through yt-dlp.
pub struct YouTubeProvider {
    http: reqwest::Client,
    // Limit concurrent yt-dlp processes to avoid rate limiting
    rate_limiter: Arc<Semaphore>,
}

impl YouTubeProvider {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            rate_limiter: Arc::new(Semaphore::new(MAX_CONCURRENT_LOOKUPS)),
        }
    }

    /// Searches YouTube and resolves the first video hit.
    pub async fn search(&self, query: &str, requester: Requester) -> Result<YouTubeTrack, ResolveError> {
        debug!("🔍 Searching YouTube: {}", query);

        let search_query = format!("ytsearch{}:{}", SEARCH_LIMIT, query);
        let stdout = run_ytdlp(
            &self.rate_limiter,
            &[
                "--no-playlist",
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                &search_query,
            ],
        )
        .await
        .map_err(|e| {
            warn!("YouTube search for {:?} failed: {:#}", query, e);
            ResolveError::NotAvailable
        })?;

        let Some(video_id) = first_video_id(&stdout) else {
            debug!("Query {:?} did not find any videos", query);
            return Err(ResolveError::NoResult);
        };
        debug!("Query {:?} found video {}", query, video_id);

        self.by_video_id(&video_id, requester).await
    }

    pub async fn by_video_id(&self, video_id: &VideoId, requester: Requester) -> Result<YouTubeTrack, ResolveError> {
        let url = video_id.watch_url();
        debug!("📊 Fetching info for {}", video_id);

        let stdout = run_ytdlp(
            &self.rate_limiter,
            &["--no-playlist", "--dump-json", "--skip-download", "--no-warnings", &url],
        )
        .await
        .map_err(|e| {
            debug!("yt-dlp could not fetch info for {}: {:#}", video_id, e);
            ResolveError::NotAvailable
        })?;

        let (name, length) = parse_video_info(&stdout).ok_or_else(|| {
            warn!("Unexpected yt-dlp info output for {}", video_id);
            ResolveError::NotAvailable
        })?;

        let track = YouTubeTrack {
            name,
            url,
            length,
            requester,
            http: self.http.clone(),
            rate_limiter: self.rate_limiter.clone(),
        };
        info!("🎵 Resolved {} ({}) for {}", track.name, track.length, track.requester.name);
        Ok(track)
    }
}

impl Default for YouTubeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackProvider<Input> for YouTubeProvider {
    async fn resolve(&self, query: &str, requester: Requester) -> Result<SharedTrack<Input>, ResolveError> {
        let query = query.trim();
        let track = if looks_like_url(query) {
            let video_id = parse_video_id(query)?;
            self.by_video_id(&video_id, requester).await?
        } else {
            self.search(query, requester).await?
        };
        Ok(Arc::new(track))
    }
}

/// A resolved YouTube video. The audio stream URL is looked up only when the
/// track is about to play, since those URLs expire.
pub struct YouTubeTrack {
    name: String,
    url: String,
    length: TrackLength,
    requester: Requester,
    http: reqwest::Client,
    rate_limiter: Arc<Semaphore>,
}

#[async_trait]
impl Track<Input> for YouTubeTrack {
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

    async fn create_audio_resource(&self) -> Result<Input, TrackContentError> {
        debug!("🎵 Fetching stream URL for {}", self.url);

        let stdout = run_ytdlp(
            &self.rate_limiter,
            &["--no-playlist", "-f", "bestaudio/best", "--get-url", "--no-warnings", &self.url],
        )
        .await
        .map_err(|e| {
            debug!("Failed to create download stream for {}: {:#}", self.url, e);
            TrackContentError::not_available("Failed to create download stream")
        })?;

        let stream_url = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| TrackContentError::not_available("yt-dlp returned no stream URL"))?;

        Ok(HttpRequest::new(self.http.clone(), stream_url.to_string()).into())
    }
}

async fn run_ytdlp(rate_limiter: &Semaphore, args: &[&str]) -> Result<String> {
    run_limited(YTDLP, rate_limiter, args).await
}

async fn run_limited(program: &str, rate_limiter: &Semaphore, args: &[&str]) -> Result<String> {
    let _permit = rate_limiter.acquire().await.context("yt-dlp limiter closed")?;

    let output = tokio::time::timeout(LOOKUP_TIMEOUT, Command::new(program).args(args).output())
        .await
        .with_context(|| format!("{} timed out after {}", program, humantime::format_duration(LOOKUP_TIMEOUT)))?
        .with_context(|| format!("Error running {}", program))?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} error: {}", program, error.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Picks the first plain video from search output, skipping channels and
/// playlists.
fn first_video_id(stdout: &str) -> Option<VideoId> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<SearchEntry>(line).ok())
        .filter(|entry| entry.ie_key.as_deref().map_or(true, |key| key == "Youtube"))
        .filter_map(|entry| entry.id)
        .find_map(|id| parse_video_id(&format!("https://youtu.be/{}", id)).ok())
}

fn parse_video_info(stdout: &str) -> Option<(String, TrackLength)> {
    let info: VideoInfo = serde_json::from_str(stdout.trim()).ok()?;
    // Live streams report no duration.
    let seconds = info.duration.map_or(0, |d| d.round() as i64);
    let length = TrackLength::new(seconds).ok()?;
    Some((info.title, length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_video_skips_channels_and_playlists() {
        let stdout = [
            r#"{"_type": "url", "ie_key": "YoutubeTab", "id": "UCuAXFkgsw1L7xaCfnd5JJOw", "title": "Channel"}"#,
            r#"not json"#,
            r#"{"_type": "url", "ie_key": "Youtube", "id": "dQw4w9WgXcQ", "title": "Never Gonna Give You Up"}"#,
            r#"{"_type": "url", "ie_key": "Youtube", "id": "yPYZpwSpKmA", "title": "Together Forever"}"#,
        ]
        .join("\n");

        let id = first_video_id(&stdout).unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn empty_search_output_has_no_video() {
        assert!(first_video_id("").is_none());
        assert!(first_video_id(r#"{"ie_key": "YoutubeTab", "id": "PL123456"}"#).is_none());
    }

    #[test]
    fn video_info_rounds_duration() {
        let (name, length) =
            parse_video_info(r#"{"id": "dQw4w9WgXcQ", "title": "Never Gonna Give You Up", "duration": 212.6}"#).unwrap();
        assert_eq!(name, "Never Gonna Give You Up");
        assert_eq!(length.seconds(), 213);
        assert_eq!(length.human_readable(), "03:33");
    }

    #[test]
    fn live_streams_have_zero_length() {
        let (_, length) = parse_video_info(r#"{"title": "lofi radio", "duration": null, "is_live": true}"#).unwrap();
        assert_eq!(length, TrackLength::ZERO);
    }

    #[test]
    fn rejects_garbled_info() {
        assert!(parse_video_info("ERROR: Video unavailable").is_none());
    }

    #[tokio::test]
    async fn missing_binary_is_reported_with_context() {
        let limiter = Semaphore::new(1);

        let error = run_limited("debil-bot-no-such-binary", &limiter, &["--version"])
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "Error running debil-bot-no-such-binary");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_exit_carries_stderr() {
        let limiter = Semaphore::new(1);

        let error = run_limited("sh", &limiter, &["-c", "echo 'Video unavailable' >&2; exit 1"])
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "sh error: Video unavailable");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_returns_stdout() {
        let limiter = Semaphore::new(1);

        let stdout = run_limited("sh", &limiter, &["-c", "echo https://stream.example/audio"])
            .await
            .unwrap();

        assert_eq!(stdout.trim(), "https://stream.example/audio");
    }
}
