use async_trait::async_trait;
use serenity::model::id::UserId;
use std::{fmt, sync::Arc};
use thiserror::Error;

/// Why a track could not produce a playable stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackContentError {
    #[error("track content not available: {reason}")]
    NotAvailable { reason: String },
}

impl TrackContentError {
    pub fn not_available(reason: impl Into<String>) -> Self {
        Self::NotAvailable {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("track length cannot be negative, got {0}s")]
pub struct InvalidTrackLength(pub i64);

/// Duration of a track in whole seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackLength(u64);

impl TrackLength {
    pub const ZERO: TrackLength = TrackLength(0);

    pub fn new(seconds: i64) -> Result<Self, InvalidTrackLength> {
        u64::try_from(seconds)
            .map(Self)
            .map_err(|_| InvalidTrackLength(seconds))
    }

    pub fn seconds(&self) -> u64 {
        self.0
    }

    /// `MM:SS`, minutes are not wrapped into hours.
    pub fn human_readable(&self) -> String {
        format!("{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl fmt::Display for TrackLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.human_readable())
    }
}

/// The user who queued a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl Requester {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar_url(mut self, avatar_url: Option<String>) -> Self {
        self.avatar_url = avatar_url;
        self
    }
}

/// A resolved, immutable track descriptor that can lazily open its audio.
///
/// `R` is the resource type the playback sink consumes. Providers implement
/// this once per backend (e.g. `Track<songbird::input::Input>`), so new sources
/// slot in without touching the player.
#[async_trait]
pub trait Track<R>: Send + Sync {
    fn name(&self) -> &str;

    fn url(&self) -> &str;

    fn length(&self) -> TrackLength;

    fn requester(&self) -> &Requester;

    /// Opens the playable stream. Called only when the track is about to play,
    /// never at enqueue time.
    async fn create_audio_resource(&self) -> Result<R, TrackContentError>;
}

pub type SharedTrack<R> = Arc<dyn Track<R>>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keeps_seconds() {
        let length = TrackLength::new(11).unwrap();
        assert_eq!(length.seconds(), 11);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(TrackLength::new(58).unwrap().human_readable(), "00:58");
        assert_eq!(TrackLength::new(59).unwrap().human_readable(), "00:59");
        assert_eq!(TrackLength::new(60).unwrap().human_readable(), "01:00");
        assert_eq!(TrackLength::new(97).unwrap().human_readable(), "01:37");
        assert_eq!(TrackLength::new(38 * 60 + 37).unwrap().to_string(), "38:37");
    }

    #[test]
    fn rejects_negative_length() {
        assert_eq!(TrackLength::new(-1), Err(InvalidTrackLength(-1)));
    }
}
