pub mod youtube;
pub mod youtube_url;

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::track::{Requester, SharedTrack};

pub use youtube::YouTubeProvider;
pub use youtube_url::{parse_video_id, VideoId, VideoIdError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidUrl(#[from] VideoIdError),
    #[error("video is not available")]
    NotAvailable,
    #[error("search returned no results")]
    NoResult,
}

/// Turns a user query (a link or free-text search) into a playable track.
#[async_trait]
pub trait TrackProvider<R>: Send + Sync + 'static {
    async fn resolve(&self, query: &str, requester: Requester) -> Result<SharedTrack<R>, ResolveError>;
}
