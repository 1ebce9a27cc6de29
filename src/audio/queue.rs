use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

use super::track::SharedTrack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("track queue is empty")]
pub struct EmptyQueue;

/// Pending tracks in strict FIFO order. Items only leave through [`TrackQueue::next`].
pub struct TrackQueue<R> {
    items: VecDeque<SharedTrack<R>>,
}

impl<R> TrackQueue<R> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Appends to the tail.
    pub fn add(&mut self, track: SharedTrack<R>) {
        debug!("➕ Queued: {}", track.name());
        self.items.push_back(track);
    }

    /// Removes and returns the head.
    pub fn next(&mut self) -> Result<SharedTrack<R>, EmptyQueue> {
        let track = self.items.pop_front().ok_or(EmptyQueue)?;
        debug!("➡️ Next in queue: {}", track.name());
        Ok(track)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshot in play order.
    pub fn items(&self) -> Vec<SharedTrack<R>> {
        self.items.iter().cloned().collect()
    }
}

impl<R> Default for TrackQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}
