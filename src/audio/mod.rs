//! # Audio Module
//!
//! Per-guild playback engine.
//!
//! ### [`player`] - Music Player
//! - Idle/Playing state machine, one per guild
//! - Loads tracks lazily and advances the queue when the sink goes idle
//!
//! ### [`subscription`] - Voice Subscriptions
//! - Binds a player's sink to one voice channel at a time
//!
//! ### [`voice`] - Songbird Backend
//! - [`sink::AudioSink`] and [`sink::VoiceTransport`] on top of songbird

pub mod player;
pub mod queue;
pub mod sink;
pub mod subscription;
pub mod track;
pub mod voice;

#[cfg(test)]
pub mod testing;
