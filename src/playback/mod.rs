pub mod registry;
pub mod session;

pub use registry::{RegistryConfig, SessionRegistry};
pub use session::PlaybackSession;

use std::time::Duration;

/// Interval used when a client does not ask for one
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No timer, no cursor
    Idle,
    /// Dataset load and projection in progress
    Loading,
    /// Timer running, one row per tick
    Streaming,
    /// Cancelled by stop, supersede or disconnect
    Stopped,
    /// Every row and the end marker were emitted
    Exhausted,
    /// Load or projection failed
    Errored,
}

impl PlaybackState {
    /// True for states a session never leaves
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlaybackState::Stopped | PlaybackState::Exhausted | PlaybackState::Errored
        )
    }
}

/// Playback configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Time between two emitted rows
    pub interval: Duration,
}

impl PlaybackConfig {
    /// Interval requested by the client; absent or zero falls back to `default_ms`.
    /// No upper bound is applied here.
    pub fn from_request(interval_ms: Option<u64>, default_ms: u64) -> Self {
        let ms = match interval_ms {
            Some(ms) if ms > 0 => ms,
            _ => default_ms.max(1),
        };
        Self {
            interval: Duration::from_millis(ms),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
        }
    }
}
