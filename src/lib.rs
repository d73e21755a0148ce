//! Sensor replay service
//!
//! Replays a recorded sensor table to dashboard clients as if it were live:
//! each WebSocket connection picks channels and a cadence, and gets one
//! projected row per tick until the table runs out or the client stops.

pub mod catalog;
pub mod config;
pub mod core;
pub mod input;
pub mod playback;
pub mod server;
pub mod transport;

pub use config::AppConfig;
pub use playback::{PlaybackState, SessionRegistry};
pub use server::{router, AppState};
