use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::core::{ChannelSelection, Dataset, ProjectedRow, StreamError};
use crate::playback::{PlaybackConfig, PlaybackState};
use crate::transport::{ConnectionId, Emission};

/// Replay of one projected row sequence to one connection
///
/// The session itself is timer-agnostic: whoever drives it calls [`tick`]
/// once per interval and forwards the returned emission.
///
/// [`tick`]: PlaybackSession::tick
#[derive(Debug)]
pub struct PlaybackSession {
    connection: ConnectionId,
    selection: ChannelSelection,
    config: PlaybackConfig,
    state: PlaybackState,
    rows: Vec<ProjectedRow>,
    cursor: usize,
    started_at: Option<DateTime<Utc>>,
}

impl PlaybackSession {
    pub fn new(connection: ConnectionId, selection: ChannelSelection, config: PlaybackConfig) -> Self {
        Self {
            connection,
            selection,
            config,
            state: PlaybackState::Idle,
            rows: Vec::new(),
            cursor: 0,
            started_at: None,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn selection(&self) -> &ChannelSelection {
        &self.selection
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Index of the next row to emit
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of projected rows
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn remaining(&self) -> usize {
        self.rows.len().saturating_sub(self.cursor)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Idle -> Loading
    pub fn begin_loading(&mut self) {
        if self.state == PlaybackState::Idle {
            self.state = PlaybackState::Loading;
        }
    }

    /// Loading -> Streaming, projecting the dataset through the selection.
    /// A projection with no rows moves to Errored instead.
    pub fn start_streaming(&mut self, dataset: &Dataset) -> Result<(), StreamError> {
        if self.state != PlaybackState::Loading {
            return Ok(());
        }

        let rows = dataset.project(&self.selection);
        if rows.is_empty() {
            self.state = PlaybackState::Errored;
            return Err(StreamError::NoData);
        }

        self.rows = rows;
        self.cursor = 0;
        self.started_at = Some(Utc::now());
        self.state = PlaybackState::Streaming;
        Ok(())
    }

    /// Loading -> Errored
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = PlaybackState::Errored;
        }
    }

    /// Cancel; returns false if the session had already finished
    pub fn stop(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = PlaybackState::Stopped;
        true
    }

    /// Advance one step
    ///
    /// While streaming, yields the row under the cursor; once past the last
    /// row, yields the end marker exactly once and moves to Exhausted.
    /// Any other state yields nothing.
    pub fn tick(&mut self) -> Option<Emission> {
        if self.state != PlaybackState::Streaming {
            return None;
        }

        match self.rows.get(self.cursor) {
            Some(row) => {
                self.cursor += 1;
                Some(Emission::Row(row.clone()))
            }
            None => {
                self.state = PlaybackState::Exhausted;
                Some(Emission::End)
            }
        }
    }
}
