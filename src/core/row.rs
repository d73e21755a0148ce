use serde::{Deserialize, Serialize};

use crate::core::selection::{ChannelSelection, ProjectedRow};

/// One recorded row of the historical dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    /// Timestamp exactly as recorded (never parsed)
    pub timestamp: String,

    /// Channel readings; slot 0 holds channel 1
    pub channels: Vec<Option<f64>>,
}

impl DatasetRow {
    /// Create a new row
    pub fn new(timestamp: impl Into<String>, channels: Vec<Option<f64>>) -> Self {
        Self {
            timestamp: timestamp.into(),
            channels,
        }
    }

    /// Reading for a 1-based channel index, if present in this row
    pub fn channel(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(1)
            .and_then(|slot| self.channels.get(slot).copied().flatten())
    }

    /// Number of channels that carry a reading
    pub fn populated(&self) -> usize {
        self.channels.iter().filter(|c| c.is_some()).count()
    }
}

/// The loaded dataset: rows in source order and the channel count they were read with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
    channel_count: usize,
}

impl Dataset {
    /// Build a dataset, fixing every row to exactly `channel_count` slots
    pub fn new(rows: Vec<DatasetRow>, channel_count: usize) -> Self {
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.channels.resize(channel_count, None);
                row
            })
            .collect();

        Self { rows, channel_count }
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Project every row through a selection, dropping rows that end up with no readings
    pub fn project(&self, selection: &ChannelSelection) -> Vec<ProjectedRow> {
        self.rows
            .iter()
            .filter_map(|row| selection.project(row))
            .collect()
    }
}
