use std::collections::BTreeSet;
use std::num::IntErrorKind;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::core::error::StreamError;
use crate::core::row::DatasetRow;

/// Name prefix clients put in front of channel numbers ("sensor3")
pub const CHANNEL_PREFIX: &str = "sensor";

/// Validated, de-duplicated set of 1-based channel indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSelection {
    channels: BTreeSet<usize>,
}

impl ChannelSelection {
    /// Parse a comma list such as `"sensor3,sensor7"`
    ///
    /// Every token must be numeric once the `sensor` prefix is stripped.
    /// Indices outside `1..=channel_count` (including ones too large to
    /// represent) are dropped; a selection left empty is rejected.
    pub fn parse(query: &str, channel_count: usize) -> Result<Self, StreamError> {
        let mut channels = BTreeSet::new();

        for token in query.split(',') {
            let token = token.trim();
            let digits = token.strip_prefix(CHANNEL_PREFIX).unwrap_or(token).trim();

            let index = match digits.parse::<i64>() {
                Ok(index) => index,
                Err(e)
                    if matches!(
                        e.kind(),
                        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                    ) =>
                {
                    debug!("Dropping out-of-range channel {} (max {})", digits, channel_count);
                    continue;
                }
                Err(_) => {
                    return Err(StreamError::InvalidSelection(format!(
                        "'{}' is not a channel",
                        token
                    )))
                }
            };

            match usize::try_from(index) {
                Ok(index) if (1..=channel_count).contains(&index) => {
                    channels.insert(index);
                }
                _ => debug!("Dropping out-of-range channel {} (max {})", index, channel_count),
            }
        }

        if channels.is_empty() {
            return Err(StreamError::InvalidSelection(format!(
                "no channel in range 1..={}",
                channel_count
            )));
        }

        Ok(Self { channels })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Selected indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels.iter().copied()
    }

    /// Sparse view of `row`: the timestamp plus the selected channels it carries.
    /// `None` when none of the selected channels are present.
    pub fn project(&self, row: &DatasetRow) -> Option<ProjectedRow> {
        let values: Vec<(usize, f64)> = self
            .iter()
            .filter_map(|index| row.channel(index).map(|value| (index, value)))
            .collect();

        if values.is_empty() {
            return None;
        }

        Some(ProjectedRow {
            time: row.timestamp.clone(),
            values,
        })
    }
}

/// A dataset row reduced to one session's selected channels
///
/// Serializes as `{"time": "...", "sensor1": 1.0, "sensor3": 3.0}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow {
    pub time: String,
    /// `(channel index, reading)` in ascending channel order
    pub values: Vec<(usize, f64)>,
}

impl ProjectedRow {
    pub fn value(&self, index: usize) -> Option<f64> {
        self.values
            .iter()
            .find(|(channel, _)| *channel == index)
            .map(|(_, value)| *value)
    }
}

impl Serialize for ProjectedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("time", &self.time)?;
        for (index, value) in &self.values {
            map.serialize_entry(&format!("{}{}", CHANNEL_PREFIX, index), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(selection: &ChannelSelection) -> Vec<usize> {
        selection.iter().collect()
    }

    #[test]
    fn test_parse_prefixed_and_bare() {
        let selection = ChannelSelection::parse("sensor3,sensor7", 17).unwrap();
        assert_eq!(indices(&selection), vec![3, 7]);

        let selection = ChannelSelection::parse(" 5 , sensor1 ", 17).unwrap();
        assert_eq!(indices(&selection), vec![1, 5]);
    }

    #[test]
    fn test_parse_deduplicates() {
        let selection = ChannelSelection::parse("sensor2,sensor2,2", 17).unwrap();
        assert_eq!(indices(&selection), vec![2]);
    }

    #[test]
    fn test_parse_drops_out_of_range() {
        let selection = ChannelSelection::parse("sensor0,sensor4,sensor18,sensor-1", 17).unwrap();
        assert_eq!(indices(&selection), vec![4]);
    }

    #[test]
    fn test_parse_drops_indices_too_large_to_represent() {
        let selection =
            ChannelSelection::parse("sensor1,sensor99999999999999999999", 17).unwrap();
        assert_eq!(indices(&selection), vec![1]);

        let selection =
            ChannelSelection::parse("sensor-99999999999999999999,sensor5", 17).unwrap();
        assert_eq!(indices(&selection), vec![5]);

        assert!(matches!(
            ChannelSelection::parse("sensor99999999999999999999", 17),
            Err(StreamError::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_parse_only_out_of_range_is_invalid() {
        let err = ChannelSelection::parse("sensor20", 17).unwrap_err();
        assert!(matches!(err, StreamError::InvalidSelection(_)));
    }

    #[test]
    fn test_parse_rejects_empty_and_non_numeric() {
        assert!(matches!(
            ChannelSelection::parse("", 17),
            Err(StreamError::InvalidSelection(_))
        ));
        assert!(matches!(
            ChannelSelection::parse("sensor1,", 17),
            Err(StreamError::InvalidSelection(_))
        ));
        assert!(matches!(
            ChannelSelection::parse("sensor1,temperature", 17),
            Err(StreamError::InvalidSelection(_))
        ));
        assert!(matches!(
            ChannelSelection::parse("sensor3x", 17),
            Err(StreamError::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_channel_bound_follows_dataset() {
        let selection = ChannelSelection::parse("sensor20,sensor24", 24).unwrap();
        assert_eq!(indices(&selection), vec![20, 24]);

        assert!(ChannelSelection::parse("sensor4", 3).is_err());
    }

    #[test]
    fn test_project_skips_rows_without_selected_readings() {
        let selection = ChannelSelection::parse("sensor1,sensor3", 3).unwrap();

        let full = DatasetRow::new("00:00", vec![Some(1.0), None, Some(3.0)]);
        let empty = DatasetRow::new("00:01", vec![None, Some(2.0), None]);
        let partial = DatasetRow::new("00:02", vec![None, None, Some(7.0)]);

        let projected = selection.project(&full).unwrap();
        assert_eq!(projected.values, vec![(1, 1.0), (3, 3.0)]);

        assert!(selection.project(&empty).is_none());

        let projected = selection.project(&partial).unwrap();
        assert_eq!(projected.value(1), None);
        assert_eq!(projected.value(3), Some(7.0));
    }

    #[test]
    fn test_projected_row_json_shape() {
        let row = ProjectedRow {
            time: "00:00".to_string(),
            values: vec![(1, 1.0), (3, 3.5)],
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "time": "00:00", "sensor1": 1.0, "sensor3": 3.5 })
        );
    }
}
