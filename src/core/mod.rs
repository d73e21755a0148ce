pub mod error;
pub mod row;
pub mod selection;

pub use error::StreamError;
pub use row::{Dataset, DatasetRow};
pub use selection::{ChannelSelection, ProjectedRow, CHANNEL_PREFIX};

/// Channel count of the recorded sensor table
pub const DEFAULT_CHANNEL_COUNT: usize = 17;
