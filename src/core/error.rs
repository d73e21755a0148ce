use thiserror::Error;

/// Failures scoped to a single connection's playback request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    /// Empty, non-numeric or fully out-of-range channel query
    #[error("invalid channel selection: {0}")]
    InvalidSelection(String),

    /// The dataset could not be read or parsed
    #[error("dataset unavailable: {0}")]
    DataUnavailable(String),

    /// The selection matched no reading anywhere in the dataset
    #[error("no data available for the requested channels")]
    NoData,
}

impl StreamError {
    /// Text sent to the client in an `{ "error": ... }` emission
    pub fn client_message(&self) -> &'static str {
        match self {
            StreamError::InvalidSelection(_) => "Invalid or no sensors specified",
            StreamError::DataUnavailable(_) => "Failed to read CSV",
            StreamError::NoData => "No data available for requested sensors",
        }
    }
}
