pub mod csv;

pub use self::csv::{load_csv, parse_csv};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::core::{Dataset, StreamError};

/// Where playback sessions get their rows from
///
/// The dataset is static, so implementations may load per call or cache.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Load the full dataset, or `DataUnavailable`
    async fn load(&self) -> Result<Arc<Dataset>, StreamError>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Reads the CSV file from disk on every load
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
    channel_count: usize,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>, channel_count: usize) -> Self {
        Self {
            path: path.into(),
            channel_count,
        }
    }
}

#[async_trait]
impl DatasetSource for CsvFileSource {
    async fn load(&self) -> Result<Arc<Dataset>, StreamError> {
        let path = self.path.clone();
        let channel_count = self.channel_count;

        let loaded = tokio::task::spawn_blocking(move || load_csv(&path, channel_count))
            .await
            .map_err(|e| StreamError::DataUnavailable(format!("loader task failed: {}", e)))?;

        match loaded {
            Ok(dataset) => Ok(Arc::new(dataset)),
            Err(e) => {
                error!("Dataset load failed: {:#}", e);
                Err(StreamError::DataUnavailable(format!("{:#}", e)))
            }
        }
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Loads once through the wrapped source and shares the result afterwards.
/// Failed loads are not cached.
pub struct CachedSource<S> {
    inner: S,
    cached: OnceCell<Arc<Dataset>>,
}

impl<S: DatasetSource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cached: OnceCell::new(),
        }
    }

    /// True once a load has succeeded
    pub fn is_loaded(&self) -> bool {
        self.cached.initialized()
    }
}

#[async_trait]
impl<S: DatasetSource> DatasetSource for CachedSource<S> {
    async fn load(&self) -> Result<Arc<Dataset>, StreamError> {
        let dataset = self
            .cached
            .get_or_try_init(|| async {
                let dataset = self.inner.load().await?;
                info!("Cached {} rows from {}", dataset.len(), self.inner.describe());
                Ok::<_, StreamError>(dataset)
            })
            .await?;
        Ok(dataset.clone())
    }

    fn describe(&self) -> String {
        format!("cached({})", self.inner.describe())
    }
}

/// An already loaded dataset
#[derive(Debug, Clone)]
pub struct StaticSource(pub Arc<Dataset>);

impl StaticSource {
    pub fn new(dataset: Dataset) -> Self {
        Self(Arc::new(dataset))
    }
}

#[async_trait]
impl DatasetSource for StaticSource {
    async fn load(&self) -> Result<Arc<Dataset>, StreamError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("static({} rows)", self.0.len())
    }
}
