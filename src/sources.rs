//! Dataset and vocabulary sources.
//!
//! File loaders read a whole JSON document and hand it to the consumer in
//! batches, yielding to the runtime between batches so that concurrently
//! loading datasets interleave.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LoadError;
use crate::loader::{ConsumerHandle, DatasetLoader};
use crate::value::RawRecord;
use crate::vocab::VocabSource;

async fn read_json<T: DeserializeOwned>(id: &str, path: &Path) -> Result<T, LoadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LoadError::dataset(id, format!("{}: {e}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| LoadError::dataset(id, format!("{}: {e}", path.display())))
}

async fn feed<T: Send + 'static>(
    id: &str,
    items: Vec<T>,
    batch_size: usize,
    consumer: &ConsumerHandle<T>,
) -> Result<(), LoadError> {
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        let batch: Vec<T> = items.by_ref().take(batch_size.max(1)).collect();
        consumer
            .add_batch(id, batch)
            .map_err(|e| LoadError::rejected(&e))?;
        tokio::task::yield_now().await;
    }
    consumer.complete(id).map_err(|e| LoadError::rejected(&e))
}

// ------------- JsonFileLoader -------------
/// Loads a dataset stored as a JSON array of records.
#[derive(Debug, Clone)]
pub struct JsonFileLoader {
    id: String,
    path: PathBuf,
    batch_size: usize,
}

impl JsonFileLoader {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            batch_size,
        }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DatasetLoader<RawRecord> for JsonFileLoader {
    fn id(&self) -> &str {
        &self.id
    }
    async fn load(&self, consumer: ConsumerHandle<RawRecord>) -> Result<(), LoadError> {
        let records: Vec<RawRecord> = read_json(&self.id, &self.path).await?;
        debug!(dataset = %self.id, records = records.len(), "dataset file read");
        feed(&self.id, records, self.batch_size, &consumer).await
    }
}

// ------------- VocabFileLoader -------------
/// Loads one vocabulary source stored as a JSON object.
#[derive(Debug, Clone)]
pub struct VocabFileLoader {
    id: String,
    path: PathBuf,
}

impl VocabFileLoader {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl DatasetLoader<VocabSource> for VocabFileLoader {
    fn id(&self) -> &str {
        &self.id
    }
    async fn load(&self, consumer: ConsumerHandle<VocabSource>) -> Result<(), LoadError> {
        let source: VocabSource = read_json(&self.id, &self.path).await?;
        feed(&self.id, vec![source], 1, &consumer).await
    }
}

// ------------- InMemoryLoader -------------
/// Serves prepared batches, or fails with a prepared error once they are
/// delivered.
#[derive(Debug, Clone)]
pub struct InMemoryLoader<T> {
    id: String,
    batches: Vec<Vec<T>>,
    failure: Option<LoadError>,
}

impl<T: Clone + Send + Sync + 'static> InMemoryLoader<T> {
    pub fn new(id: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            id: id.into(),
            batches: vec![items],
            failure: None,
        }
    }
    pub fn batched(id: impl Into<String>, batches: Vec<Vec<T>>) -> Self {
        Self {
            id: id.into(),
            batches,
            failure: None,
        }
    }
    pub fn failing(id: impl Into<String>, failure: LoadError) -> Self {
        Self {
            id: id.into(),
            batches: Vec::new(),
            failure: Some(failure),
        }
    }
    /// Fails with `failure` after delivering the prepared batches.
    pub fn then_failing(mut self, failure: LoadError) -> Self {
        self.failure = Some(failure);
        self
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> DatasetLoader<T> for InMemoryLoader<T> {
    fn id(&self) -> &str {
        &self.id
    }
    async fn load(&self, consumer: ConsumerHandle<T>) -> Result<(), LoadError> {
        for batch in &self.batches {
            consumer
                .add_batch(&self.id, batch.clone())
                .map_err(|e| LoadError::rejected(&e))?;
            tokio::task::yield_now().await;
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        consumer.complete(&self.id).map_err(|e| LoadError::rejected(&e))
    }
}
