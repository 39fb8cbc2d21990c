//! Loading several datasets concurrently into one consumer.
//!
//! Every loader's `load` future is started at once and the orchestrator races
//! the outstanding set: whichever future settles first is removed, and the
//! rest are awaited again until none remain. A failure that names its dataset
//! is reported to the consumer and loading carries on; a failure that cannot
//! be attributed to a dataset aborts the whole orchestration.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{error, info, warn};

use crate::error::{LoadError, MapdexError, Result};

/// Receives the batches of one or more concurrently loading datasets.
pub trait DataConsumer<T>: Send {
    fn add_batch(&mut self, dataset_id: &str, batch: Vec<T>) -> Result<()>;
    fn complete(&mut self, dataset_id: &str) -> Result<()>;
    fn fail(&mut self, dataset_id: &str, error: &LoadError) -> Result<()>;
}

/// Shared handle through which loaders reach their consumer.
pub struct ConsumerHandle<T> {
    inner: Arc<Mutex<dyn DataConsumer<T>>>,
}

impl<T> Clone for ConsumerHandle<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: 'static> ConsumerHandle<T> {
    pub fn new<C: DataConsumer<T> + 'static>(consumer: Arc<Mutex<C>>) -> Self {
        let inner: Arc<Mutex<dyn DataConsumer<T>>> = consumer;
        Self { inner }
    }
    pub fn add_batch(&self, dataset_id: &str, batch: Vec<T>) -> Result<()> {
        self.inner.lock()?.add_batch(dataset_id, batch)
    }
    pub fn complete(&self, dataset_id: &str) -> Result<()> {
        self.inner.lock()?.complete(dataset_id)
    }
    pub fn fail(&self, dataset_id: &str, error: &LoadError) -> Result<()> {
        self.inner.lock()?.fail(dataset_id, error)
    }
}

/// A source of one dataset.
///
/// `load` calls `add_batch` zero or more times and then `complete` exactly
/// once, or returns an error instead of completing.
#[async_trait]
pub trait DatasetLoader<T: Send + 'static>: Send + Sync {
    fn id(&self) -> &str;
    async fn load(&self, consumer: ConsumerHandle<T>) -> std::result::Result<(), LoadError>;
}

/// Runs every loader against `consumer` and returns the consumer once all of
/// them have settled.
pub async fn load_datasets<T, C>(
    loaders: &[Arc<dyn DatasetLoader<T>>],
    consumer: Arc<Mutex<C>>,
) -> Result<Arc<Mutex<C>>>
where
    T: Send + 'static,
    C: DataConsumer<T> + 'static,
{
    let handle = ConsumerHandle::new(Arc::clone(&consumer));
    let mut outstanding: FuturesUnordered<_> = loaders
        .iter()
        .map(|loader| {
            let handle = handle.clone();
            async move {
                let id = loader.id().to_string();
                info!(dataset = %id, "loading dataset");
                (id, loader.load(handle).await)
            }
        })
        .collect();

    while let Some((id, outcome)) = outstanding.next().await {
        match outcome {
            Ok(()) => info!(dataset = %id, remaining = outstanding.len(), "dataset loaded"),
            Err(LoadError::Unscoped(message)) => {
                error!(dataset = %id, %message, "unattributable load failure, aborting");
                return Err(MapdexError::Load(LoadError::Unscoped(message)));
            }
            Err(err @ LoadError::Dataset { .. }) => {
                let failed = err.dataset_id().unwrap_or(&id).to_string();
                warn!(dataset = %failed, error = %err, "dataset failed to load");
                handle.fail(&failed, &err)?;
            }
        }
    }
    Ok(consumer)
}
