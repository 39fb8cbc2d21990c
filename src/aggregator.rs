//! Aggregation of incrementally loaded datasets into one indexed collection.
//!
//! The [`DataAggregator`] owns the collection while it is being built and
//! plays the same role the keepers play for a database: it guarantees that
//! every uri is kept at most once, and it maintains the lookups (the ordered
//! list and the property index) as initiatives arrive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::OtherHasher;
use crate::error::{LoadError, MapdexError, Result};
use crate::indexer::{PropertyIndexer, RegisteredValues, insert_sorted, remove_sorted};
use crate::initiative::{Initiative, InitiativeFactory};
use crate::loader::DataConsumer;
use crate::value::RawRecord;

/// The complete, indexed collection of initiatives from one load cycle.
/// Published once and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct AggregatedData {
    pub initiatives_by_uri: HashMap<String, Arc<Initiative>, OtherHasher>,
    /// In display-name order.
    pub loaded_initiatives: Vec<Arc<Initiative>>,
    pub registered_values: RegisteredValues,
}

impl AggregatedData {
    pub fn len(&self) -> usize {
        self.loaded_initiatives.len()
    }
    pub fn is_empty(&self) -> bool {
        self.loaded_initiatives.is_empty()
    }
    pub fn get(&self, uri: &str) -> Option<&Arc<Initiative>> {
        self.initiatives_by_uri.get(uri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetStatus {
    Loading,
    Complete,
    Failed(String),
}

type InitiativeCallback = Box<dyn FnMut(&Arc<Initiative>) + Send>;
type CompleteCallback = Box<dyn FnMut(&str) + Send>;
type FailCallback = Box<dyn FnMut(&str, &LoadError) + Send>;

pub struct DataAggregator {
    factory: InitiativeFactory,
    initiatives_by_uri: HashMap<String, Arc<Initiative>, OtherHasher>,
    loaded_initiatives: Vec<Arc<Initiative>>,
    indexer: PropertyIndexer,
    status: HashMap<String, DatasetStatus, OtherHasher>,
    // dataset id -> uris it contributed, so a failed dataset can be taken out
    contributed: HashMap<String, Vec<String>, OtherHasher>,
    finalised: bool,
    on_initiative: Option<InitiativeCallback>,
    on_dataset_complete: Option<CompleteCallback>,
    on_dataset_fail: Option<FailCallback>,
}

impl DataAggregator {
    pub fn new(factory: InitiativeFactory, indexer: PropertyIndexer) -> Self {
        Self {
            factory,
            initiatives_by_uri: HashMap::default(),
            loaded_initiatives: Vec::new(),
            indexer,
            status: HashMap::default(),
            contributed: HashMap::default(),
            finalised: false,
            on_initiative: None,
            on_dataset_complete: None,
            on_dataset_fail: None,
        }
    }
    /// Called for each initiative as soon as it is aggregated.
    pub fn on_initiative(mut self, callback: impl FnMut(&Arc<Initiative>) + Send + 'static) -> Self {
        self.on_initiative = Some(Box::new(callback));
        self
    }
    pub fn on_dataset_complete(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_dataset_complete = Some(Box::new(callback));
        self
    }
    pub fn on_dataset_fail(mut self, callback: impl FnMut(&str, &LoadError) + Send + 'static) -> Self {
        self.on_dataset_fail = Some(Box::new(callback));
        self
    }

    pub fn len(&self) -> usize {
        self.loaded_initiatives.len()
    }
    pub fn is_empty(&self) -> bool {
        self.loaded_initiatives.is_empty()
    }
    pub fn loaded_initiatives(&self) -> &[Arc<Initiative>] {
        &self.loaded_initiatives
    }
    pub fn get(&self, uri: &str) -> Option<&Arc<Initiative>> {
        self.initiatives_by_uri.get(uri)
    }
    pub fn registered_values(&self) -> &RegisteredValues {
        self.indexer.registered_values()
    }
    pub fn status(&self, dataset_id: &str) -> Option<&DatasetStatus> {
        self.status.get(dataset_id)
    }
    pub fn is_finalised(&self) -> bool {
        self.finalised
    }

    /// Finalises the property index. Must follow every dataset's completion or
    /// failure; later calls do nothing.
    pub fn all_complete(&mut self) {
        if self.finalised {
            debug!("aggregation already finalised");
            return;
        }
        let pending: Vec<&str> = self
            .status
            .iter()
            .filter(|(_, status)| **status == DatasetStatus::Loading)
            .map(|(id, _)| id.as_str())
            .collect();
        if !pending.is_empty() {
            warn!(?pending, "finalising while datasets are still loading");
        }
        self.indexer.on_complete();
        self.finalised = true;
        info!(initiatives = self.loaded_initiatives.len(), "aggregation complete");
    }

    /// Publishes the aggregate, finalising it first if necessary.
    pub fn into_aggregated_data(mut self) -> AggregatedData {
        self.all_complete();
        AggregatedData {
            initiatives_by_uri: self.initiatives_by_uri,
            loaded_initiatives: self.loaded_initiatives,
            registered_values: self.indexer.into_registered_values(),
        }
    }

    fn keep(&mut self, dataset_id: &str, initiative: Initiative) {
        let kept = Arc::new(initiative);
        self.contributed
            .entry(dataset_id.to_string())
            .or_default()
            .push(kept.uri().to_string());
        self.initiatives_by_uri.insert(kept.uri().to_string(), Arc::clone(&kept));
        insert_sorted(&mut self.loaded_initiatives, &kept);
        self.indexer.on_data(&kept);
        if let Some(callback) = self.on_initiative.as_mut() {
            callback(&kept);
        }
    }

    /// Takes every initiative `dataset_id` contributed back out of the uri
    /// map, the ordered list and the property index.
    fn discard(&mut self, dataset_id: &str) {
        let Some(uris) = self.contributed.remove(dataset_id) else {
            return;
        };
        for uri in &uris {
            if let Some(initiative) = self.initiatives_by_uri.remove(uri) {
                remove_sorted(&mut self.loaded_initiatives, &initiative);
                self.indexer.on_remove(&initiative);
            }
        }
        warn!(dataset = %dataset_id, discarded = uris.len(), "initiatives of failed dataset discarded");
    }
}

impl DataConsumer<RawRecord> for DataAggregator {
    /// The batch is applied all-or-nothing: every record is built and checked
    /// for a duplicate uri before any of them is kept.
    fn add_batch(&mut self, dataset_id: &str, batch: Vec<RawRecord>) -> Result<()> {
        self.status
            .entry(dataset_id.to_string())
            .or_insert(DatasetStatus::Loading);
        let mut built: Vec<Initiative> = Vec::with_capacity(batch.len());
        let mut seen: HashSet<String, OtherHasher> = HashSet::default();
        for mut raw in batch {
            raw.insert("dataset".into(), dataset_id.into());
            let initiative = self.factory.build(&raw)?;
            let uri = initiative.uri().to_string();
            if self.initiatives_by_uri.contains_key(&uri) || !seen.insert(uri.clone()) {
                error!(%uri, dataset = %dataset_id, "duplicate initiative uri");
                return Err(MapdexError::DuplicateUri {
                    uri,
                    dataset: dataset_id.to_string(),
                });
            }
            built.push(initiative);
        }
        debug!(dataset = %dataset_id, records = built.len(), "batch aggregated");
        for initiative in built {
            self.keep(dataset_id, initiative);
        }
        Ok(())
    }
    fn complete(&mut self, dataset_id: &str) -> Result<()> {
        let previous = self
            .status
            .insert(dataset_id.to_string(), DatasetStatus::Complete);
        if previous == Some(DatasetStatus::Complete) {
            warn!(dataset = %dataset_id, "dataset completed twice");
        }
        if let Some(callback) = self.on_dataset_complete.as_mut() {
            callback(dataset_id);
        }
        Ok(())
    }
    /// The aggregate keeps nothing from a failed dataset, including batches
    /// it delivered before failing.
    fn fail(&mut self, dataset_id: &str, error: &LoadError) -> Result<()> {
        self.status
            .insert(dataset_id.to_string(), DatasetStatus::Failed(error.to_string()));
        self.discard(dataset_id);
        if let Some(callback) = self.on_dataset_fail.as_mut() {
            callback(dataset_id, error);
        }
        Ok(())
    }
}
