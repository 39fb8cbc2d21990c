//! The data services: load cycles, the published aggregate and the queries
//! the presentation layer runs against it.
//!
//! Each load cycle takes a fresh generation number. A cycle builds its own
//! [`DataAggregator`] and only publishes it if no later cycle has started by
//! the time it finishes, so data from an abandoned load is never merged into
//! a newer aggregate. Progress is announced on a broadcast channel of
//! [`DataEvent`]s stamped with the generation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::aggregator::{AggregatedData, DataAggregator, DatasetStatus};
use crate::config::MapConfig;
use crate::error::{MapdexError, Result};
use crate::indexer::PropertyIndexer;
use crate::initiative::{Initiative, InitiativeFactory};
use crate::loader::{self, DatasetLoader};
use crate::schema::PropertySchema;
use crate::sources::{JsonFileLoader, VocabFileLoader};
use crate::state::TextSearch;
use crate::value::{PropValue, RawRecord};
use crate::vocab::{VocabAggregator, VocabServices, VocabSource};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DataEvent {
    LoadStarted { generation: u64, datasets: Vec<String> },
    InitiativeLoaded { generation: u64, uri: String },
    DatasetComplete { generation: u64, dataset: String },
    DatasetFailed { generation: u64, dataset: String, message: String },
    VocabsFailed { generation: u64, message: String },
    LoadComplete { generation: u64, initiatives: usize },
}

impl DataEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::LoadStarted { generation, .. }
            | Self::InitiativeLoaded { generation, .. }
            | Self::DatasetComplete { generation, .. }
            | Self::DatasetFailed { generation, .. }
            | Self::VocabsFailed { generation, .. }
            | Self::LoadComplete { generation, .. } => *generation,
        }
    }
}

/// What to reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetTarget {
    All,
    Dataset(String),
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Published(Arc<AggregatedData>),
    /// A later load started before this one finished. Nothing was published.
    Superseded,
}

impl LoadOutcome {
    pub fn published(self) -> Option<Arc<AggregatedData>> {
        match self {
            Self::Published(data) => Some(data),
            Self::Superseded => None,
        }
    }
}

/// A filter as presented to the user, e.g. `"Size: Large"`.
#[derive(Debug, Clone, PartialEq)]
pub struct VerboseFilter {
    pub verbose_name: String,
    pub prop_name: String,
    pub value: PropValue,
}

impl VerboseFilter {
    pub fn new(
        verbose_name: impl Into<String>,
        prop_name: impl Into<String>,
        value: impl Into<PropValue>,
    ) -> Self {
        Self {
            verbose_name: verbose_name.into(),
            prop_name: prop_name.into(),
            value: value.into(),
        }
    }
    fn matches(&self, initiative: &Initiative) -> bool {
        initiative.get(&self.prop_name).has(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

/// The bounding box of those initiatives that have a location.
pub fn located_bounds<'a, I>(initiatives: I) -> Option<Bounds>
where
    I: IntoIterator<Item = &'a Arc<Initiative>>,
{
    initiatives
        .into_iter()
        .filter(|initiative| initiative.has_location())
        .filter_map(|initiative| Some((initiative.lat()?, initiative.lng()?)))
        .fold(None, |bounds: Option<Bounds>, (lat, lng)| {
            Some(match bounds {
                None => Bounds {
                    min_lat: lat,
                    min_lng: lng,
                    max_lat: lat,
                    max_lng: lng,
                },
                Some(b) => Bounds {
                    min_lat: b.min_lat.min(lat),
                    min_lng: b.min_lng.min(lng),
                    max_lat: b.max_lat.max(lat),
                    max_lng: b.max_lng.max(lng),
                },
            })
        })
}

pub struct DataServices {
    config: MapConfig,
    schema: Arc<PropertySchema>,
    dataset_loaders: Vec<Arc<dyn DatasetLoader<RawRecord>>>,
    vocab_loaders: Vec<Arc<dyn DatasetLoader<VocabSource>>>,
    vocabs: RwLock<Arc<VocabServices>>,
    aggregated: RwLock<Arc<AggregatedData>>,
    statuses: RwLock<BTreeMap<String, DatasetStatus>>,
    generation: AtomicU64,
    events: broadcast::Sender<DataEvent>,
}

impl DataServices {
    /// Services over the dataset and vocabulary files named in `config`.
    pub fn new(config: MapConfig) -> Result<Self> {
        let datasets: Vec<Arc<dyn DatasetLoader<RawRecord>>> = config
            .datasets
            .iter()
            .map(|d| {
                Arc::new(JsonFileLoader::new(&d.id, &d.path, config.batch_size))
                    as Arc<dyn DatasetLoader<RawRecord>>
            })
            .collect();
        let vocabs: Vec<Arc<dyn DatasetLoader<VocabSource>>> = config
            .vocabularies
            .iter()
            .map(|v| Arc::new(VocabFileLoader::new(&v.id, &v.path)) as Arc<dyn DatasetLoader<VocabSource>>)
            .collect();
        Self::with_loaders(config, datasets, vocabs)
    }

    pub fn with_loaders(
        config: MapConfig,
        dataset_loaders: Vec<Arc<dyn DatasetLoader<RawRecord>>>,
        vocab_loaders: Vec<Arc<dyn DatasetLoader<VocabSource>>>,
    ) -> Result<Self> {
        config.validate()?;
        let schema = Arc::new(config.property_schema()?);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let vocabs = Arc::new(VocabServices::empty(config.fallback_language()));
        Ok(Self {
            config,
            schema,
            dataset_loaders,
            vocab_loaders,
            vocabs: RwLock::new(vocabs),
            aggregated: RwLock::new(Arc::new(AggregatedData::default())),
            statuses: RwLock::new(BTreeMap::new()),
            generation: AtomicU64::new(0),
            events,
        })
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }
    pub fn schema(&self) -> &Arc<PropertySchema> {
        &self.schema
    }
    pub fn dataset_ids(&self) -> Vec<String> {
        self.dataset_loaders.iter().map(|l| l.id().to_string()).collect()
    }
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
    /// Events from every load cycle started after subscribing. A receiver
    /// that falls more than the channel capacity behind misses events.
    pub fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.events.subscribe()
    }

    /// The last published aggregate; empty before the first load.
    pub fn aggregated_data(&self) -> Result<Arc<AggregatedData>> {
        Ok(Arc::clone(&*self.aggregated.read()?))
    }
    pub fn vocab_services(&self) -> Result<Arc<VocabServices>> {
        Ok(Arc::clone(&*self.vocabs.read()?))
    }
    pub fn dataset_status(&self, dataset_id: &str) -> Result<Option<DatasetStatus>> {
        Ok(self.statuses.read()?.get(dataset_id).cloned())
    }
    pub fn dataset_statuses(&self) -> Result<BTreeMap<String, DatasetStatus>> {
        Ok(self.statuses.read()?.clone())
    }

    /// Loads every configured dataset.
    pub async fn load_data(&self) -> Result<LoadOutcome> {
        let ids = self.dataset_ids();
        self.load_datasets(&ids).await
    }

    pub async fn reset(&self, target: ResetTarget) -> Result<LoadOutcome> {
        match target {
            ResetTarget::All => self.load_data().await,
            ResetTarget::Dataset(id) => self.load_datasets(&[id]).await,
        }
    }

    /// Replaces the aggregate with one built from the named datasets.
    ///
    /// Vocabularies are reloaded first. If they fail entirely the load carries
    /// on with none, after announcing [`DataEvent::VocabsFailed`]. A duplicate
    /// uri or an unattributable loader failure aborts the cycle and leaves the
    /// published aggregate untouched.
    pub async fn load_datasets(&self, ids: &[String]) -> Result<LoadOutcome> {
        let loaders = ids
            .iter()
            .map(|id| {
                self.dataset_loaders
                    .iter()
                    .find(|loader| loader.id() == id)
                    .cloned()
                    .ok_or_else(|| MapdexError::NotFound(format!("no dataset '{id}'")))
            })
            .collect::<Result<Vec<_>>>()?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, datasets = ?ids, "load started");
        self.emit(DataEvent::LoadStarted {
            generation,
            datasets: ids.to_vec(),
        });

        let vocabs = Arc::new(self.load_vocabs(generation).await);
        let aggregator = self.aggregator(generation, Arc::clone(&vocabs));
        let consumer = loader::load_datasets(&loaders, Arc::new(Mutex::new(aggregator))).await?;
        let aggregator = into_inner(consumer)?;

        if self.generation() != generation {
            warn!(generation, current = self.generation(), "discarding superseded load");
            return Ok(LoadOutcome::Superseded);
        }

        let statuses: BTreeMap<String, DatasetStatus> = ids
            .iter()
            .map(|id| {
                let status = aggregator.status(id).cloned().unwrap_or_else(|| {
                    warn!(dataset = %id, "dataset neither completed nor failed");
                    DatasetStatus::Loading
                });
                (id.clone(), status)
            })
            .collect();
        let data = Arc::new(aggregator.into_aggregated_data());
        *self.vocabs.write()? = vocabs;
        *self.aggregated.write()? = Arc::clone(&data);
        *self.statuses.write()? = statuses;

        info!(generation, initiatives = data.len(), "load complete");
        self.emit(DataEvent::LoadComplete {
            generation,
            initiatives: data.len(),
        });
        Ok(LoadOutcome::Published(data))
    }

    fn aggregator(&self, generation: u64, vocabs: Arc<VocabServices>) -> DataAggregator {
        let factory = InitiativeFactory::new(
            Arc::clone(&self.schema),
            self.config.searched_fields.clone(),
            Arc::clone(&vocabs),
        );
        let indexer = PropertyIndexer::new(
            self.config.filterable_fields.clone(),
            Arc::clone(&self.schema),
            vocabs,
            self.config.language(),
        );
        let (loaded, completed, failed) = (self.events.clone(), self.events.clone(), self.events.clone());
        DataAggregator::new(factory, indexer)
            .on_initiative(move |initiative| {
                let _ = loaded.send(DataEvent::InitiativeLoaded {
                    generation,
                    uri: initiative.uri().to_string(),
                });
            })
            .on_dataset_complete(move |dataset| {
                let _ = completed.send(DataEvent::DatasetComplete {
                    generation,
                    dataset: dataset.to_string(),
                });
            })
            .on_dataset_fail(move |dataset, error| {
                let _ = failed.send(DataEvent::DatasetFailed {
                    generation,
                    dataset: dataset.to_string(),
                    message: error.to_string(),
                });
            })
    }

    async fn load_vocabs(&self, generation: u64) -> VocabServices {
        let fallback = self.config.fallback_language();
        if self.vocab_loaders.is_empty() {
            return VocabServices::empty(fallback);
        }
        let consumer = Arc::new(Mutex::new(VocabAggregator::new()));
        let loaded = loader::load_datasets(&self.vocab_loaders, consumer)
            .await
            .and_then(into_inner);
        let failure = match loaded {
            Ok(aggregator) if !aggregator.completed().is_empty() => {
                if !aggregator.conflicts().is_empty() {
                    warn!(conflicts = aggregator.conflicts().len(), "vocabulary conflicts ignored");
                }
                return VocabServices::new(aggregator.into_index(), fallback);
            }
            Ok(aggregator) => aggregator
                .failed()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
            Err(err) => err.to_string(),
        };
        warn!(generation, %failure, "no vocabularies loaded, continuing without");
        self.emit(DataEvent::VocabsFailed {
            generation,
            message: failure,
        });
        VocabServices::empty(fallback)
    }

    fn emit(&self, event: DataEvent) {
        // no subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Loaded initiatives whose search text contains `text` once normalised,
    /// in display-name order. An empty search matches everything.
    pub fn search(&self, text: &str) -> Result<Vec<Arc<Initiative>>> {
        let data = self.aggregated_data()?;
        Ok(TextSearch::new(text).filter(&data.loaded_initiatives))
    }

    /// For each filterable property, its value keys in index order paired
    /// with a label in `lang`. Vocabulary properties use term labels, the
    /// rest use the key itself.
    pub fn verbose_values_for_fields(&self, lang: &str) -> Result<BTreeMap<String, Vec<(String, String)>>> {
        let data = self.aggregated_data()?;
        let vocabs = self.vocab_services()?;
        let mut verbose = BTreeMap::new();
        for prop in &self.config.filterable_fields {
            let Some(index) = data.registered_values.get(prop) else {
                continue;
            };
            let is_vocab = self.schema.resolves_to_vocab(prop);
            let labelled = index
                .keys()
                .iter()
                .map(|key| {
                    let label = if is_vocab {
                        vocabs.get_term(key, lang, Some(key))
                    } else {
                        key.clone()
                    };
                    (key.clone(), label)
                })
                .collect();
            verbose.insert(prop.clone(), labelled);
        }
        Ok(verbose)
    }

    /// The values `field` takes across loaded initiatives that pass every
    /// filter not belonging to `field`.
    ///
    /// A filter belongs to `field` when the part of its verbose name before
    /// the first `:` equals the field's title (its vocabulary title, or the
    /// field name for plain values). Two fields sharing a title therefore
    /// exclude each other's filters too.
    pub fn alternate_possible_filter_values(&self, filters: &[VerboseFilter], field: &str) -> Result<BTreeSet<String>> {
        let data = self.aggregated_data()?;
        let vocabs = self.vocab_services()?;
        let title = match self.schema.vocab_uri(field) {
            Some(uri) => vocabs
                .get_vocab_title(uri, self.config.language())
                .map(str::to_string)
                .unwrap_or_else(|_| field.to_string()),
            None => field.to_string(),
        };
        let others: Vec<&VerboseFilter> = filters
            .iter()
            .filter(|filter| filter.verbose_name.split(':').next().unwrap_or("").trim() != title)
            .collect();
        Ok(data
            .loaded_initiatives
            .iter()
            .filter(|initiative| others.iter().all(|filter| filter.matches(initiative)))
            .flat_map(|initiative| initiative.get(field).elements())
            .filter(|value| !value.is_absent())
            .map(PropValue::to_key)
            .collect())
    }
}

fn into_inner<C>(consumer: Arc<Mutex<C>>) -> Result<C> {
    let consumer = Arc::try_unwrap(consumer)
        .map_err(|_| MapdexError::Lock("consumer is still shared after loading".into()))?;
    Ok(consumer.into_inner()?)
}
