//! Mapdex – the data and state engine behind an interactive map directory.
//!
//! Geo-tagged *initiatives* arrive from any number of datasets, are built into
//! uniform records according to a runtime [`schema::PropertySchema`], indexed by
//! the values of their filterable properties, and narrowed down by a text search
//! combined with property filters, with back/forward history over every change.
//!
//! ## Modules
//! * [`value`] – Runtime property values ([`value::PropValue`]) and scalar kinds.
//! * [`schema`] – Property definitions and the builders that read raw records.
//! * [`initiative`] – The [`initiative::Initiative`] record and its factory.
//! * [`vocab`] – Controlled vocabularies: uri abbreviation and localised labels.
//! * [`indexer`] – Property value index, kept in display-name order.
//! * [`aggregator`] – Merges dataset batches into one [`aggregator::AggregatedData`].
//! * [`loader`] – Consumer and loader traits plus the concurrent multi-loader.
//! * [`sources`] – JSON file and in-memory loaders.
//! * [`stack`], [`state`], [`state_manager`] – Immutable app state and its undo history.
//! * [`services`] – Load cycles, events and queries over the published aggregate.
//! * [`config`] – Runtime configuration.
//! * [`server`] – A small JSON HTTP surface over the engine.
//!
//! ## Keepers and lookups
//! The aggregator owns initiatives while a load is in progress and guarantees
//! that each uri is kept once. Everything handed out afterwards is shared
//! through `Arc` and never mutated: a reload builds a new aggregate and a new
//! app state rather than editing the old ones.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use mapdex::initiative::InitiativeFactory;
//! use mapdex::schema::PropertySchema;
//! use mapdex::state_manager::StateManager;
//! use mapdex::vocab::VocabServices;
//!
//! let factory = InitiativeFactory::new(
//!     Arc::new(PropertySchema::base()),
//!     vec!["name".into()],
//!     Arc::new(VocabServices::empty("en")),
//! );
//! let raw = serde_json::json!({"uri": "urn:1", "name": "Apple Co-op"});
//! let initiative = factory.build(raw.as_object().unwrap()).unwrap();
//! let mut manager = StateManager::new(vec![Arc::new(initiative)]);
//! assert!(manager.text_search("apple"));
//! assert_eq!(manager.current_state().visible_count(), 1);
//! ```

use std::hash::BuildHasherDefault;

use seahash::SeaHasher;

pub mod aggregator;
pub mod config;
pub mod error;
pub mod indexer;
pub mod initiative;
pub mod loader;
pub mod schema;
pub mod server;
pub mod services;
pub mod sources;
pub mod stack;
pub mod state;
pub mod state_manager;
pub mod value;
pub mod vocab;

pub use error::{LoadError, MapdexError, Result};

// used for the lookup maps, faster than the default hasher
pub type OtherHasher = BuildHasherDefault<SeaHasher>;
