#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};

use mapdex::aggregator::DataAggregator;
use mapdex::indexer::PropertyIndexer;
use mapdex::initiative::{Initiative, InitiativeFactory};
use mapdex::schema::{PropDef, PropertySchema};
use mapdex::value::{RawRecord, ValueKind};
use mapdex::vocab::{VocabIndex, VocabServices, VocabSource};

pub const SIZE: &str = "https://example.org/size/";

pub fn record(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("not a record: {other}"),
    }
}

/// Sizes in English and partly in French. "Extra small" sorts before "Large"
/// although its key `sz:tiny` sorts after `sz:large`.
pub fn size_source() -> VocabSource {
    serde_json::from_value(json!({
        "prefixes": { "https://example.org/size/": "sz" },
        "vocabs": {
            "https://example.org/size/": {
                "en": {
                    "title": "Size",
                    "terms": {
                        "https://example.org/size/large": "Large",
                        "https://example.org/size/small": "Small",
                        "https://example.org/size/tiny": "Extra small"
                    }
                },
                "fr": {
                    "title": "Taille",
                    "terms": { "https://example.org/size/large": "Grand" }
                }
            }
        },
        "meta": { "languages": ["en", "fr"] }
    }))
    .expect("valid vocabulary source")
}

pub fn size_vocabs() -> Arc<VocabServices> {
    let (index, conflicts) = VocabIndex::from_source(size_source());
    assert!(conflicts.is_empty());
    Arc::new(VocabServices::new(index, "en"))
}

pub fn schema() -> Arc<PropertySchema> {
    Arc::new(
        PropertySchema::new(vec![
            ("size", PropDef::vocab("sz:")),
            ("tags", PropDef::multi(PropDef::value(ValueKind::String))),
            ("active", PropDef::value(ValueKind::Boolean)),
        ])
        .expect("valid schema"),
    )
}

pub fn factory() -> InitiativeFactory {
    InitiativeFactory::new(schema(), vec!["name".into(), "tags".into()], size_vocabs())
}

pub fn indexer(props: &[&str]) -> PropertyIndexer {
    PropertyIndexer::new(
        props.iter().map(|p| p.to_string()).collect(),
        schema(),
        size_vocabs(),
        "en",
    )
}

pub fn aggregator() -> DataAggregator {
    DataAggregator::new(factory(), indexer(&["size", "tags"]))
}

pub fn build(value: Value) -> Arc<Initiative> {
    Arc::new(factory().build(&record(value)).expect("buildable record"))
}

/// Four initiatives, deliberately out of name order.
pub fn fruit_records() -> Vec<RawRecord> {
    vec![
        record(json!({
            "uri": "urn:date", "name": "Date Growers", "size": "https://example.org/size/large",
            "tags": [], "lat": 40.0, "lng": 10.0
        })),
        record(json!({
            "uri": "urn:apple", "name": "Apple Co-op", "size": "https://example.org/size/large",
            "tags": ["organic", "local"], "lat": 51.5, "lng": -0.1
        })),
        record(json!({
            "uri": "urn:cherry", "name": "Cherry Collective", "size": "sz:tiny",
            "tags": "local"
        })),
        record(json!({
            "uri": "urn:banana", "name": "banana bunch", "size": "sz:small",
            "tags": ["organic"], "lat": 52.0, "lng": 0.5
        })),
    ]
}

pub fn fruit() -> Vec<Arc<Initiative>> {
    let factory = factory();
    let mut all: Vec<Arc<Initiative>> = fruit_records()
        .iter()
        .map(|raw| Arc::new(factory.build(raw).expect("buildable record")))
        .collect();
    all.sort_by(|a, b| mapdex::initiative::compare_by_name(a, b));
    all
}

pub fn uris<'a>(initiatives: impl IntoIterator<Item = &'a Arc<Initiative>>) -> Vec<String> {
    initiatives.into_iter().map(|i| i.uri().to_string()).collect()
}
