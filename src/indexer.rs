//! Secondary indexes from property values to initiatives.
//!
//! Indexing is two-phase. [`PropertyIndexer::on_data`] is called once per
//! initiative while datasets are still loading and keeps every value's
//! initiative list in display-name order. [`PropertyIndexer::on_complete`] is
//! called once everything has loaded and sorts each property's value keys,
//! by vocabulary label where the property draws on a vocabulary.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::OtherHasher;
use crate::initiative::{Initiative, compare_by_name};
use crate::schema::PropertySchema;
use crate::value::PropValue;
use crate::vocab::VocabServices;

/// Inserts `initiative` into a display-name ordered list unless it is
/// already there. Returns whether it was inserted.
pub fn insert_sorted(list: &mut Vec<Arc<Initiative>>, initiative: &Arc<Initiative>) -> bool {
    match list.binary_search_by(|kept| compare_by_name(kept, initiative)) {
        Ok(_) => false,
        Err(at) => {
            list.insert(at, Arc::clone(initiative));
            true
        }
    }
}

/// Removes `initiative` from a display-name ordered list. Returns whether it
/// was there.
pub fn remove_sorted(list: &mut Vec<Arc<Initiative>>, initiative: &Initiative) -> bool {
    match list.binary_search_by(|kept| compare_by_name(kept, initiative)) {
        Ok(at) => {
            list.remove(at);
            true
        }
        Err(_) => false,
    }
}

// ------------- ValueIndex -------------
/// The initiatives holding each value of one property. Keys enumerate in
/// first-seen order until the indexer completes, then in sorted order.
#[derive(Debug, Clone, Default)]
pub struct ValueIndex {
    keys: Vec<String>,
    entries: HashMap<String, Vec<Arc<Initiative>>, OtherHasher>,
}

impl ValueIndex {
    pub fn insert(&mut self, key: &str, initiative: &Arc<Initiative>) -> bool {
        if !self.entries.contains_key(key) {
            self.keys.push(key.to_string());
        }
        let list = self.entries.entry(key.to_string()).or_default();
        insert_sorted(list, initiative)
    }
    /// Drops `initiative` from the list under `key`, and the key itself once
    /// nothing holds that value any more.
    pub fn remove(&mut self, key: &str, initiative: &Initiative) -> bool {
        let Some(list) = self.entries.get_mut(key) else {
            return false;
        };
        let removed = remove_sorted(list, initiative);
        if list.is_empty() {
            self.entries.remove(key);
            self.keys.retain(|k| k != key);
        }
        removed
    }
    pub fn get(&self, key: &str) -> Option<&[Arc<Initiative>]> {
        self.entries.get(key).map(Vec::as_slice)
    }
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Arc<Initiative>])> {
        self.keys
            .iter()
            .filter_map(|key| self.entries.get(key).map(|list| (key.as_str(), list.as_slice())))
    }
    pub fn len(&self) -> usize {
        self.keys.len()
    }
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// property name -> value key -> initiatives
pub type RegisteredValues = HashMap<String, ValueIndex, OtherHasher>;

// ------------- PropertyIndexer -------------
#[derive(Debug)]
pub struct PropertyIndexer {
    props: Vec<String>,
    schema: Arc<PropertySchema>,
    vocabs: Arc<VocabServices>,
    language: String,
    by_prop_then_value: RegisteredValues,
}

impl PropertyIndexer {
    pub fn new(
        props: Vec<String>,
        schema: Arc<PropertySchema>,
        vocabs: Arc<VocabServices>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            props,
            schema,
            vocabs,
            language: language.into(),
            by_prop_then_value: RegisteredValues::default(),
        }
    }
    pub fn props(&self) -> &[String] {
        &self.props
    }
    /// The keys `initiative` is filed under for `prop`: one per element of a
    /// multi-valued property, none when the value is absent.
    fn keys_of(&self, prop: &str, initiative: &Initiative) -> Vec<String> {
        let value = initiative.get(prop);
        if value.is_absent() {
            return Vec::new();
        }
        if self.schema.is_multi(prop) {
            value.elements().into_iter().map(PropValue::to_key).collect()
        } else {
            vec![value.to_key()]
        }
    }
    pub fn on_data(&mut self, initiative: &Arc<Initiative>) {
        for prop in &self.props {
            let keys = self.keys_of(prop, initiative);
            if keys.is_empty() {
                debug!(uri = %initiative.uri(), %prop, "no value to index");
                continue;
            }
            let index = self.by_prop_then_value.entry(prop.clone()).or_default();
            for key in &keys {
                index.insert(key, initiative);
            }
        }
    }
    /// Undoes [`on_data`](Self::on_data) for one initiative.
    pub fn on_remove(&mut self, initiative: &Initiative) {
        for prop in &self.props {
            let keys = self.keys_of(prop, initiative);
            let Some(index) = self.by_prop_then_value.get_mut(prop) else {
                continue;
            };
            for key in &keys {
                index.remove(key, initiative);
            }
            if index.is_empty() {
                self.by_prop_then_value.remove(prop);
            }
        }
    }
    /// Sorts every property's value keys. Safe to call more than once.
    pub fn on_complete(&mut self) {
        for prop in &self.props {
            let Some(index) = self.by_prop_then_value.get_mut(prop) else {
                continue;
            };
            if self.schema.resolves_to_vocab(prop) {
                let vocabs = &self.vocabs;
                let language = &self.language;
                index.keys.sort_by_cached_key(|key| {
                    (vocabs.get_term(key, language, Some(key)), key.clone())
                });
            } else {
                index.keys.sort();
            }
        }
    }
    pub fn registered_values(&self) -> &RegisteredValues {
        &self.by_prop_then_value
    }
    pub fn into_registered_values(self) -> RegisteredValues {
        self.by_prop_then_value
    }
}
