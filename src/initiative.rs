use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// used to split accents off base letters when collating names
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::OtherHasher;
use crate::error::Result;
use crate::schema::PropertySchema;
use crate::state::TextSearch;
use crate::value::{PropValue, RawRecord};
use crate::vocab::VocabServices;

static ABSENT: PropValue = PropValue::Absent;

// ------------- Initiative -------------
/// One map pin. Its fields are those of the schema it was built with, defined
/// once at construction and never mutated afterwards.
#[derive(Debug)]
pub struct Initiative {
    fields: HashMap<String, PropValue, OtherHasher>,
    search_text: String,
}

impl Initiative {
    // It's intentional to encapsulate the fields in the struct
    // and only expose them using "getters", because this yields
    // true immutability for initiatives after creation.
    pub fn get(&self, prop: &str) -> &PropValue {
        self.fields.get(prop).unwrap_or(&ABSENT)
    }
    pub fn uri(&self) -> &str {
        self.get("uri").as_str().unwrap_or_default()
    }
    pub fn name(&self) -> &str {
        self.get("name").as_str().unwrap_or_default()
    }
    pub fn dataset(&self) -> &str {
        self.get("dataset").as_str().unwrap_or_default()
    }
    pub fn lat(&self) -> Option<f64> {
        self.get("lat").as_f64()
    }
    pub fn lng(&self) -> Option<f64> {
        self.get("lng").as_f64()
    }
    pub fn has_location(&self) -> bool {
        self.get("lat").is_truthy() && self.get("lng").is_truthy()
    }
    /// Uppercased, normalised text of every searched field.
    pub fn search_text(&self) -> &str {
        &self.search_text
    }
    pub fn fields(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

// identity is the uri
impl PartialEq for Initiative {
    fn eq(&self, other: &Self) -> bool {
        self.uri() == other.uri()
    }
}
impl Eq for Initiative {}
impl Hash for Initiative {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri().hash(state);
    }
}

/// Display-name order as given by [`compare_names`], then by uri so that
/// distinct initiatives never compare equal.
pub fn compare_by_name(a: &Initiative, b: &Initiative) -> Ordering {
    compare_names(a.name(), b.name()).then_with(|| a.uri().cmp(b.uri()))
}

/// Collation in the manner of a root-locale `localeCompare`: base letters
/// ignoring case and accents, then accents (unaccented first), then case
/// (lowercase first), then the exact text.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(&base_letters(b))
        .then_with(|| accented(a).cmp(&accented(b)))
        .then_with(|| uppercase_pattern(a).cmp(&uppercase_pattern(b)))
        .then_with(|| a.cmp(b))
}

fn base_letters(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
fn accented(s: &str) -> String {
    s.nfd().flat_map(char::to_lowercase).collect()
}
fn uppercase_pattern(s: &str) -> Vec<bool> {
    s.nfd().map(char::is_uppercase).collect()
}

// ------------- Factory -------------
/// Builds initiatives from raw records according to a schema.
#[derive(Debug, Clone)]
pub struct InitiativeFactory {
    schema: Arc<PropertySchema>,
    searched: Vec<String>,
    vocabs: Arc<VocabServices>,
}

impl InitiativeFactory {
    pub fn new(schema: Arc<PropertySchema>, searched: Vec<String>, vocabs: Arc<VocabServices>) -> Self {
        Self { schema, searched, vocabs }
    }
    pub fn schema(&self) -> &Arc<PropertySchema> {
        &self.schema
    }
    pub fn vocabs(&self) -> &Arc<VocabServices> {
        &self.vocabs
    }
    /// Any builder failure aborts construction of this record.
    pub fn build(&self, raw: &RawRecord) -> Result<Initiative> {
        let mut fields = HashMap::with_capacity_and_hasher(self.schema.len(), OtherHasher::default());
        for (name, def) in self.schema.iter() {
            let value = def.build(name, raw, &self.vocabs)?;
            fields.insert(name.to_string(), value);
        }
        let search_text = self
            .searched
            .iter()
            .filter_map(|field| fields.get(field))
            .flat_map(PropValue::elements)
            .map(|value| TextSearch::normalise(&value.to_key()))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Initiative { fields, search_text })
    }
}

// ------------- Side table -------------
/// Data the rendering layer associates with initiatives (marker handles and
/// the like), keyed by uri and kept apart from the initiatives themselves.
#[derive(Debug)]
pub struct SideTable<T> {
    by_uri: HashMap<String, T, OtherHasher>,
}

impl<T> SideTable<T> {
    pub fn new() -> Self {
        Self { by_uri: HashMap::default() }
    }
    pub fn insert(&mut self, initiative: &Initiative, data: T) -> Option<T> {
        self.by_uri.insert(initiative.uri().to_string(), data)
    }
    pub fn get(&self, initiative: &Initiative) -> Option<&T> {
        self.by_uri.get(initiative.uri())
    }
    pub fn remove(&mut self, initiative: &Initiative) -> Option<T> {
        self.by_uri.remove(initiative.uri())
    }
    pub fn clear(&mut self) {
        self.by_uri.clear();
    }
    pub fn len(&self) -> usize {
        self.by_uri.len()
    }
    pub fn is_empty(&self) -> bool {
        self.by_uri.is_empty()
    }
}

impl<T> Default for SideTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
