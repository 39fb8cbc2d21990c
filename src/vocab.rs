//! Vocabularies: controlled terms with localised labels.
//!
//! Terms and vocabularies are identified by abbreviated URIs (`prefix:suffix`).
//! Several sources can be merged into one [`VocabIndex`]; a conflicting
//! registration never overwrites an earlier one, it is reported instead.

use std::collections::{BTreeMap, HashMap};

// used to keep the one-to-one mapping between full uri prefixes and their abbreviations
use bimap::BiMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::OtherHasher;
use crate::error::{LoadError, MapdexError, Result};
use crate::loader::DataConsumer;

/// Shown when a term has no label in either the requested or fallback language.
pub const NOT_AVAILABLE: &str = "(not available)";

/// One vocabulary in one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalisedVocab {
    pub title: String,
    #[serde(default)]
    pub terms: BTreeMap<String, String>,
}

/// One vocabulary, keyed by language code.
pub type Vocab = BTreeMap<String, LocalisedVocab>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabMeta {
    #[serde(default)]
    pub languages: Vec<String>,
}

/// A fragment of vocabulary data as delivered by a vocabulary loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabSource {
    /// full uri prefix -> abbreviation
    #[serde(default)]
    pub prefixes: BTreeMap<String, String>,
    /// vocabulary uri (full or abbreviated) -> vocabulary
    #[serde(default)]
    pub vocabs: BTreeMap<String, Vocab>,
    #[serde(default)]
    pub meta: VocabMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VocabConflict {
    /// The abbreviation is already bound to another uri.
    Prefix { prefix: String, kept_uri: String, rejected_uri: String },
    /// The uri is already abbreviated differently.
    Uri { uri: String, kept_prefix: String, rejected_prefix: String },
    /// The vocabulary was already supplied by an earlier source.
    Vocab { uri: String },
}

#[derive(Debug, Clone, Default)]
pub struct VocabIndex {
    // full uri <-> abbreviation (without the colon)
    prefixes: BiMap<String, String>,
    vocabs: HashMap<String, Vocab, OtherHasher>,
    languages: Vec<String>,
}

impl VocabIndex {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn from_source(source: VocabSource) -> (Self, Vec<VocabConflict>) {
        let mut index = Self::new();
        let conflicts = index.merge(source);
        (index, conflicts)
    }
    /// Merges a source into this index, keeping earlier registrations on conflict.
    pub fn merge(&mut self, source: VocabSource) -> Vec<VocabConflict> {
        let mut conflicts = Vec::new();
        for (uri, prefix) in source.prefixes {
            let prefix = prefix.trim_end_matches(':').to_string();
            match (self.prefixes.get_by_left(&uri), self.prefixes.get_by_right(&prefix)) {
                (None, None) => {
                    self.prefixes.insert(uri, prefix);
                }
                (Some(kept), _) if *kept == prefix => (),
                (Some(kept), _) => conflicts.push(VocabConflict::Uri {
                    uri,
                    kept_prefix: kept.clone(),
                    rejected_prefix: prefix,
                }),
                (None, Some(kept)) => conflicts.push(VocabConflict::Prefix {
                    prefix,
                    kept_uri: kept.clone(),
                    rejected_uri: uri,
                }),
            }
        }
        for (uri, vocab) in source.vocabs {
            let key = self.abbrev_uri(&uri);
            if self.vocabs.contains_key(&key) {
                conflicts.push(VocabConflict::Vocab { uri: key });
                continue;
            }
            let vocab = vocab
                .into_iter()
                .map(|(lang, localised)| {
                    let terms = localised
                        .terms
                        .into_iter()
                        .map(|(term, label)| (self.abbrev_uri(&term), label))
                        .collect();
                    (lang, LocalisedVocab { title: localised.title, terms })
                })
                .collect();
            self.vocabs.insert(key, vocab);
        }
        for language in source.meta.languages {
            if !self.languages.contains(&language) {
                self.languages.push(language);
            }
        }
        for conflict in &conflicts {
            warn!(?conflict, "vocabulary conflict, keeping the earlier registration");
        }
        conflicts
    }
    /// Abbreviates `uri` using the longest registered prefix. Unmatched uris
    /// pass through unchanged.
    pub fn abbrev_uri(&self, uri: &str) -> String {
        self.prefixes
            .iter()
            .filter(|(full, _)| uri.starts_with(full.as_str()))
            .max_by_key(|(full, _)| full.len())
            .map(|(full, prefix)| format!("{}:{}", prefix, &uri[full.len()..]))
            .unwrap_or_else(|| uri.to_string())
    }
    pub fn expand_uri(&self, abbrev: &str) -> String {
        match abbrev.split_once(':') {
            Some((prefix, rest)) => match self.prefixes.get_by_right(prefix) {
                Some(full) => format!("{full}{rest}"),
                None => abbrev.to_string(),
            },
            None => abbrev.to_string(),
        }
    }
    pub fn vocab(&self, abbrev: &str) -> Option<&Vocab> {
        self.vocabs.get(abbrev)
    }
    pub fn vocab_ids(&self) -> impl Iterator<Item = &str> {
        self.vocabs.keys().map(String::as_str)
    }
    pub fn languages(&self) -> &[String] {
        &self.languages
    }
    pub fn is_empty(&self) -> bool {
        self.vocabs.is_empty()
    }
}

/// Lookups over a merged [`VocabIndex`] with language fallback.
#[derive(Debug, Clone)]
pub struct VocabServices {
    index: VocabIndex,
    fallback_language: String,
}

impl VocabServices {
    pub fn new(index: VocabIndex, fallback_language: impl Into<String>) -> Self {
        Self {
            index,
            fallback_language: fallback_language.into(),
        }
    }
    pub fn empty(fallback_language: impl Into<String>) -> Self {
        Self::new(VocabIndex::new(), fallback_language)
    }
    pub fn index(&self) -> &VocabIndex {
        &self.index
    }
    pub fn fallback_language(&self) -> &str {
        &self.fallback_language
    }
    pub fn abbrev_uri(&self, uri: &str) -> String {
        self.index.abbrev_uri(uri)
    }
    pub fn expand_uri(&self, abbrev: &str) -> String {
        self.index.expand_uri(abbrev)
    }
    pub fn has_vocab(&self, uri: &str) -> bool {
        self.index.vocab(&self.abbrev_uri(uri)).is_some()
    }
    /// The vocabulary `uri` in `lang`, or in the fallback language when `lang`
    /// is missing.
    pub fn get_vocab(&self, uri: &str, lang: &str) -> Result<&LocalisedVocab> {
        let key = self.abbrev_uri(uri);
        let vocab = self
            .index
            .vocab(&key)
            .ok_or_else(|| MapdexError::NotFound(format!("no vocabulary '{key}'")))?;
        vocab
            .get(lang)
            .or_else(|| vocab.get(&self.fallback_language))
            .ok_or_else(|| {
                MapdexError::NotFound(format!(
                    "vocabulary '{key}' has neither language '{lang}' nor '{}'",
                    self.fallback_language
                ))
            })
    }
    pub fn get_vocab_title(&self, uri: &str, lang: &str) -> Result<&str> {
        self.get_vocab(uri, lang).map(|vocab| vocab.title.as_str())
    }
    /// The label of `term_uri` in `lang`, falling back to the fallback
    /// language, then to `default`, then to [`NOT_AVAILABLE`].
    pub fn get_term(&self, term_uri: &str, lang: &str, default: Option<&str>) -> String {
        let term = self.abbrev_uri(term_uri);
        let label = term
            .find(':')
            .and_then(|at| self.index.vocab(&term[..=at]))
            .and_then(|vocab| {
                let in_lang = vocab.get(lang).and_then(|v| v.terms.get(&term));
                in_lang.or_else(|| {
                    vocab
                        .get(&self.fallback_language)
                        .and_then(|v| v.terms.get(&term))
                })
            });
        match label {
            Some(label) => label.clone(),
            None => {
                debug!(%term, %lang, "no label for term");
                default.unwrap_or(NOT_AVAILABLE).to_string()
            }
        }
    }
    /// Every vocabulary localised to `lang` (with fallback), keyed by its id.
    pub fn localised_vocabs(&self, lang: &str) -> BTreeMap<String, LocalisedVocab> {
        self.index
            .vocab_ids()
            .filter_map(|id| {
                self.get_vocab(id, lang)
                    .ok()
                    .map(|vocab| (id.to_string(), vocab.clone()))
            })
            .collect()
    }
}

/// Consumer merging vocabulary sources as they load.
#[derive(Debug, Default)]
pub struct VocabAggregator {
    index: VocabIndex,
    conflicts: Vec<VocabConflict>,
    completed: Vec<String>,
    failed: Vec<LoadError>,
}

impl VocabAggregator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn conflicts(&self) -> &[VocabConflict] {
        &self.conflicts
    }
    pub fn completed(&self) -> &[String] {
        &self.completed
    }
    pub fn failed(&self) -> &[LoadError] {
        &self.failed
    }
    pub fn into_index(self) -> VocabIndex {
        self.index
    }
}

impl DataConsumer<VocabSource> for VocabAggregator {
    fn add_batch(&mut self, source_id: &str, batch: Vec<VocabSource>) -> Result<()> {
        debug!(source = %source_id, fragments = batch.len(), "merging vocabularies");
        for source in batch {
            let conflicts = self.index.merge(source);
            self.conflicts.extend(conflicts);
        }
        Ok(())
    }
    fn complete(&mut self, source_id: &str) -> Result<()> {
        self.completed.push(source_id.to_string());
        Ok(())
    }
    fn fail(&mut self, _source_id: &str, error: &LoadError) -> Result<()> {
        self.failed.push(error.clone());
        Ok(())
    }
}
