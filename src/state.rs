//! The application state: which initiatives are visible, and why.
//!
//! An [`AppState`] is immutable. Every transition computes a new state by
//! applying the text search and every property filter afresh to the full set
//! of initiatives, or returns `None` when nothing would change.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
// used for the visible set, as positions into the full set
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::initiative::Initiative;
use crate::stack::StateChange;
use crate::value::PropValue;

lazy_static! {
    static ref APOSTROPHES: Regex = Regex::new(r"['`\x{2018}\x{2019}]").unwrap();
    static ref PUNCTUATION: Regex = Regex::new(r"[^\p{L}\p{N}\s]+").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

// ------------- TextSearch -------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextSearch {
    text: String,
    normalised: String,
}

impl TextSearch {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let normalised = Self::normalise(&text);
        Self { text, normalised }
    }
    /// Uppercases, drops apostrophes and backticks, turns any other run of
    /// punctuation into a space, then collapses and trims whitespace.
    pub fn normalise(text: &str) -> String {
        let upper = text.to_uppercase();
        let unquoted = APOSTROPHES.replace_all(&upper, "");
        let spaced = PUNCTUATION.replace_all(&unquoted, " ");
        WHITESPACE.replace_all(&spaced, " ").trim().to_string()
    }
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn normalised(&self) -> &str {
        &self.normalised
    }
    pub fn is_searching(&self) -> bool {
        !self.normalised.is_empty()
    }
    pub fn matches(&self, initiative: &Initiative) -> bool {
        !self.is_searching() || initiative.search_text().contains(&self.normalised)
    }
    pub fn filter<'a, I>(&self, initiatives: I) -> Vec<Arc<Initiative>>
    where
        I: IntoIterator<Item = &'a Arc<Initiative>>,
    {
        initiatives
            .into_iter()
            .filter(|initiative| self.matches(initiative))
            .cloned()
            .collect()
    }
}

// ------------- PropEquality -------------
/// Requires a property to equal a value, or to contain it when multi-valued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropEquality {
    pub prop_name: String,
    pub value_required: PropValue,
}

impl PropEquality {
    pub fn new(prop_name: impl Into<String>, value_required: impl Into<PropValue>) -> Self {
        Self {
            prop_name: prop_name.into(),
            value_required: value_required.into(),
        }
    }
    pub fn matches(&self, initiative: &Initiative) -> bool {
        initiative.get(&self.prop_name).has(&self.value_required)
    }
    pub fn filter<'a, I>(&self, initiatives: I) -> Vec<Arc<Initiative>>
    where
        I: IntoIterator<Item = &'a Arc<Initiative>>,
    {
        initiatives
            .into_iter()
            .filter(|initiative| self.matches(initiative))
            .cloned()
            .collect()
    }
}

// ------------- Action -------------
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Initialise,
    TextSearch { search: TextSearch },
    AddPropEquality { filter: PropEquality },
    RemovePropEquality { prop_name: String },
    RemovePropEqualities,
    ClearPropEqualitiesAndTextSearch,
    Restart,
}

pub type AppStateChange = StateChange<Action, AppState>;

// ------------- AppState -------------
#[derive(Debug, Clone)]
pub struct AppState {
    all: Arc<[Arc<Initiative>]>,
    visible: RoaringBitmap,
    text_search: TextSearch,
    prop_filters: BTreeMap<String, PropEquality>,
}

impl AppState {
    /// Everything visible, nothing searched or filtered.
    pub fn new(all: Vec<Arc<Initiative>>) -> Self {
        Self::compose(all.into(), TextSearch::default(), BTreeMap::new())
    }

    fn compose(
        all: Arc<[Arc<Initiative>]>,
        text_search: TextSearch,
        prop_filters: BTreeMap<String, PropEquality>,
    ) -> Self {
        let mut visible = RoaringBitmap::new();
        for (position, initiative) in (0u32..).zip(all.iter()) {
            if text_search.matches(initiative)
                && prop_filters.values().all(|filter| filter.matches(initiative))
            {
                visible.insert(position);
            }
        }
        Self {
            all,
            visible,
            text_search,
            prop_filters,
        }
    }

    fn change(&self, action: Action, text_search: TextSearch, prop_filters: BTreeMap<String, PropEquality>) -> AppStateChange {
        StateChange::new(action, Self::compose(Arc::clone(&self.all), text_search, prop_filters))
    }

    pub fn all_initiatives(&self) -> &[Arc<Initiative>] {
        &self.all
    }
    /// Visible initiatives in the order of the full set.
    pub fn visible_initiatives(&self) -> impl Iterator<Item = &Arc<Initiative>> {
        self.visible.iter().map(|position| &self.all[position as usize])
    }
    pub fn visible_count(&self) -> usize {
        self.visible.len() as usize
    }
    pub fn text_search(&self) -> &TextSearch {
        &self.text_search
    }
    pub fn prop_filters(&self) -> &BTreeMap<String, PropEquality> {
        &self.prop_filters
    }
    pub fn prop_filter(&self, prop_name: &str) -> Option<&PropEquality> {
        self.prop_filters.get(prop_name)
    }

    pub fn add_text_search(&self, search: TextSearch) -> Option<AppStateChange> {
        if search.text() == self.text_search.text() {
            return None;
        }
        Some(self.change(
            Action::TextSearch { search: search.clone() },
            search,
            self.prop_filters.clone(),
        ))
    }

    pub fn add_prop_equality(&self, filter: PropEquality) -> Option<AppStateChange> {
        if self.prop_filters.get(&filter.prop_name) == Some(&filter) {
            return None;
        }
        let mut prop_filters = self.prop_filters.clone();
        prop_filters.insert(filter.prop_name.clone(), filter.clone());
        Some(self.change(
            Action::AddPropEquality { filter },
            self.text_search.clone(),
            prop_filters,
        ))
    }

    pub fn remove_prop_equality(&self, prop_name: &str) -> Option<AppStateChange> {
        if !self.prop_filters.contains_key(prop_name) {
            return None;
        }
        let mut prop_filters = self.prop_filters.clone();
        prop_filters.remove(prop_name);
        Some(self.change(
            Action::RemovePropEquality { prop_name: prop_name.to_string() },
            self.text_search.clone(),
            prop_filters,
        ))
    }

    pub fn remove_prop_equalities(&self) -> Option<AppStateChange> {
        if self.prop_filters.is_empty() {
            return None;
        }
        Some(self.change(
            Action::RemovePropEqualities,
            self.text_search.clone(),
            BTreeMap::new(),
        ))
    }

    pub fn remove_prop_equalities_and_clear_text_search(&self) -> Option<AppStateChange> {
        if self.prop_filters.is_empty() && self.text_search.text().is_empty() {
            return None;
        }
        Some(self.change(
            Action::ClearPropEqualitiesAndTextSearch,
            TextSearch::default(),
            BTreeMap::new(),
        ))
    }

    /// The same search and filters over a new set of initiatives.
    pub fn restart_state(&self, all: Vec<Arc<Initiative>>) -> AppStateChange {
        StateChange::new(
            Action::Restart,
            Self::compose(all.into(), self.text_search.clone(), self.prop_filters.clone()),
        )
    }

    /// The values `prop_name` takes across initiatives that pass the search
    /// and every filter other than the one on `prop_name` itself.
    pub fn alt_values(&self, prop_name: &str) -> BTreeSet<String> {
        self.all
            .iter()
            .filter(|initiative| self.text_search.matches(initiative))
            .filter(|initiative| {
                self.prop_filters
                    .values()
                    .filter(|filter| filter.prop_name != prop_name)
                    .all(|filter| filter.matches(initiative))
            })
            .flat_map(|initiative| initiative.get(prop_name).elements())
            .filter(|value| !value.is_absent())
            .map(PropValue::to_key)
            .collect()
    }
}

impl PartialEq for AppState {
    fn eq(&self, other: &Self) -> bool {
        let same_universe = Arc::ptr_eq(&self.all, &other.all)
            || (self.all.len() == other.all.len()
                && self.all.iter().zip(other.all.iter()).all(|(a, b)| a == b));
        same_universe
            && self.visible == other.visible
            && self.text_search == other.text_search
            && self.prop_filters == other.prop_filters
    }
}
