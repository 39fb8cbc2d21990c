mod common;

use std::sync::Arc;

use serde_json::json;

use mapdex::state::{Action, AppState, PropEquality, TextSearch};
use mapdex::state_manager::StateManager;

use common::{build, fruit, uris};

fn visible(state: &AppState) -> Vec<String> {
    uris(state.visible_initiatives())
}

#[test]
fn search_text_is_normalised() {
    assert_eq!(TextSearch::normalise("O'Brien's Co-op!"), "OBRIENS CO OP");
    assert_eq!(TextSearch::normalise("  hello \t  world "), "HELLO WORLD");
    assert_eq!(TextSearch::normalise("Rock\u{2019}n`Roll"), "ROCKNROLL");
    assert_eq!(TextSearch::normalise("fair_trade/café"), "FAIR TRADE CAFÉ");
    assert_eq!(TextSearch::normalise("?!"), "");
    assert!(!TextSearch::new("...").is_searching());
}

#[test]
fn no_op_transitions_return_nothing() {
    let state = AppState::new(fruit());
    assert!(state.add_text_search(state.text_search().clone()).is_none());
    assert!(state.remove_prop_equality("size").is_none());
    assert!(state.remove_prop_equalities().is_none());
    assert!(state.remove_prop_equalities_and_clear_text_search().is_none());

    let searched = state
        .add_text_search(TextSearch::new("apple"))
        .expect("new search")
        .result;
    assert!(searched.add_text_search(TextSearch::new("apple")).is_none());
    // the raw text decides, not its normalised form
    assert!(searched.add_text_search(TextSearch::new("APPLE")).is_some());
}

#[test]
fn text_search_narrows_the_visible_set() {
    let state = AppState::new(fruit());
    assert_eq!(state.visible_count(), 4);

    let change = state.add_text_search(TextSearch::new("co-op")).expect("change");
    assert_eq!(change.action, Action::TextSearch { search: TextSearch::new("co-op") });
    assert_eq!(visible(&change.result), ["urn:apple"]);

    // searched fields include the multi-valued tags
    let organic = state.add_text_search(TextSearch::new("Organic")).expect("change").result;
    assert_eq!(visible(&organic), ["urn:apple", "urn:banana"]);

    let cleared = organic.add_text_search(TextSearch::new("")).expect("change").result;
    assert_eq!(cleared.visible_count(), 4);
}

#[test]
fn property_filters_match_values_and_list_members() {
    let state = AppState::new(fruit());
    let large = state
        .add_prop_equality(PropEquality::new("size", "sz:large"))
        .expect("change")
        .result;
    assert_eq!(visible(&large), ["urn:apple", "urn:date"]);

    let organic = large
        .add_prop_equality(PropEquality::new("tags", "organic"))
        .expect("change")
        .result;
    assert_eq!(visible(&organic), ["urn:apple"]);
    assert_eq!(organic.prop_filters().len(), 2);

    // a second filter on the same property replaces the first
    let small = organic
        .add_prop_equality(PropEquality::new("size", "sz:small"))
        .expect("change")
        .result;
    assert_eq!(visible(&small), ["urn:banana"]);
    assert_eq!(small.prop_filter("size").map(|f| f.value_required.to_key()), Some("sz:small".to_string()));

    let unfiltered_size = small.remove_prop_equality("size").expect("change").result;
    assert_eq!(visible(&unfiltered_size), ["urn:apple", "urn:banana"]);
    let unfiltered = small.remove_prop_equalities().expect("change").result;
    assert_eq!(unfiltered.visible_count(), 4);
}

#[test]
fn search_and_filters_combine() {
    let state = AppState::new(fruit())
        .add_text_search(TextSearch::new("local"))
        .expect("change")
        .result;
    assert_eq!(visible(&state), ["urn:apple", "urn:cherry"]);
    let narrowed = state
        .add_prop_equality(PropEquality::new("size", "sz:large"))
        .expect("change")
        .result;
    assert_eq!(visible(&narrowed), ["urn:apple"]);
    // filters are kept when the search changes
    let researched = narrowed
        .add_text_search(TextSearch::new("date"))
        .expect("change")
        .result;
    assert_eq!(visible(&researched), ["urn:date"]);

    let cleared = researched
        .remove_prop_equalities_and_clear_text_search()
        .expect("change");
    assert_eq!(cleared.action, Action::ClearPropEqualitiesAndTextSearch);
    assert_eq!(cleared.result, AppState::new(fruit()));
}

#[test]
fn restart_reapplies_search_and_filters() {
    let state = AppState::new(fruit())
        .add_prop_equality(PropEquality::new("tags", "organic"))
        .expect("change")
        .result;
    let mut more = fruit();
    more.push(build(json!({"uri": "urn:elder", "name": "Elderflower", "tags": ["organic"]})));
    let restarted = state.restart_state(more);
    assert_eq!(restarted.action, Action::Restart);
    assert_eq!(visible(&restarted.result), ["urn:apple", "urn:banana", "urn:elder"]);
    assert_eq!(restarted.result.all_initiatives().len(), 5);
}

#[test]
fn alternative_values_ignore_the_own_filter() {
    let state = AppState::new(fruit())
        .add_prop_equality(PropEquality::new("size", "sz:large"))
        .and_then(|c| c.result.add_prop_equality(PropEquality::new("tags", "organic")))
        .expect("changes")
        .result;
    let sizes: Vec<String> = state.alt_values("size").into_iter().collect();
    assert_eq!(sizes, ["sz:large", "sz:small"]);
    let tags: Vec<String> = state.alt_values("tags").into_iter().collect();
    assert_eq!(tags, ["local", "organic"]);

    let searched = state.add_text_search(TextSearch::new("banana")).expect("change").result;
    let sizes: Vec<String> = searched.alt_values("size").into_iter().collect();
    assert_eq!(sizes, ["sz:small"]);
}

#[test]
fn repeating_a_filter_adds_no_history() {
    let mut manager = StateManager::new(fruit());
    let filter = PropEquality::new("size", "sz:large");
    assert!(manager.prop_filter(filter.clone()));
    assert!(!manager.prop_filter(filter));
    assert_eq!(manager.history_len(), 2);
    assert_eq!(manager.current_state().visible_count(), 2);
}

#[test]
fn states_share_their_universe() {
    let all = fruit();
    let state = AppState::new(all.clone());
    let next = state.add_text_search(TextSearch::new("cherry")).expect("change").result;
    assert!(Arc::ptr_eq(&state.all_initiatives()[0], &next.all_initiatives()[0]));
    assert_eq!(state.all_initiatives().len(), all.len());
}
