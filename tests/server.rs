mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use mapdex::aggregator::AggregatedData;
use mapdex::config::MapConfig;
use mapdex::loader::DatasetLoader;
use mapdex::server::{AppContext, router};
use mapdex::services::DataServices;
use mapdex::sources::InMemoryLoader;
use mapdex::value::RawRecord;
use mapdex::vocab::VocabSource;

use common::{fruit_records, size_source};

const CONFIG: &str = r#"
languages = ["en"]
searched_fields = ["name", "tags"]
filterable_fields = ["size", "tags"]

[[properties]]
name = "size"
type = "vocab"
uri = "sz:"

[[properties]]
name = "tags"
type = "multi"
of = { type = "value", as = "string" }
"#;

async fn context() -> Arc<AppContext> {
    let config = MapConfig::from_toml_str(CONFIG).expect("valid config");
    let datasets: Vec<Arc<dyn DatasetLoader<RawRecord>>> =
        vec![Arc::new(InMemoryLoader::new("fruit", fruit_records()))];
    let vocabs: Vec<Arc<dyn DatasetLoader<VocabSource>>> =
        vec![Arc::new(InMemoryLoader::new("sizes", vec![size_source()]))];
    let services = Arc::new(DataServices::with_loaders(config, datasets, vocabs).expect("services"));
    services.load_data().await.expect("load");
    Arc::new(AppContext::new(services).expect("context"))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn visible(state: &Value) -> Vec<&str> {
    state["visible"]
        .as_array()
        .expect("visible list")
        .iter()
        .filter_map(Value::as_str)
        .collect()
}

#[tokio::test]
async fn search_returns_summaries() {
    let app = router(context().await);
    let (status, found) = send(&app, Method::GET, "/v1/initiatives?search=co-op", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        found,
        json!([{"uri": "urn:apple", "name": "Apple Co-op", "dataset": "fruit"}])
    );

    let (_, everything) = send(&app, Method::GET, "/v1/initiatives", None).await;
    assert_eq!(everything.as_array().expect("list").len(), 4);
}

#[tokio::test]
async fn filtering_then_going_back() {
    let app = router(context().await);
    let (status, state) = send(&app, Method::GET, "/v1/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visible(&state), ["urn:apple", "urn:banana", "urn:cherry", "urn:date"]);
    assert_eq!(state["can_go_back"], json!(false));

    let filter = json!({"action": "prop_filter", "prop_name": "tags", "value_required": "organic"});
    let (status, state) = send(&app, Method::POST, "/v1/state", Some(filter.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["changed"], json!(true));
    assert_eq!(visible(&state), ["urn:apple", "urn:banana"]);
    assert_eq!(state["filters"], json!([{"prop_name": "tags", "value_required": "organic"}]));
    assert_eq!(state["can_go_back"], json!(true));

    let (_, state) = send(&app, Method::POST, "/v1/state", Some(filter)).await;
    assert_eq!(state["changed"], json!(false));

    let (_, state) = send(&app, Method::POST, "/v1/state", Some(json!({"action": "back"}))).await;
    assert_eq!(state["changed"], json!(true));
    assert_eq!(visible(&state).len(), 4);
    assert_eq!(state["can_go_forward"], json!(true));

    // already at the start of history
    let (_, state) = send(&app, Method::POST, "/v1/state", Some(json!({"action": "back"}))).await;
    assert_eq!(state["changed"], json!(false));

    let (_, state) = send(&app, Method::POST, "/v1/state", Some(json!({"action": "forward"}))).await;
    assert_eq!(state["changed"], json!(true));
    assert_eq!(visible(&state), ["urn:apple", "urn:banana"]);

    let search = json!({"action": "text_search", "search": "bunch"});
    let (_, state) = send(&app, Method::POST, "/v1/state", Some(search)).await;
    assert_eq!(visible(&state), ["urn:banana"]);
    assert_eq!(state["search"], json!("bunch"));

    let (_, state) = send(&app, Method::POST, "/v1/state", Some(json!({"action": "clear_all"}))).await;
    assert_eq!(visible(&state).len(), 4);
}

#[tokio::test]
async fn unknown_actions_and_properties_are_rejected() {
    let app = router(context().await);
    let (status, _) = send(&app, Method::POST, "/v1/state", Some(json!({"action": "jump"}))).await;
    assert!(status.is_client_error());

    let (status, body) = send(&app, Method::GET, "/v1/values/colour", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().expect("error message").contains("colour"));

    let (status, values) = send(&app, Method::GET, "/v1/values/tags", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(values, json!(["local", "organic"]));
}

#[tokio::test]
async fn reload_reseeds_the_state_manager() {
    let context = context().await;
    let app = router(Arc::clone(&context));
    let filter = json!({"action": "prop_filter", "prop_name": "tags", "value_required": "local"});
    send(&app, Method::POST, "/v1/state", Some(filter)).await;
    let before = context.services.aggregated_data().expect("data");

    let (status, reloaded) = send(&app, Method::POST, "/v1/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reloaded, json!({"published": true, "generation": 2, "initiatives": 4}));

    let after = context.services.aggregated_data().expect("data");
    assert!(!Arc::ptr_eq(&before, &after));
    let (_, state) = send(&app, Method::GET, "/v1/state", None).await;
    // history is gone, the filter survives over the new initiatives
    assert_eq!(state["can_go_back"], json!(false));
    assert_eq!(visible(&state), ["urn:apple", "urn:cherry"]);
    let manager = context.manager.lock().unwrap();
    assert!(Arc::ptr_eq(
        &manager.current_state().all_initiatives()[0],
        &after.loaded_initiatives[0]
    ));
}

#[tokio::test]
async fn a_superseded_aggregate_is_not_seeded() {
    let context = context().await;
    let stale = Arc::new(AggregatedData::default());
    assert!(!context.reseed(&stale).expect("reseed"));
    assert_eq!(context.manager.lock().unwrap().current_state().all_initiatives().len(), 4);

    let current = context.services.aggregated_data().expect("data");
    assert!(context.reseed(&current).expect("reseed"));
}
