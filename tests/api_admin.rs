// tests/api_admin.rs
//
// Admin router via tower::ServiceExt::oneshot: health, source lifecycle,
// on-demand crawl, run history and top keywords.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::Router;
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{body, ScriptedFetcher, RSS};
use sentiment_ingest::{router, AppState, InMemoryStore, Orchestrator};

fn app() -> (Router, Arc<InMemoryStore>, Arc<ScriptedFetcher>) {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = ScriptedFetcher::new();
    let orch = Orchestrator::new(store.clone(), fetcher.clone(), common::fast_config());
    (router(AppState::new(orch)), store, fetcher)
}

async fn send(app: &Router, method: &str, uri: &str, payload: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match payload {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let res = app
        .clone()
        .oneshot(req.body(body).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn json_of(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("json body")
}

#[tokio::test]
async fn health_reflects_store_availability() {
    let (app, store, _) = app();
    let (status, bytes) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"ok");

    store.set_available(false);
    let (status, bytes) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_of(&bytes)["kind"], "persistence");
}

#[tokio::test]
async fn register_list_and_conflict() {
    let (app, _, _) = app();
    let new = json!({ "kind": "reddit", "subreddit": "r/Bitcoin" });

    let (status, bytes) = send(&app, "POST", "/sources", Some(new.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json_of(&bytes);
    assert_eq!(created["kind"]["subreddit"], "bitcoin");
    assert_eq!(created["crawl_interval_secs"], 3600);

    let (status, bytes) = send(&app, "POST", "/sources", Some(new)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json_of(&bytes)["error"]
        .as_str()
        .unwrap()
        .contains("reddit:bitcoin"));

    let (status, bytes) = send(&app, "GET", "/sources", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&bytes).as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_locator_is_bad_request() {
    let (app, _, _) = app();
    let (status, bytes) = send(
        &app,
        "POST",
        "/sources",
        Some(json!({ "kind": "rss", "feed_url": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&bytes)["kind"], "validation");
}

#[tokio::test]
async fn deactivate_and_reactivate() {
    let (app, store, _) = app();
    let src = common::add_source(&store, common::rss("https://coinnews.example.test/feed"), 0).await;

    let (status, bytes) = send(&app, "POST", &format!("/sources/{}/deactivate", src.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&bytes)["is_active"], false);

    let (status, bytes) = send(&app, "POST", &format!("/sources/{}/reactivate", src.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["is_active"], true);
    assert_eq!(v["consecutive_failures"], 0);

    let (status, _) = send(&app, "POST", "/sources/9999/deactivate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn discover_registers_advertised_feeds_once() {
    let (app, _, _) = app();
    let html = r#"<html><head>
        <link rel="alternate" type="application/rss+xml" href="/feed/">
        <link rel="alternate" type="application/atom+xml" href="https://chain.example.test/atom.xml">
        </head></html>"#;
    let req = json!({ "page_url": "https://coinnews.example.test/markets", "html": html });

    let (status, bytes) = send(&app, "POST", "/sources/discover", Some(req.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&bytes).as_array().unwrap().len(), 2);

    let (status, bytes) = send(&app, "POST", "/sources/discover", Some(req)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json_of(&bytes).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn crawl_then_runs_and_top_keywords() {
    let (app, store, fetcher) = app();
    let src = common::add_source(&store, common::rss("https://coinnews.example.test/feed"), 0).await;
    fetcher.set(&src.key(), body(RSS));

    let (status, bytes) = send(&app, "POST", "/crawl", None).await;
    assert_eq!(status, StatusCode::OK);
    let report = json_of(&bytes);
    let rss = report["types"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["source_type"] == "rss")
        .cloned()
        .unwrap();
    assert_eq!(rss["items_created"], 3);

    let (status, bytes) = send(&app, "GET", "/runs?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    let runs = json_of(&bytes);
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["items_created"], 3);

    let (status, bytes) = send(&app, "GET", "/keywords/top?limit=50", None).await;
    assert_eq!(status, StatusCode::OK);
    let top = json_of(&bytes);
    let terms: Vec<&str> = top
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["term"].as_str().unwrap())
        .collect();
    assert!(!terms.is_empty() && terms.len() <= 50);
    assert!(terms.contains(&"bitcoin"), "{terms:?}");
}
