//! Point (click) query behaviour through the engine.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{engine, engine_with, json, layer_of, load_visible, mercator_view, status, MockTransport, Reply};
use feature_query::{EngineConfig, ViewState};
use map_common::{CrsCode, QueryError};
use test_utils::{empty_collection, feature_collection, polygon_feature};

const CLICK: (f64, f64) = (1000.0, 2000.0);

fn polygon_around_click(id: &str) -> String {
    feature_collection(vec![polygon_feature(
        id,
        (900.0, 1900.0, 1100.0, 2100.0),
        json!({ "name": id }),
    )])
}

// ============================================================================
// Empty inputs
// ============================================================================

#[tokio::test]
async fn test_no_visible_layers_issues_no_request() {
    let transport = MockTransport::unreachable();
    let engine = engine(transport.clone());
    engine.load_layers(&[test_utils::layer_descriptor("city:parks", "Parks")]).await;

    let resolution = engine.resolve_point(CLICK, &mercator_view()).await.unwrap();

    assert!(resolution.selection.is_empty());
    assert!(resolution.selection.criteria.is_none());
    assert!(resolution.fit.is_none());
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_missing_resolution_aborts_without_request() {
    let transport = MockTransport::unreachable();
    let engine = engine(transport.clone());
    load_visible(&engine, &[("city:parks", "Parks")]).await;

    let view = ViewState {
        resolution: None,
        crs: CrsCode::web_mercator(),
        viewport: Some((800, 600)),
    };
    let result = engine.resolve_point(CLICK, &view).await;

    assert!(matches!(result, Err(QueryError::MissingResolution)));
    assert_eq!(transport.request_count(), 0);
}

// ============================================================================
// First hit wins
// ============================================================================

#[tokio::test]
async fn test_first_layer_with_a_feature_wins() {
    let transport = MockTransport::new(|request| match layer_of(request) {
        "city:parks" => json(polygon_around_click("parks.1")),
        "city:roads" => json(polygon_around_click("roads.7")),
        other => panic!("unexpected layer {}", other),
    });
    let engine = engine(transport.clone());
    load_visible(&engine, &[("city:parks", "Parks"), ("city:roads", "Roads")]).await;

    let resolution = engine.resolve_point(CLICK, &mercator_view()).await.unwrap();

    assert!(resolution.committed);
    assert_eq!(resolution.selection.len(), 1);
    assert_eq!(resolution.selection.features[0].id.as_deref(), Some("parks.1"));
    assert!(resolution.selection.criteria.is_none());
    assert_eq!(transport.queried_layers(), vec!["city:parks"]);
}

#[tokio::test]
async fn test_park_hit_with_roads_empty() {
    let transport = MockTransport::new(|request| match layer_of(request) {
        "city:parks" => json(polygon_around_click("parks.3")),
        _ => json(empty_collection()),
    });
    let engine = engine(transport.clone());
    load_visible(&engine, &[("city:roads", "Roads"), ("city:parks", "Parks")]).await;

    let resolution = engine.resolve_point(CLICK, &mercator_view()).await.unwrap();

    assert_eq!(resolution.selection.len(), 1);
    assert_eq!(resolution.selection.features[0].layer.qualified(), "city:parks");
    assert!(resolution.selection.criteria.is_none());
    assert!(resolution.highlight.is_some());
    assert!(resolution.fit.is_some());
    assert_eq!(transport.queried_layers(), vec!["city:roads", "city:parks"]);
}

#[tokio::test]
async fn test_priority_follows_activation_order() {
    let transport = MockTransport::new(|request| json(polygon_around_click(layer_of(request))));
    let engine = engine(transport.clone());
    load_visible(&engine, &[("city:parks", "Parks"), ("city:roads", "Roads")]).await;

    let roads = map_common::LayerId::new("city", "roads");
    engine.toggle_layer(&roads).await.unwrap();
    engine.toggle_layer(&roads).await.unwrap();

    let resolution = engine.resolve_point(CLICK, &mercator_view()).await.unwrap();
    assert_eq!(resolution.selection.features[0].id.as_deref(), Some("city:parks"));

    let parks = map_common::LayerId::new("city", "parks");
    engine.toggle_layer(&parks).await.unwrap();
    engine.toggle_layer(&parks).await.unwrap();

    let resolution = engine.resolve_point(CLICK, &mercator_view()).await.unwrap();
    assert_eq!(resolution.selection.features[0].id.as_deref(), Some("city:roads"));
}

// ============================================================================
// Request shape
// ============================================================================

#[tokio::test]
async fn test_point_request_parameters() {
    let transport = MockTransport::new(|_| json(empty_collection()));
    let engine = engine(transport.clone());
    load_visible(&engine, &[("city:parks", "Parks")]).await;

    engine.resolve_point(CLICK, &mercator_view()).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.url, format!("{}/wms", common::BASE_URL));
    assert_eq!(request.param("REQUEST"), Some("GetFeatureInfo"));
    assert_eq!(request.param("INFO_FORMAT"), Some("application/json"));
    assert_eq!(request.param("FEATURE_COUNT"), Some("1"));
    assert_eq!(request.param("BUFFER"), Some("8"));
    assert_eq!(request.param("SRS"), Some("EPSG:3857"));
    assert_eq!(request.param("WIDTH"), Some("256"));
    assert_eq!(request.param("X"), Some("128"));
    assert_eq!(request.param("BBOX"), Some("-280,720,2280,3280"));
}

// ============================================================================
// Failures and clearing
// ============================================================================

#[tokio::test]
async fn test_failing_layer_is_skipped() {
    let transport = MockTransport::new(|request| match layer_of(request) {
        "city:broken" => status(500),
        "city:garbage" => json("<html>not json</html>"),
        _ => json(polygon_around_click("parks.1")),
    });
    let engine = engine(transport.clone());
    load_visible(
        &engine,
        &[("city:broken", "Broken"), ("city:garbage", "Garbage"), ("city:parks", "Parks")],
    )
    .await;

    let resolution = engine.resolve_point(CLICK, &mercator_view()).await.unwrap();

    assert_eq!(resolution.selection.len(), 1);
    assert_eq!(resolution.failures.len(), 2);
    assert!(matches!(resolution.failures[0].error, QueryError::HttpStatus { status: 500 }));
    assert!(matches!(resolution.failures[1].error, QueryError::Decode(_)));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_layer_times_out_and_is_skipped() {
    let transport = MockTransport::new(|request| match layer_of(request) {
        "city:slow" => Reply::Hang,
        _ => json(polygon_around_click("parks.1")),
    });
    let config = EngineConfig {
        request_timeout_secs: 2,
        ..EngineConfig::default()
    };
    let engine = engine_with(config, transport.clone());
    load_visible(&engine, &[("city:slow", "Slow"), ("city:parks", "Parks")]).await;

    let started = tokio::time::Instant::now();
    let resolution = engine.resolve_point(CLICK, &mercator_view()).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(resolution.selection.len(), 1);
    assert_eq!(resolution.failures.len(), 1);
    assert!(matches!(resolution.failures[0].error, QueryError::Timeout));
}

#[tokio::test]
async fn test_miss_clears_previous_selection() {
    let transport = MockTransport::new(|request| {
        let x: f64 = request
            .param("BBOX")
            .and_then(|b| b.split(',').next())
            .and_then(|x| x.parse().ok())
            .unwrap_or_default();
        if x < 0.0 {
            json(polygon_around_click("parks.1"))
        } else {
            json(empty_collection())
        }
    });
    let engine = engine(transport.clone());
    load_visible(&engine, &[("city:parks", "Parks")]).await;

    let first = engine.resolve_point(CLICK, &mercator_view()).await.unwrap();
    assert_eq!(first.selection.len(), 1);

    let second = engine
        .resolve_point((50_000.0, 50_000.0), &mercator_view())
        .await
        .unwrap();
    assert!(second.committed);
    assert!(second.selection.is_empty());
    assert!(engine.selection().snapshot().is_empty());
}

#[tokio::test]
async fn test_transport_error_is_layer_local() {
    let transport = MockTransport::new(|_| Reply::Fail(QueryError::Transport("connection refused".into())));
    let engine = engine(transport.clone());
    load_visible(&engine, &[("city:parks", "Parks"), ("city:roads", "Roads")]).await;

    let resolution = engine.resolve_point(CLICK, &mercator_view()).await.unwrap();

    assert!(resolution.selection.is_empty());
    assert_eq!(resolution.failures.len(), 2);
    assert_eq!(transport.request_count(), 2);
}
