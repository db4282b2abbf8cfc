//! Selection state under concurrent interactions.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Barrier;

use feature_query::SelectionState;
use map_common::{
    ComparisonOperator, CrsCode, Feature, FeatureGeometry, Geometry, LayerId, Properties,
    SearchCriteria,
};

fn feature(id: &str) -> Feature {
    Feature {
        id: Some(id.to_string()),
        layer: LayerId::new("city", "parks"),
        geometry: Some(FeatureGeometry {
            shape: Geometry::Point([1.0, 2.0]),
            crs: CrsCode::web_mercator(),
        }),
        properties: Properties::new(),
    }
}

fn criteria() -> SearchCriteria {
    SearchCriteria {
        layer: LayerId::new("city", "parks"),
        layer_title: "Parks".into(),
        field: "area".into(),
        operator: ComparisonOperator::Ge,
        value: "1000".into(),
    }
}

#[tokio::test]
async fn test_late_result_of_older_interaction_is_dropped() {
    let state = Arc::new(SelectionState::new());
    let first = state.begin_interaction();
    let second = state.begin_interaction();

    // The newer interaction finishes first
    assert!(state.commit(second, vec![feature("new")], None));
    assert!(!state.commit(first, vec![feature("old")], Some(criteria())));

    let selection = state.snapshot();
    assert_eq!(selection.features[0].id.as_deref(), Some("new"));
    assert!(selection.criteria.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_keep_features_and_criteria_together() {
    let state = Arc::new(SelectionState::new());
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = Vec::new();
    for i in 0..8 {
        let state = state.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let token = state.begin_interaction();
            barrier.wait().await;
            if i % 2 == 0 {
                state.commit(token, vec![feature(&format!("search.{}", i))], Some(criteria()))
            } else {
                state.commit(token, vec![feature(&format!("click.{}", i))], None)
            }
        }));
    }

    let mut committed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            committed += 1;
        }
    }

    // Only the newest token can win
    assert!(committed <= 1);
    let selection = state.snapshot();
    if let Some(feature) = selection.features.first() {
        let id = feature.id.as_deref().unwrap();
        assert_eq!(id.starts_with("search."), selection.criteria.is_some());
    }
}

#[tokio::test]
async fn test_updates_stream_sees_each_change() {
    let state = SelectionState::new();
    let mut updates = Box::pin(state.updates());

    let token = state.begin_interaction();
    state.commit(token, vec![feature("a")], None);
    let first = updates.next().await.unwrap();
    assert_eq!(first.len(), 1);

    state.clear();
    let second = updates.next().await.unwrap();
    assert!(second.is_empty());
    assert!(second.revision > first.revision);
}

#[test]
fn test_snapshot_survives_later_changes() {
    let state = SelectionState::new();
    let token = state.begin_interaction();
    state.commit(token, vec![feature("a")], Some(criteria()));

    let before = state.snapshot();
    state.clear();

    assert_eq!(before.len(), 1);
    assert_eq!(before.criteria.as_ref().unwrap().summary(), "Parks: area greater than or equal to 1000");
    assert!(state.snapshot().is_empty());
}
