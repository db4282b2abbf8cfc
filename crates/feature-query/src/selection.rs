//! Selection state.
//!
//! The single owner of the currently selected features and the criteria of
//! the last attribute search. Readers get whole snapshots, so `features` and
//! `criteria` are always observed together. All writes go through the watch
//! channel's lock, one at a time.
//!
//! Every interaction that may change the selection takes an
//! [`InteractionToken`]. Starting an interaction supersedes all earlier ones,
//! and a result is only committed while its token is still the newest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use map_common::{Extent, Feature, SearchCriteria};

use crate::metrics;

/// A consistent snapshot of the selection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Selection {
    pub features: Vec<Feature>,
    /// `None` means no active filter, not an empty search result
    pub criteria: Option<SearchCriteria>,
    /// Incremented on every change
    pub revision: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Union of the selected features' extents.
    pub fn extent(&self) -> Option<Extent> {
        self.features
            .iter()
            .filter_map(Feature::extent)
            .reduce(|a, b| a.union(&b))
    }
}

/// Identifies one interaction (click, box, search).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InteractionToken(u64);

impl InteractionToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Owner of the selection.
#[derive(Debug)]
pub struct SelectionState {
    tx: watch::Sender<Arc<Selection>>,
    /// Only written inside the channel's modify closures
    interaction: AtomicU64,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Selection::default()));
        Self {
            tx,
            interaction: AtomicU64::new(0),
        }
    }

    /// Current selection.
    pub fn snapshot(&self) -> Arc<Selection> {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Selection>> {
        self.tx.subscribe()
    }

    /// Stream of selections, starting with the next change.
    pub fn updates(&self) -> impl Stream<Item = Arc<Selection>> {
        stream::unfold(self.subscribe(), |mut rx| async move {
            rx.changed().await.ok()?;
            let selection = rx.borrow_and_update().clone();
            Some((selection, rx))
        })
    }

    pub fn current_interaction(&self) -> InteractionToken {
        InteractionToken(self.interaction.load(Ordering::SeqCst))
    }

    /// Start an interaction, superseding any pending one.
    pub fn begin_interaction(&self) -> InteractionToken {
        let mut token = InteractionToken(0);
        self.tx.send_if_modified(|_| {
            token = InteractionToken(self.interaction.fetch_add(1, Ordering::SeqCst) + 1);
            false
        });
        debug!(interaction = token.0, "Interaction started");
        token
    }

    /// Start an interaction and clear the selection in the same step.
    pub fn begin_interaction_and_clear(&self) -> InteractionToken {
        let mut token = InteractionToken(0);
        self.tx.send_modify(|selection| {
            token = InteractionToken(self.interaction.fetch_add(1, Ordering::SeqCst) + 1);
            *selection = Arc::new(Selection {
                features: Vec::new(),
                criteria: None,
                revision: selection.revision + 1,
                updated_at: Some(Utc::now()),
            });
        });
        debug!(interaction = token.0, "Interaction started, selection cleared");
        token
    }

    /// Replace the selection if `token` is still the newest interaction.
    ///
    /// Returns `false` and leaves the selection untouched otherwise.
    pub fn commit(
        &self,
        token: InteractionToken,
        features: Vec<Feature>,
        criteria: Option<SearchCriteria>,
    ) -> bool {
        let mut payload = Some((features, criteria));
        let committed = self.tx.send_if_modified(|selection| {
            if self.interaction.load(Ordering::SeqCst) != token.0 {
                return false;
            }
            let Some((features, criteria)) = payload.take() else {
                return false;
            };
            *selection = Arc::new(Selection {
                features,
                criteria,
                revision: selection.revision + 1,
                updated_at: Some(Utc::now()),
            });
            true
        });

        if committed {
            let selection = self.snapshot();
            info!(
                interaction = token.0,
                features = selection.features.len(),
                has_criteria = selection.criteria.is_some(),
                revision = selection.revision,
                "Selection committed"
            );
        } else {
            debug!(
                interaction = token.0,
                current = self.current_interaction().0,
                "Dropping result of superseded interaction"
            );
            metrics::record_stale_commit();
        }
        committed
    }

    /// Explicit user clear. Also supersedes pending interactions.
    pub fn clear(&self) {
        self.begin_interaction_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::{CrsCode, FeatureGeometry, Geometry, LayerId, Properties};

    fn feature(x: f64) -> Feature {
        Feature {
            id: Some(format!("f.{}", x)),
            layer: LayerId::new("a", "b"),
            geometry: Some(FeatureGeometry {
                shape: Geometry::Point([x, x]),
                crs: CrsCode::web_mercator(),
            }),
            properties: Properties::new(),
        }
    }

    #[test]
    fn test_commit_with_current_token() {
        let state = SelectionState::new();
        let token = state.begin_interaction();
        assert!(state.commit(token, vec![feature(1.0)], None));

        let selection = state.snapshot();
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.revision, 1);
        assert!(selection.updated_at.is_some());
    }

    #[test]
    fn test_stale_token_is_rejected() {
        let state = SelectionState::new();
        let old = state.begin_interaction();
        let new = state.begin_interaction();
        assert!(new > old);

        assert!(!state.commit(old, vec![feature(1.0)], None));
        assert!(state.snapshot().is_empty());
        assert!(state.commit(new, vec![feature(2.0)], None));
        assert_eq!(state.snapshot().features[0].id.as_deref(), Some("f.2"));
    }

    #[test]
    fn test_clear_supersedes_pending() {
        let state = SelectionState::new();
        let token = state.begin_interaction();
        state.clear();
        assert!(!state.commit(token, vec![feature(1.0)], None));
        assert!(state.snapshot().is_empty());
    }

    #[test]
    fn test_begin_and_clear_empties_selection() {
        let state = SelectionState::new();
        let token = state.begin_interaction();
        state.commit(token, vec![feature(1.0), feature(3.0)], None);
        assert_eq!(state.snapshot().extent(), Some(Extent::new(1.0, 1.0, 3.0, 3.0)));

        state.begin_interaction_and_clear();
        assert!(state.snapshot().is_empty());
        assert!(state.snapshot().extent().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_commits() {
        let state = SelectionState::new();
        let mut rx = state.subscribe();
        let token = state.begin_interaction();
        state.commit(token, vec![feature(1.0)], None);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
