//! Value suggestions for text fields.
//!
//! Suggestions are the distinct values of a field that start with what the
//! user typed so far, matched case-insensitively by the server. Typing is
//! debounced: only the last prefix of a burst is fetched, and a result that
//! arrives after a newer prefix was scheduled is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use map_common::{LayerId, QueryResult};
use ogc_protocol::{cql, GetFeatureRequest};

use crate::client::{QueryKind, ServiceClient};
use crate::decoder::decode_property_values;
use crate::metrics;

/// Fetch the distinct values of `field` starting with `prefix`.
///
/// An empty prefix yields no suggestions and sends no request.
#[instrument(skip(client), fields(layer = %layer))]
pub async fn fetch_suggestions(
    client: &ServiceClient,
    layer: &LayerId,
    field: &str,
    prefix: &str,
    limit: u32,
) -> QueryResult<Vec<String>> {
    if prefix.is_empty() {
        return Ok(Vec::new());
    }
    let request = GetFeatureRequest::new(layer.qualified())
        .with_property(field)
        .with_max_features(limit)
        .with_filter(cql::prefix_match(field, prefix)?);
    let response = client.get_feature(QueryKind::Suggest, &request).await?;
    let values = decode_property_values(&response.body, field)?;
    debug!(prefix = %prefix, values = values.len(), "Suggestions fetched");
    Ok(values)
}

/// Latest suggestion list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Suggestions {
    pub layer: Option<LayerId>,
    pub field: String,
    pub prefix: String,
    /// Sorted, distinct
    pub values: Vec<String>,
}

/// Debounced suggestion fetcher.
pub struct Suggester {
    client: ServiceClient,
    debounce: Duration,
    limit: u32,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    tx: Arc<watch::Sender<Arc<Suggestions>>>,
}

impl Suggester {
    pub fn new(client: ServiceClient, debounce: Duration, limit: u32) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Suggestions::default()));
        Self {
            client,
            debounce,
            limit,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            tx: Arc::new(tx),
        }
    }

    pub fn current(&self) -> Arc<Suggestions> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Suggestions>> {
        self.tx.subscribe()
    }

    /// Schedule a fetch for `prefix`, replacing any fetch still waiting or
    /// in flight. Must be called from within a Tokio runtime.
    pub fn schedule(&self, layer: LayerId, field: String, prefix: String) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        if prefix.is_empty() {
            self.tx.send_replace(Arc::new(Suggestions {
                layer: Some(layer),
                field,
                prefix,
                values: Vec::new(),
            }));
            return;
        }

        let client = self.client.clone();
        let current = self.generation.clone();
        let tx = self.tx.clone();
        let debounce = self.debounce;
        let limit = self.limit;

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            let values = match fetch_suggestions(&client, &layer, &field, &prefix, limit).await {
                Ok(values) => values,
                Err(e) => {
                    warn!(layer = %layer, field = %field, error = %e, "Suggestion request failed");
                    Vec::new()
                }
            };

            let suggestions = Suggestions {
                layer: Some(layer),
                field,
                prefix,
                values,
            };
            let mut payload = Some(suggestions);
            let committed = tx.send_if_modified(|latest| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                match payload.take() {
                    Some(suggestions) => {
                        *latest = Arc::new(suggestions);
                        true
                    }
                    None => false,
                }
            });
            if !committed {
                debug!(generation, "Dropping suggestions for an outdated prefix");
                metrics::record_stale_commit();
            }
        }));
    }

    /// Drop any pending fetch without touching the current list.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }
}

impl Drop for Suggester {
    fn drop(&mut self) {
        self.cancel();
    }
}
