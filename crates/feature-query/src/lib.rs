//! Spatial feature query and selection engine.
//!
//! Turns map interactions into ordered WMS/WFS requests and keeps the
//! resulting selection:
//!
//! - point clicks ask the visible layers one by one, first hit wins
//! - box drags are split per world copy and post-filtered by geometry
//! - attribute searches run a single-predicate CQL filter, with debounced
//!   value suggestions for text fields
//!
//! [`FeatureQueryEngine`] ties these together; the resolver functions are
//! public for callers that manage their own state.

pub mod box_query;
pub mod client;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod metrics;
pub mod point;
pub mod raster;
pub mod registry;
pub mod search;
pub mod selection;
pub mod suggest;
pub mod transport;
pub mod view;

use map_common::{LayerId, QueryError};

pub use box_query::{world_copies, BoxResult, WorldCopy};
pub use client::{QueryKind, ServiceClient};
pub use config::EngineConfig;
pub use engine::{FeatureQueryEngine, Resolution};
pub use point::{PointHit, PointResult};
pub use raster::{classify_layer, RasterClassification};
pub use registry::LayerRegistry;
pub use search::{SchemaPhase, SearchForm, SearchOutcome, SearchPhase, SearchRequest};
pub use selection::{InteractionToken, Selection, SelectionState};
pub use suggest::{Suggester, Suggestions};
pub use transport::{Credential, HttpRequest, HttpResponse, ReqwestTransport, ServiceEndpoint, Transport};
pub use view::{FitOptions, ViewFit, ViewState};

/// A layer that failed during a multi-layer query and was skipped.
#[derive(Debug)]
pub struct LayerFailure {
    pub layer: LayerId,
    pub error: QueryError,
}
