//! Attribute search.
//!
//! Choosing a layer loads its schema (once per session), choosing a field
//! fixes the operators on offer, and submitting runs a single-predicate
//! filter against the layer. [`SearchForm`] tracks where the user is in that
//! flow; a newer layer choice invalidates anything still loading for an
//! older one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use map_common::{
    ComparisonOperator, Feature, FieldType, Layer, LayerFieldSchema, LayerId, LayerSchema,
    QueryError, QueryResult, SearchCriteria,
};
use ogc_protocol::exceptions::{looks_like_exception_report, parse_exception_report, summarize};
use ogc_protocol::{cql, DescribeFeatureTypeRequest, DescribeFeatureTypeResponse, GetFeatureRequest};
use projection::CrsRegistry;

use crate::client::{QueryKind, ServiceClient};
use crate::config::EngineConfig;
use crate::decoder::decode_feature_collection;
use crate::selection::Selection;
use crate::view::ViewFit;

/// Operators offered for text fields.
const TEXT_OPERATORS: [ComparisonOperator; 1] = [ComparisonOperator::Eq];

/// Session cache of layer schemas.
#[derive(Default)]
pub struct SchemaCache {
    schemas: RwLock<HashMap<LayerId, Arc<LayerSchema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, layer: &LayerId) -> Option<Arc<LayerSchema>> {
        let guard = self.schemas.read().await;
        let cached = guard.get(layer).cloned();
        if cached.is_some() {
            debug!(layer = %layer, "Schema cache hit");
        }
        cached
    }

    pub async fn insert(&self, schema: LayerSchema) -> Arc<LayerSchema> {
        let schema = Arc::new(schema);
        let mut guard = self.schemas.write().await;
        guard.insert(schema.layer.clone(), schema.clone());
        debug!(layer = %schema.layer, fields = schema.fields.len(), "Schema cached");
        schema
    }

    pub async fn clear(&self) {
        self.schemas.write().await.clear();
    }
}

/// Request and parse the schema of a layer.
#[instrument(skip(client), fields(layer = %layer))]
pub async fn load_schema(client: &ServiceClient, layer: &LayerId) -> QueryResult<LayerSchema> {
    let request = DescribeFeatureTypeRequest::new(layer.qualified());
    let response = client.describe_feature_type(&request).await?;

    if looks_like_exception_report(&response.body) {
        if let Ok(exceptions) = parse_exception_report(&String::from_utf8_lossy(&response.body)) {
            return Err(QueryError::Schema(summarize(&exceptions)));
        }
    }

    let description = DescribeFeatureTypeResponse::from_json(&response.body)
        .map_err(|e| QueryError::Schema(format!("unreadable schema document: {}", e)))?;
    let properties = description
        .first_properties()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| QueryError::Schema(format!("no properties described for {}", layer)))?;

    let schema = LayerSchema::from_properties(
        layer.clone(),
        properties
            .iter()
            .map(|p| (p.name.as_str(), p.type_token.as_str())),
    );
    if schema.fields.is_empty() {
        return Err(QueryError::Schema(format!(
            "{} has no searchable attributes",
            layer
        )));
    }
    Ok(schema)
}

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub layer: LayerId,
    pub field: String,
    pub operator: ComparisonOperator,
    pub value: String,
}

/// Build the filter for a request, validated against the layer schema.
pub fn build_filter(schema: &LayerSchema, request: &SearchRequest) -> QueryResult<String> {
    let field = schema.field(&request.field).ok_or_else(|| {
        QueryError::invalid_input(
            "field",
            format!("'{}' is not a searchable field of {}", request.field, schema.layer),
        )
    })?;
    Ok(cql::comparison(
        &field.name,
        field.field_type,
        request.operator,
        &request.value,
    )?)
}

/// Run a filter against a layer and decode the matches into the map CRS.
#[instrument(skip(client, crs_registry, config, layer), fields(layer = %layer.id))]
pub async fn run_search(
    client: &ServiceClient,
    crs_registry: &CrsRegistry,
    config: &EngineConfig,
    layer: &Layer,
    filter: &str,
) -> QueryResult<Vec<Feature>> {
    let output_crs = config.search_output_crs();
    let request = GetFeatureRequest::new(layer.id.qualified())
        .with_filter(filter)
        .with_srs(output_crs.clone());
    let response = client.get_feature(QueryKind::Search, &request).await?;
    let features = decode_feature_collection(
        &response.body,
        &layer.id,
        output_crs,
        &config.map_crs,
        crs_registry,
    )?;
    info!(filter = %filter, matches = features.len(), "Search finished");
    Ok(features)
}

/// Result of a search that reached the server.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Results {
        selection: Arc<Selection>,
        fit: Option<ViewFit>,
        /// False when a newer interaction replaced the selection first
        committed: bool,
    },
    /// The filter matched nothing; the selection was cleared
    NoResults {
        criteria: SearchCriteria,
        committed: bool,
    },
}

impl SearchOutcome {
    /// Short message for the user.
    pub fn message(&self) -> String {
        match self {
            SearchOutcome::Results { selection, .. } => {
                let summary = selection
                    .criteria
                    .as_ref()
                    .map(SearchCriteria::summary)
                    .unwrap_or_default();
                match selection.len() {
                    1 => format!("1 feature found for {}", summary),
                    n => format!("{} features found for {}", n, summary),
                }
            }
            SearchOutcome::NoResults { criteria, .. } => {
                format!("Nothing matched {}", criteria.summary())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SearchOutcome::NoResults { .. })
    }
}

/// Schema side of the form.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaPhase {
    Idle,
    Loading,
    FieldsReady(Arc<LayerSchema>),
    RasterBlocked { evidence: String },
    Failed { message: String },
}

/// Search side of the form.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPhase {
    Idle,
    FieldChosen,
    ValueEditing,
    Searching,
    Results(usize),
    NoResults,
    Failed { message: String },
}

/// State of the attribute search form.
#[derive(Debug, Clone)]
pub struct SearchForm {
    layer: Option<LayerId>,
    schema: SchemaPhase,
    field: Option<LayerFieldSchema>,
    operator: ComparisonOperator,
    value: String,
    phase: SearchPhase,
    generation: u64,
}

impl Default for SearchForm {
    fn default() -> Self {
        Self {
            layer: None,
            schema: SchemaPhase::Idle,
            field: None,
            operator: ComparisonOperator::Eq,
            value: String::new(),
            phase: SearchPhase::Idle,
            generation: 0,
        }
    }
}

impl SearchForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self) -> Option<&LayerId> {
        self.layer.as_ref()
    }

    pub fn schema_phase(&self) -> &SchemaPhase {
        &self.schema
    }

    pub fn phase(&self) -> &SearchPhase {
        &self.phase
    }

    pub fn field(&self) -> Option<&LayerFieldSchema> {
        self.field.as_ref()
    }

    pub fn operator(&self) -> ComparisonOperator {
        self.operator
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Searchable fields; empty unless the schema is loaded.
    pub fn fields(&self) -> &[LayerFieldSchema] {
        match &self.schema {
            SchemaPhase::FieldsReady(schema) => &schema.fields,
            _ => &[],
        }
    }

    /// Operators the chosen field allows.
    pub fn operators(&self) -> &'static [ComparisonOperator] {
        match self.field.as_ref().map(|f| f.field_type) {
            Some(FieldType::Number) => &ComparisonOperator::ALL,
            Some(FieldType::String) => &TEXT_OPERATORS,
            None => &[],
        }
    }

    /// Start over for a newly chosen layer. Returns the new generation.
    pub fn start_layer(&mut self, layer: LayerId) -> u64 {
        self.generation += 1;
        *self = Self {
            layer: Some(layer),
            schema: SchemaPhase::Loading,
            generation: self.generation,
            ..Self::default()
        };
        self.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, "Ignoring outdated search form update");
            return false;
        }
        true
    }

    pub fn schema_loaded(&mut self, generation: u64, schema: Arc<LayerSchema>) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.schema = SchemaPhase::FieldsReady(schema);
        true
    }

    pub fn raster_blocked(&mut self, generation: u64, evidence: String) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.schema = SchemaPhase::RasterBlocked { evidence };
        true
    }

    pub fn schema_failed(&mut self, generation: u64, message: String) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.schema = SchemaPhase::Failed { message };
        true
    }

    pub fn choose_field(&mut self, name: &str) -> QueryResult<&LayerFieldSchema> {
        let field = self
            .fields()
            .iter()
            .find(|f| f.name == name)
            .cloned()
            .ok_or_else(|| {
                QueryError::invalid_input("field", format!("'{}' is not available", name))
            })?;
        self.operator = ComparisonOperator::Eq;
        self.value.clear();
        self.phase = SearchPhase::FieldChosen;
        Ok(self.field.insert(field))
    }

    pub fn set_operator(&mut self, operator: ComparisonOperator) -> QueryResult<()> {
        if !self.operators().contains(&operator) {
            return Err(QueryError::invalid_input(
                "operator",
                format!("{} is not available for this field", operator.label()),
            ));
        }
        self.operator = operator;
        Ok(())
    }

    pub fn set_value(&mut self, value: impl Into<String>) -> QueryResult<()> {
        if self.field.is_none() {
            return Err(QueryError::invalid_input("field", "choose a field first"));
        }
        self.value = value.into();
        self.phase = SearchPhase::ValueEditing;
        Ok(())
    }

    /// The request the form currently describes.
    pub fn request(&self) -> QueryResult<SearchRequest> {
        let layer = self
            .layer
            .clone()
            .ok_or_else(|| QueryError::invalid_input("layer", "choose a layer first"))?;
        let field = self
            .field
            .as_ref()
            .ok_or_else(|| QueryError::invalid_input("field", "choose a field first"))?;
        if self.value.trim().is_empty() {
            return Err(QueryError::invalid_input("value", "enter a value"));
        }
        Ok(SearchRequest {
            layer,
            field: field.name.clone(),
            operator: self.operator,
            value: self.value.clone(),
        })
    }

    pub fn start_search(&mut self) -> QueryResult<(u64, SearchRequest)> {
        let request = self.request()?;
        self.phase = SearchPhase::Searching;
        Ok((self.generation, request))
    }

    pub fn search_finished(&mut self, generation: u64, phase: SearchPhase) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.phase = phase;
        true
    }

    /// Back to the initial state, e.g. after the user closes the form.
    pub fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::default()
        };
    }
}
