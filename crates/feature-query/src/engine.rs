//! Engine facade.
//!
//! Owns the session: layer registry, selection state, schema cache, search
//! form and suggestion fetcher. Presentation code talks to the engine and
//! observes the selection; it never writes the selection itself.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{info, instrument, warn};

use map_common::{
    ComparisonOperator, Extent, Feature, FieldType, Layer, LayerDescriptor, LayerFieldSchema,
    LayerId, LayerSchema, QueryError, QueryResult, SearchCriteria,
};
use projection::CrsRegistry;

use crate::box_query;
use crate::client::ServiceClient;
use crate::config::EngineConfig;
use crate::point;
use crate::raster::classify_layer;
use crate::registry::LayerRegistry;
use crate::search::{
    build_filter, load_schema, run_search, SchemaCache, SearchForm, SearchOutcome, SearchPhase,
    SearchRequest,
};
use crate::selection::{InteractionToken, Selection, SelectionState};
use crate::suggest::{fetch_suggestions, Suggester, Suggestions};
use crate::transport::{ReqwestTransport, ServiceEndpoint, Transport};
use crate::view::{ViewFit, ViewState};
use crate::LayerFailure;

/// Outcome of a point or box interaction.
#[derive(Debug)]
pub struct Resolution {
    /// Selection after the interaction finished
    pub selection: Arc<Selection>,
    /// False when a newer interaction superseded this one
    pub committed: bool,
    /// Suggested view fit; applying it is up to the caller
    pub fit: Option<ViewFit>,
    /// Feature to highlight (point queries only)
    pub highlight: Option<Feature>,
    /// Layers that failed and contributed nothing
    pub failures: Vec<LayerFailure>,
}

pub struct FeatureQueryEngine {
    config: EngineConfig,
    client: ServiceClient,
    crs_registry: Arc<CrsRegistry>,
    layers: RwLock<LayerRegistry>,
    selection: Arc<SelectionState>,
    schemas: SchemaCache,
    form: Mutex<SearchForm>,
    suggester: Suggester,
}

impl FeatureQueryEngine {
    pub fn new(
        config: EngineConfig,
        endpoint: ServiceEndpoint,
        transport: Arc<dyn Transport>,
    ) -> QueryResult<Self> {
        config.validate()?;
        info!(
            base_url = %endpoint.base_url,
            map_crs = %config.map_crs,
            wms_version = config.wms_version.as_str(),
            "Feature query engine ready"
        );

        let crs_registry = Arc::new(config.build_crs_registry());
        let client = ServiceClient::new(transport, endpoint, config.request_timeout());
        let suggester = Suggester::new(
            client.clone(),
            config.suggest_debounce(),
            config.search.suggestion_limit,
        );

        Ok(Self {
            config,
            client,
            crs_registry,
            layers: RwLock::new(LayerRegistry::default()),
            selection: Arc::new(SelectionState::new()),
            schemas: SchemaCache::new(),
            form: Mutex::new(SearchForm::new()),
            suggester,
        })
    }

    /// Engine talking HTTP through reqwest.
    pub fn with_http(config: EngineConfig, endpoint: ServiceEndpoint) -> QueryResult<Self> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Self::new(config, endpoint, Arc::new(transport))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn crs_registry(&self) -> &Arc<CrsRegistry> {
        &self.crs_registry
    }

    // ---- Layers ----

    /// Start a session from the capabilities collaborator's layer list.
    ///
    /// Everything tied to the previous session is dropped: selection, cached
    /// schemas, the search form and pending suggestions.
    pub async fn load_layers(&self, descriptors: &[LayerDescriptor]) -> usize {
        let registry = LayerRegistry::from_descriptors(descriptors, &self.config.preferred_crs);
        let count = registry.len();
        *self.layers.write().await = registry;

        self.suggester.cancel();
        self.schemas.clear().await;
        self.form.lock().await.reset();
        self.selection.clear();
        info!(layers = count, "Layers loaded");
        count
    }

    pub async fn layers(&self) -> Vec<Layer> {
        self.layers.read().await.layers().to_vec()
    }

    pub async fn layer(&self, id: &LayerId) -> QueryResult<Layer> {
        self.layers.read().await.require(id).cloned()
    }

    /// Visible layers in query priority order.
    pub async fn visible_layers(&self) -> Vec<Layer> {
        self.layers.read().await.visible_layers()
    }

    pub async fn set_layer_visible(&self, id: &LayerId, visible: bool) -> QueryResult<()> {
        self.layers.write().await.set_visible(id, visible)
    }

    pub async fn toggle_layer(&self, id: &LayerId) -> QueryResult<bool> {
        self.layers.write().await.toggle(id)
    }

    pub async fn workspaces(&self) -> Vec<String> {
        self.layers.read().await.workspaces().to_vec()
    }

    pub async fn select_workspaces<I, S>(&self, workspaces: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.layers.write().await.select_workspaces(workspaces);
    }

    pub async fn select_all_workspaces(&self) {
        self.layers.write().await.select_all_workspaces();
    }

    /// Layers of the selected workspaces.
    pub async fn filtered_layers(&self) -> Vec<Layer> {
        self.layers
            .read()
            .await
            .filtered_layers()
            .into_iter()
            .cloned()
            .collect()
    }

    // ---- Selection ----

    pub fn selection(&self) -> &Arc<SelectionState> {
        &self.selection
    }

    pub fn clear_selection(&self) {
        self.selection.clear();
    }

    // ---- Point and box queries ----

    /// Resolve a click against the visible layers.
    pub async fn resolve_point(
        &self,
        coordinate: (f64, f64),
        view: &ViewState,
    ) -> QueryResult<Resolution> {
        let layers = self.visible_layers().await;
        self.resolve_point_in(coordinate, view, &layers).await
    }

    /// Resolve a click against an explicit, ordered layer list.
    ///
    /// The first layer answering with a feature replaces the selection; no
    /// hit clears it.
    #[instrument(skip(self, view, layers), fields(layers = layers.len()))]
    pub async fn resolve_point_in(
        &self,
        coordinate: (f64, f64),
        view: &ViewState,
        layers: &[Layer],
    ) -> QueryResult<Resolution> {
        let token = self.selection.begin_interaction();
        let result = point::resolve_point(
            &self.client,
            &self.crs_registry,
            &self.config,
            coordinate,
            view,
            layers,
        )
        .await?;

        let (features, fit, highlight) = match result.hit {
            Some(hit) => {
                let fit = ViewFit::for_feature(&hit.feature, &self.config.fit);
                (vec![hit.feature], fit, hit.highlight)
            }
            None => (Vec::new(), None, None),
        };
        let committed = self.selection.commit(token, features, None);

        Ok(Resolution {
            selection: self.selection.snapshot(),
            committed,
            fit,
            highlight,
            failures: result.failures,
        })
    }

    /// Start a box interaction. Clears the selection before anything is
    /// requested.
    pub fn begin_box(&self) -> InteractionToken {
        self.selection.begin_interaction_and_clear()
    }

    /// Resolve a finished box against the visible layers.
    pub async fn resolve_box(
        &self,
        token: InteractionToken,
        extent: &Extent,
        view: &ViewState,
    ) -> QueryResult<Resolution> {
        let layers = self.visible_layers().await;
        self.resolve_box_in(token, extent, view, &layers).await
    }

    #[instrument(skip(self, view, layers), fields(interaction = token.value(), layers = layers.len()))]
    pub async fn resolve_box_in(
        &self,
        token: InteractionToken,
        extent: &Extent,
        view: &ViewState,
        layers: &[Layer],
    ) -> QueryResult<Resolution> {
        let result = box_query::resolve_box(
            &self.client,
            &self.crs_registry,
            &self.config,
            extent,
            view,
            layers,
        )
        .await?;

        let fit = ViewFit::for_features(&result.features, &self.config.fit);
        let committed = self.selection.commit(token, result.features, None);

        Ok(Resolution {
            selection: self.selection.snapshot(),
            committed,
            fit,
            highlight: None,
            failures: result.failures,
        })
    }

    /// Begin and resolve a box in one call.
    pub async fn select_box(&self, extent: &Extent, view: &ViewState) -> QueryResult<Resolution> {
        let token = self.begin_box();
        self.resolve_box(token, extent, view).await
    }

    // ---- Attribute search ----

    async fn schema_for(&self, layer: &LayerId) -> QueryResult<Arc<LayerSchema>> {
        if let Some(schema) = self.schemas.get(layer).await {
            return Ok(schema);
        }
        let schema = load_schema(&self.client, layer).await?;
        Ok(self.schemas.insert(schema).await)
    }

    fn raster_check(&self, layer: &Layer) -> QueryResult<()> {
        let classification = classify_layer(layer, &self.config.search.raster_token);
        if classification.is_raster {
            let evidence = classification.evidence.unwrap_or_default();
            info!(layer = %layer.id, evidence = %evidence, "Search disabled for raster layer");
            return Err(QueryError::RasterUnsupported {
                layer: layer.id.qualified(),
                evidence,
            });
        }
        Ok(())
    }

    /// Current state of the search form.
    pub async fn search_form(&self) -> SearchForm {
        self.form.lock().await.clone()
    }

    /// Choose the layer to search. Loads its schema unless it is a raster
    /// layer, in which case nothing is requested.
    #[instrument(skip(self), fields(layer = %layer_id))]
    pub async fn choose_search_layer(&self, layer_id: &LayerId) -> QueryResult<Arc<LayerSchema>> {
        let layer = self.layer(layer_id).await?;
        let generation = self.form.lock().await.start_layer(layer.id.clone());
        self.suggester.cancel();

        if let Err(e) = self.raster_check(&layer) {
            if let QueryError::RasterUnsupported { evidence, .. } = &e {
                self.form
                    .lock()
                    .await
                    .raster_blocked(generation, evidence.clone());
            }
            return Err(e);
        }

        match self.schema_for(&layer.id).await {
            Ok(schema) => {
                self.form
                    .lock()
                    .await
                    .schema_loaded(generation, schema.clone());
                Ok(schema)
            }
            Err(e) => {
                warn!(error = %e, "Schema load failed");
                self.form
                    .lock()
                    .await
                    .schema_failed(generation, e.user_message());
                Err(e)
            }
        }
    }

    /// Choose the field to search; returns it with its type.
    pub async fn choose_search_field(&self, name: &str) -> QueryResult<LayerFieldSchema> {
        let field = self.form.lock().await.choose_field(name)?.clone();
        self.suggester.cancel();
        Ok(field)
    }

    pub async fn set_search_operator(&self, operator: ComparisonOperator) -> QueryResult<()> {
        self.form.lock().await.set_operator(operator)
    }

    /// Update the value being typed. For text fields this (re)schedules the
    /// suggestion fetch.
    pub async fn set_search_value(&self, value: &str) -> QueryResult<()> {
        let mut form = self.form.lock().await;
        form.set_value(value)?;

        let text_field = form
            .field()
            .filter(|f| f.field_type == FieldType::String)
            .map(|f| f.name.clone());
        if let (Some(field), Some(layer)) = (text_field, form.layer().cloned()) {
            self.suggester.schedule(layer, field, value.to_string());
        }
        Ok(())
    }

    /// Run the search the form describes.
    pub async fn submit_search(&self) -> QueryResult<SearchOutcome> {
        let (generation, request) = self.form.lock().await.start_search()?;
        self.suggester.cancel();

        let result = self.search(request).await;
        let phase = match &result {
            Ok(SearchOutcome::Results { selection, .. }) => SearchPhase::Results(selection.len()),
            Ok(SearchOutcome::NoResults { .. }) => SearchPhase::NoResults,
            Err(e) => SearchPhase::Failed {
                message: e.user_message(),
            },
        };
        self.form.lock().await.search_finished(generation, phase);
        result
    }

    /// Run a single-predicate search and commit its matches.
    ///
    /// No matches clears the selection's features but keeps the criteria, so
    /// "nothing matched" stays distinguishable from "no filter". A failed
    /// request leaves the selection as it was.
    #[instrument(skip(self), fields(layer = %request.layer, field = %request.field))]
    pub async fn search(&self, request: SearchRequest) -> QueryResult<SearchOutcome> {
        let layer = self.layer(&request.layer).await?;
        self.raster_check(&layer)?;
        let schema = self.schema_for(&layer.id).await?;
        let filter = build_filter(&schema, &request)?;

        let token = self.selection.begin_interaction();
        let features = run_search(
            &self.client,
            &self.crs_registry,
            &self.config,
            &layer,
            &filter,
        )
        .await?;

        let criteria = SearchCriteria {
            layer: layer.id.clone(),
            layer_title: layer.display_title().to_string(),
            field: request.field,
            operator: request.operator,
            value: request.value,
        };

        if features.is_empty() {
            let committed = self
                .selection
                .commit(token, Vec::new(), Some(criteria.clone()));
            return Ok(SearchOutcome::NoResults { criteria, committed });
        }

        let fit = ViewFit::for_features(&features, &self.config.fit);
        let committed = self.selection.commit(token, features, Some(criteria));
        Ok(SearchOutcome::Results {
            selection: self.selection.snapshot(),
            fit,
            committed,
        })
    }

    // ---- Suggestions ----

    /// Fetch suggestions immediately, without debouncing.
    pub async fn suggest(
        &self,
        layer: &LayerId,
        field: &str,
        prefix: &str,
    ) -> QueryResult<Vec<String>> {
        self.layer(layer).await?;
        fetch_suggestions(
            &self.client,
            layer,
            field,
            prefix,
            self.config.search.suggestion_limit,
        )
        .await
    }

    /// Schedule a debounced fetch; the result arrives on [`Self::suggestions`].
    pub fn suggest_debounced(&self, layer: LayerId, field: String, prefix: String) {
        self.suggester.schedule(layer, field, prefix);
    }

    pub fn suggestions(&self) -> watch::Receiver<Arc<Suggestions>> {
        self.suggester.subscribe()
    }

    pub fn current_suggestions(&self) -> Arc<Suggestions> {
        self.suggester.current()
    }
}
