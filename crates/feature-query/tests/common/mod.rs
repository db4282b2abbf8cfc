//! Scripted transport and engine helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use feature_query::{
    EngineConfig, FeatureQueryEngine, HttpRequest, HttpResponse, ServiceEndpoint, Transport,
    ViewState,
};
use map_common::{CrsCode, LayerId, QueryError, QueryResult};

pub const BASE_URL: &str = "http://maps.test/geoserver";

/// What the mock answers to one request.
pub enum Reply {
    Respond(HttpResponse),
    Fail(QueryError),
    /// Never answers
    Hang,
}

type Responder = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

/// Transport answering from a closure and recording every request.
pub struct MockTransport {
    responder: Responder,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A transport that fails the test if it is ever called.
    pub fn unreachable() -> Arc<Self> {
        Self::new(|request| panic!("unexpected request to {}", request.url))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Layer (or feature type) each request was about, in order.
    pub fn queried_layers(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.param("QUERY_LAYERS").or_else(|| r.param("typeName")))
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, request: &HttpRequest) -> QueryResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match (self.responder)(request) {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(error) => Err(error),
            Reply::Hang => futures::future::pending().await,
        }
    }
}

pub fn json(body: impl Into<String>) -> Reply {
    Reply::Respond(HttpResponse::new(
        200,
        Some("application/json".to_string()),
        body.into(),
    ))
}

pub fn xml(body: impl Into<String>) -> Reply {
    Reply::Respond(HttpResponse::new(
        200,
        Some("text/xml".to_string()),
        body.into(),
    ))
}

pub fn status(code: u16) -> Reply {
    Reply::Respond(HttpResponse::new(code, None, "error"))
}

/// Value of the layer/type parameter of a request.
pub fn layer_of(request: &HttpRequest) -> &str {
    request
        .param("QUERY_LAYERS")
        .or_else(|| request.param("typeName"))
        .unwrap_or_default()
}

pub fn is_describe(request: &HttpRequest) -> bool {
    request.param("request") == Some("DescribeFeatureType")
}

pub fn engine(transport: Arc<MockTransport>) -> FeatureQueryEngine {
    engine_with(EngineConfig::default(), transport)
}

pub fn engine_with(config: EngineConfig, transport: Arc<MockTransport>) -> FeatureQueryEngine {
    FeatureQueryEngine::new(config, ServiceEndpoint::new(BASE_URL), transport).unwrap()
}

/// Web Mercator view at 10 m/px.
pub fn mercator_view() -> ViewState {
    ViewState::new(CrsCode::web_mercator(), 10.0, (800, 600))
}

/// Load the given layers and switch them on in order.
pub async fn load_visible(engine: &FeatureQueryEngine, layers: &[(&str, &str)]) {
    let descriptors: Vec<_> = layers
        .iter()
        .map(|(name, title)| test_utils::layer_descriptor(name, title))
        .collect();
    engine.load_layers(&descriptors).await;
    for (name, _) in layers {
        let id = LayerId::parse(name).unwrap();
        engine.set_layer_visible(&id, true).await.unwrap();
    }
}
