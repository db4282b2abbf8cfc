//! Request execution against the session's server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use map_common::{QueryError, QueryResult};
use ogc_protocol::{DescribeFeatureTypeRequest, GetFeatureInfoRequest, GetFeatureRequest, QueryParams};

use crate::metrics;
use crate::transport::{HttpRequest, HttpResponse, ServiceEndpoint, Transport};

/// What a request is for; used as the `kind` label in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Point,
    Box,
    Schema,
    Search,
    Suggest,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Point => "point",
            QueryKind::Box => "box",
            QueryKind::Schema => "schema",
            QueryKind::Search => "search",
            QueryKind::Suggest => "suggest",
        }
    }
}

/// Sends WMS/WFS requests with the session credential and a bounded wait.
#[derive(Clone)]
pub struct ServiceClient {
    transport: Arc<dyn Transport>,
    endpoint: ServiceEndpoint,
    timeout: Duration,
}

impl ServiceClient {
    pub fn new(transport: Arc<dyn Transport>, endpoint: ServiceEndpoint, timeout: Duration) -> Self {
        Self {
            transport,
            endpoint,
            timeout,
        }
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    pub async fn get_feature_info(
        &self,
        kind: QueryKind,
        request: &GetFeatureInfoRequest,
    ) -> QueryResult<HttpResponse> {
        self.send(kind, self.endpoint.wms_url(), request.to_params())
            .await
    }

    pub async fn get_feature(
        &self,
        kind: QueryKind,
        request: &GetFeatureRequest,
    ) -> QueryResult<HttpResponse> {
        self.send(kind, self.endpoint.wfs_url(), request.to_params())
            .await
    }

    pub async fn describe_feature_type(
        &self,
        request: &DescribeFeatureTypeRequest,
    ) -> QueryResult<HttpResponse> {
        self.send(QueryKind::Schema, self.endpoint.wfs_url(), request.to_params())
            .await
    }

    async fn send(
        &self,
        kind: QueryKind,
        url: String,
        params: QueryParams,
    ) -> QueryResult<HttpResponse> {
        let request = HttpRequest {
            url,
            params,
            credential: self.endpoint.credential.clone(),
        };
        debug!(kind = kind.as_str(), url = %request.url, params = ?request.params, "Sending request");

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.transport.get(&request)).await {
            Ok(Ok(response)) if response.is_success() => Ok(response),
            Ok(Ok(response)) => Err(QueryError::HttpStatus {
                status: response.status,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    kind = kind.as_str(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Request timed out"
                );
                Err(QueryError::Timeout)
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_request(kind.as_str(), outcome, start.elapsed());
        result
    }
}
