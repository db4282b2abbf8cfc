//! Error types for feature query operations.

use thiserror::Error;

use crate::crs::CrsParseError;
use crate::extent::ExtentParseError;

/// Result type alias using QueryError.
pub type QueryResult<T> = Result<T, QueryError>;

/// Primary error type for query operations.
///
/// An empty but well-formed answer is not an error; resolvers report it as an
/// outcome of its own.
#[derive(Debug, Error)]
pub enum QueryError {
    // === Transport Errors ===
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Server answered with HTTP {status}")]
    HttpStatus { status: u16 },

    // === Response Errors ===
    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Invalid schema document: {0}")]
    Schema(String),

    // === Policy Errors ===
    #[error("Layer {layer} looks like a raster layer (matched '{evidence}')")]
    RasterUnsupported { layer: String, evidence: String },

    // === Input Errors ===
    #[error("Invalid input for '{field}': {message}")]
    InvalidInput { field: String, message: String },

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    #[error("Map view has no resolution")]
    MissingResolution,
}

impl QueryError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Short, actionable message suitable for showing to the user.
    ///
    /// Never contains response bodies or raw error chains.
    pub fn user_message(&self) -> String {
        match self {
            QueryError::Transport(_) | QueryError::HttpStatus { .. } => {
                "The map server could not be reached. Check the server address and your connection."
                    .to_string()
            }
            QueryError::Timeout => {
                "The map server took too long to answer. Try again.".to_string()
            }
            QueryError::Decode(_) => {
                "The map server sent an answer that could not be read.".to_string()
            }
            QueryError::Schema(_) => {
                "The fields of this layer could not be loaded.".to_string()
            }
            QueryError::RasterUnsupported { .. } => {
                "This is a raster layer; attribute search is not available for it.".to_string()
            }
            QueryError::InvalidInput { field, message } => {
                format!("Invalid value for {}: {}", field, message)
            }
            QueryError::LayerNotFound(name) => format!("Layer '{}' is not available.", name),
            QueryError::UnknownCrs(code) => {
                format!("The reference system {} is not supported.", code)
            }
            QueryError::MissingResolution => {
                "The map is not ready yet. Try again in a moment.".to_string()
            }
        }
    }

    /// Errors that only mean "this layer contributed nothing" when they occur
    /// during a multi-layer point or box query.
    pub fn is_layer_local(&self) -> bool {
        matches!(
            self,
            QueryError::Transport(_)
                | QueryError::Timeout
                | QueryError::HttpStatus { .. }
                | QueryError::Decode(_)
        )
    }

    /// Stable label used for log fields and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Transport(_) => "transport",
            QueryError::Timeout => "timeout",
            QueryError::HttpStatus { .. } => "http_status",
            QueryError::Decode(_) => "decode",
            QueryError::Schema(_) => "schema",
            QueryError::RasterUnsupported { .. } => "raster_unsupported",
            QueryError::InvalidInput { .. } => "invalid_input",
            QueryError::LayerNotFound(_) => "layer_not_found",
            QueryError::UnknownCrs(_) => "unknown_crs",
            QueryError::MissingResolution => "missing_resolution",
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Decode(format!("JSON error: {}", err))
    }
}

impl From<CrsParseError> for QueryError {
    fn from(err: CrsParseError) -> Self {
        match err {
            CrsParseError::UnsupportedCrs(code) => QueryError::UnknownCrs(code),
        }
    }
}

impl From<ExtentParseError> for QueryError {
    fn from(err: ExtentParseError) -> Self {
        QueryError::invalid_input("extent", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_local_errors() {
        assert!(QueryError::Timeout.is_layer_local());
        assert!(QueryError::Decode("x".into()).is_layer_local());
        assert!(QueryError::HttpStatus { status: 502 }.is_layer_local());
        assert!(!QueryError::Schema("x".into()).is_layer_local());
        assert!(!QueryError::MissingResolution.is_layer_local());
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = QueryError::Decode("<html>stack trace at line 12</html>".into());
        assert!(!err.user_message().contains("stack trace"));

        let err = QueryError::Transport("connection refused (os error 111)".into());
        assert!(!err.user_message().contains("os error"));
    }
}
