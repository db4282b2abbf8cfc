//! OGC request shapes used by the feature query engine.
//!
//! Supports:
//! - WMS GetFeatureInfo (1.1.1 and 1.3.0) for point and area queries
//! - WFS 1.0.0 GetFeature and DescribeFeatureType
//! - Single-predicate CQL filters
//! - Service exception reports

pub mod cql;
pub mod exceptions;
pub mod getfeatureinfo;
pub mod wfs;

pub use cql::{FilterError, LiteralValue, Predicate};
pub use exceptions::{parse_exception_report, ExceptionParseError, ServiceException};
pub use getfeatureinfo::{GetFeatureInfoRequest, InfoFormat, WmsVersion};
pub use wfs::{DescribeFeatureTypeRequest, DescribeFeatureTypeResponse, GetFeatureRequest};

/// Key-value query parameters in request order.
pub type QueryParams = Vec<(String, String)>;

/// Look up a parameter by name, ignoring case as OGC servers do.
pub fn find_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
