//! Common types shared by the feature query crates.

pub mod criteria;
pub mod crs;
pub mod error;
pub mod extent;
pub mod feature;
pub mod layer;
pub mod schema;

pub use criteria::{ComparisonOperator, SearchCriteria};
pub use crs::{AxisOrder, CrsCode};
pub use error::{QueryError, QueryResult};
pub use extent::Extent;
pub use feature::{Coord, Feature, FeatureGeometry, Geometry, GeometryKind, Properties, PropertyValue};
pub use layer::{Layer, LayerDescriptor, LayerId};
pub use schema::{FieldType, GeometryField, LayerFieldSchema, LayerSchema};
