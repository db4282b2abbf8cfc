//! Coordinate reference system transformations.
//!
//! Implements the projections the query engine needs from scratch without
//! external dependencies: geographic, Web Mercator and transverse Mercator
//! (UTM), plus a registry mapping CRS codes to definitions.

pub mod mercator;
pub mod registry;
pub mod transverse_mercator;

pub use mercator::WebMercator;
pub use registry::{world_width, CrsDefinition, CrsRegistry, ProjectionError};
pub use transverse_mercator::{Ellipsoid, TransverseMercator};
