//! Spatial indexing, geometry and query utilities.

pub mod index;
pub mod path;
pub mod queries;

pub use path::{decode_path, PATH_PRECISION};
pub use queries::{bearing, bounding_rect, haversine_distance, is_valid_coordinate, nearest_point};
