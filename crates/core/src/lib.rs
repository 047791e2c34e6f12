//! Live transit overlay and tracking engine.
//!
//! Keeps a map surface in sync with campus transit state: stops and labels at
//! the right level of detail, the selected route, live vehicles pointing the
//! way they travel, and the place a user clicked on.

pub mod click;
pub mod config;
pub mod engine;
pub mod error;
pub mod heading;
pub mod live;
pub mod lod;
pub mod overlay;
pub mod scene;
pub mod selection;

pub use engine::{TransitOverlayEngine, Viewport};
pub use error::{EngineError, Result};

// Reference data and geometry
pub use shuttle_transit as transit;
