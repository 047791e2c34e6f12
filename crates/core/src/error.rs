use shuttle_transit::{RouteCode, TransitError};

/// Failures surfaced by the engine.
///
/// Only `Config` is ever fatal. Everything else describes a data-quality or
/// network condition the engine has already degraded from.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid geometry for overlay {id}: {reason}")]
    InvalidGeometry { id: String, reason: String },

    #[error("lookup failed: {0}")]
    LookupFailed(#[from] TransitError),

    #[error("stale result for request {request_id} (latest is {latest})")]
    StaleResult { request_id: u64, latest: u64 },

    #[error("no checkpoint data for route {0}")]
    MissingRouteData(RouteCode),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
