pub mod callbacks;
pub mod error;
mod logging;
pub mod records;
pub mod session;

pub use error::SessionError;
pub use session::MapSession;

uniffi::setup_scaffolding!();

/// Install logging and the panic hook.
/// Call this once at startup from Kotlin/Swift; `MapSession::new` also does.
#[uniffi::export]
pub fn init_logging() {
    logging::setup_logging();
}
