use std::panic::PanicHookInfo;
use std::sync::Once;

use tracing_subscriber::filter::FilterFn;
use tracing_subscriber::fmt::format::Format;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the tracing subscriber and panic hook. Safe to call repeatedly.
pub fn setup_logging() {
    static LOGGING_SETUP: Once = Once::new();

    LOGGING_SETUP.call_once(|| {
        let filter =
            FilterFn::new(|meta| meta.module_path().unwrap_or_default().starts_with("shuttle"));

        #[cfg(target_os = "android")]
        {
            use tracing_logcat::{LogcatMakeWriter, LogcatTag};

            let tag = LogcatTag::Fixed("Shuttle-Rust".to_owned());
            match LogcatMakeWriter::new(tag) {
                Ok(writer) => {
                    let layer = tracing_subscriber::fmt::layer()
                        .event_format(Format::default().with_level(false).without_time())
                        .with_writer(writer)
                        .with_ansi(false);
                    let _ = tracing_subscriber::registry()
                        .with(layer)
                        .with(filter)
                        .try_init();
                }
                Err(e) => eprintln!("logcat writer unavailable: {e}"),
            }
        }

        #[cfg(not(target_os = "android"))]
        {
            let layer = tracing_subscriber::fmt::layer()
                .event_format(Format::default().with_target(false))
                .with_ansi(false);
            let _ = tracing_subscriber::registry()
                .with(layer)
                .with(filter)
                .try_init();
        }

        std::panic::set_hook(Box::new(panic_hook));
    })
}

fn panic_hook(info: &PanicHookInfo) {
    tracing::error!("{info}")
}
