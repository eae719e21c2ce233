use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with tracing
///
/// Reads the filter from `RUST_LOG` and falls back to
/// "viboard=debug,viboard_lib=debug,warn". Safe to call more than once; later
/// calls leave the first subscriber in place.
///
/// # Example
///
/// ```no_run
/// use viboard_lib::utils::logging::init_logging;
///
/// init_logging();
/// ```
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("viboard=debug,viboard_lib=debug,warn"));

    if tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_ok()
    {
        tracing::info!("ViBoard logging initialized");
    }
}
