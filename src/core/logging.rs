//! Logging initialization and utilities

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// cubevol::core::logging::init();
/// log::info!("Volume created");
/// ```
pub fn init() {
    // A second init (e.g. from several doctests) must not panic.
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
