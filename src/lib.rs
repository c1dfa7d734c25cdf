pub mod attachments;
pub mod commands;
pub mod config;
pub mod core_state;
pub mod db;
pub mod export;
pub mod models;
pub mod users;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `filter`.
/// Calling it again is a no-op.
pub fn init_tracing(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .try_init();
}

/// Bring the backend up: logging, data directories, leftover cleanup.
/// Front ends share the returned state across their commands.
pub fn start(config: config::AppConfig) -> std::io::Result<Arc<core_state::CoreState>> {
    init_tracing(config.log_filter());
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.archive.archive_root)?;

    let state = core_state::CoreState::new(config);
    state.store().sweep_temp_files();
    Ok(Arc::new(state))
}
