pub mod chat;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod session;
pub mod terminal;
pub mod transport;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber: `RUST_LOG`, else the crate default, on stderr.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
