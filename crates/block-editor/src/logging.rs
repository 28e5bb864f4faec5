//! Subscriber bootstrap for hosts embedding the editor.
//!
//! Library code only emits `tracing` events; the host calls [`init`] once.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const DEFAULT_FILTER: &str = "notes_block_editor=info,notes_editor_core=warn";

/// Installs a fmt subscriber. `RUST_LOG` wins over `directives`, which fall
/// back to [`DEFAULT_FILTER`]. Returns false if a global subscriber exists.
pub fn init(directives: Option<&str>) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives.unwrap_or(DEFAULT_FILTER)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true),
    );

    if subscriber.try_init().is_err() {
        return false;
    }
    tracing::debug!("tracing initialized");
    true
}
