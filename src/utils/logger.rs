use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_cli_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    init_with_level(level);
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_with_level(level: &str) {
    let filter = default_filter(level);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// JSON lines, for running under a supervisor that ingests structured logs.
pub fn init_json_logger(level: &str) {
    let filter = default_filter(level);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}

/// `RUST_LOG` when set, otherwise `level` for this crate and its binaries.
fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,ext_webservices={0},websvcd={0},cstbox_dist={0}",
            level
        ))
    })
}
