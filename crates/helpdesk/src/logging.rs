use tracing_subscriber::EnvFilter;

use helpdesk_core::config::ObservabilityConfig;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
/// Calling this twice is harmless.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Logging for one-shot CLI commands: warnings only unless `RUST_LOG` says
/// otherwise.
pub fn init_quiet() {
    init(&ObservabilityConfig {
        level: "warn".to_string(),
        json: false,
    });
}
