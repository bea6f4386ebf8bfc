//! Tracing setup for the fimeval binaries.
//!
//! Reports and CSV tables are printed on stdout, so log lines always go to
//! stderr. [`init_tracing`] installs the global subscriber once; later calls
//! are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives read before `RUST_LOG`.
pub const LOG_ENV: &str = "FIMEVAL_LOG";

/// Directives used when no filter variable is set: `level` for the fimeval
/// crates, warnings for everything else.
pub fn default_filter(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,fimeval_core={level},fimeval_run={level},fimeval_cli={level}")
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)))
}

/// Install the subscriber, text or newline-delimited JSON.
pub fn init_tracing(json: bool, level: Level) {
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter(level));
    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_scopes_level_to_fimeval_crates() {
        let filter = default_filter(Level::DEBUG);
        assert_eq!(
            filter,
            "warn,fimeval_core=debug,fimeval_run=debug,fimeval_cli=debug"
        );
        assert!(EnvFilter::try_new(filter).is_ok());
    }

    #[test]
    fn init_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
