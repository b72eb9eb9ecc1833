//! Diagnostics for the `robin` binary.
//!
//! Robin's own crates log at the level picked on the command line while
//! dependencies stay at `warn`. Everything goes to stderr, leaving stdout
//! to echoed xcodebuild output and `--json` reports. `RUST_LOG` replaces
//! the default filter entirely.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const ROBIN_TARGETS: [&str; 3] = ["robin", "robin_core", "robin_ios"];

/// Filter directives used when `RUST_LOG` is unset.
fn default_directives(level: Level) -> String {
    let mut directives = String::from("warn");
    for target in ROBIN_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Install the global subscriber. Only the first call in a process has any
/// effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let plain = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let structured = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_robin_crates() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,robin=DEBUG,robin_core=DEBUG,robin_ios=DEBUG"
        );
    }

    #[test]
    fn test_default_directives_parse() {
        assert!(EnvFilter::try_new(default_directives(Level::INFO)).is_ok());
    }

    #[test]
    fn test_init_tracing_twice_does_not_panic() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
