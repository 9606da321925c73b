use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

pub use slog::{crit, debug, error, info, o, trace, warn};
pub use slog::{Discard, Drain, Logger};

/// Builds a root logger from a `sloggers` TOML snippet, e.g.
///
/// ```toml
/// type = "terminal"
/// level = "debug"
/// destination = "stderr"
/// ```
///
/// Panics on a malformed configuration; logging is wired up once at startup
/// and a broken config should be fatal rather than silently discarded.
pub fn init(config_toml: &str) -> Logger {
    use sloggers::{Config, LoggerConfig};

    let config: LoggerConfig =
        serdeconv::from_toml_str(config_toml).expect("Malformed logger configuration");

    config.build_logger().expect("Logger construction failed")
}

/// Terminal logger with sensible defaults for tools and examples.
pub fn term() -> Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(Severity::Debug);
    builder.destination(Destination::Stderr);

    builder.build().expect("Logger construction failed")
}

/// Root logger that swallows everything. Components take this as their
/// default so logging stays strictly opt-in.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_from_toml() {
        let log = init(
            r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#,
        );

        debug!(log, "logger built"; "context" => "test");
    }

    #[test]
    fn test_discard_accepts_records() {
        let log = discard();

        trace!(log, "dropped"; "context" => "test");
    }
}
