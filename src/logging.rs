use slog::Drain;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[error("unknown log level {0:?}")]
pub struct UnknownLogLevel(String);

/// Parse a level name: trace, debug, info, warn(ing), error or crit(ical).
pub fn parse_level(name: &str) -> Result<slog::Level, UnknownLogLevel> {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Ok(slog::Level::Trace),
        "debug" => Ok(slog::Level::Debug),
        "info" => Ok(slog::Level::Info),
        "warn" | "warning" => Ok(slog::Level::Warning),
        "error" => Ok(slog::Level::Error),
        "crit" | "critical" => Ok(slog::Level::Critical),
        _ => Err(UnknownLogLevel(name.to_string())),
    }
}

/// Build the process root logger. `console` selects a colored terminal layout with file locations;
/// otherwise lines are plain, for files and log collectors. Records below `level` are dropped.
pub fn root_logger(level: slog::Level, console: bool) -> slog::Logger {
    if console {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
        let drain = slog::LevelFilter::new(drain, level).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();

        slog::Logger::root(drain, slog::o!())
    } else {
        let decorator = slog_term::PlainSyncDecorator::new(std::io::stdout());
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog::LevelFilter::new(drain, level).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();

        slog::Logger::root(drain, slog::o!())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("trace"), Ok(slog::Level::Trace));
        assert_eq!(parse_level("INFO"), Ok(slog::Level::Info));
        assert_eq!(parse_level("warn"), Ok(slog::Level::Warning));
        assert_eq!(parse_level("critical"), Ok(slog::Level::Critical));

        let err = parse_level("loud").unwrap_err();
        assert_eq!(err.to_string(), "unknown log level \"loud\"");
    }

    #[test]
    fn plain_logger_logs() {
        let logger = root_logger(slog::Level::Debug, false);
        slog::info!(logger, "Hello"; "replica" => "kira");
    }
}
