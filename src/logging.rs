use std::env;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

/// Environment variable holding the log filter, e.g. `debug` or
/// `warn,lobby_client::connection=trace`.
pub const LOG_ENV_VAR: &str = "LOBBY_LOG";

/// Parsed `LOBBY_LOG` value: a default level plus per-module overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    default: LevelFilter,
    /// `(module path, level)`, longest path first.
    modules: Vec<(String, LevelFilter)>,
}

impl LogFilter {
    /// Parse a comma-separated list of `level` and `module=level` entries.
    /// Unparsable entries are skipped; the default level is `info`.
    pub fn parse(spec: &str) -> Self {
        let mut default = LevelFilter::Info;
        let mut modules = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                Some((module, level)) => {
                    if let Ok(level) = level.trim().parse() {
                        modules.push((module.trim().to_string(), level));
                    }
                }
                None => {
                    if let Ok(level) = entry.parse() {
                        default = level;
                    }
                }
            }
        }
        modules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { default, modules }
    }

    /// Level that applies to records from `target`.
    pub fn level_for(&self, target: &str) -> LevelFilter {
        self.modules
            .iter()
            .find(|(module, _)| {
                target == module.as_str()
                    || target
                        .strip_prefix(module.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            })
            .map_or(self.default, |(_, level)| *level)
    }

    /// Most verbose level any target can reach.
    pub fn max_level(&self) -> LevelFilter {
        self.modules
            .iter()
            .map(|(_, level)| *level)
            .fold(self.default, Ord::max)
    }
}

struct LobbyLogger {
    filter: LogFilter,
    started: Instant,
}

impl Log for LobbyLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let elapsed = self.started.elapsed();
            eprintln!(
                "[{:>4}.{:03}s {:<5} {}] {}",
                elapsed.as_secs(),
                elapsed.subsec_millis(),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<LobbyLogger> = OnceLock::new();

/// Install the stderr logger configured from `LOBBY_LOG`. Timestamps count
/// from the first call. Calling it again has no effect.
pub fn init_logging() {
    let logger = LOGGER.get_or_init(|| LobbyLogger {
        filter: LogFilter::parse(&env::var(LOG_ENV_VAR).unwrap_or_default()),
        started: Instant::now(),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.filter.max_level());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_level_sets_default() {
        let filter = LogFilter::parse("debug");
        assert_eq!(filter.level_for("lobby_client::session"), LevelFilter::Debug);
        assert_eq!(filter.max_level(), LevelFilter::Debug);
    }

    #[test]
    fn module_override_matches_whole_path_segments() {
        let filter = LogFilter::parse("warn, lobby_client::connection=trace");
        assert_eq!(filter.level_for("lobby_client::connection"), LevelFilter::Trace);
        assert_eq!(filter.level_for("lobby_client::connection::task"), LevelFilter::Trace);
        assert_eq!(filter.level_for("lobby_client::connectionx"), LevelFilter::Warn);
        assert_eq!(filter.level_for("lobby_client::session"), LevelFilter::Warn);
        assert_eq!(filter.max_level(), LevelFilter::Trace);
    }

    #[test]
    fn longest_module_wins() {
        let filter = LogFilter::parse("lobby_client=error,lobby_client::dispatcher=debug");
        assert_eq!(filter.level_for("lobby_client::dispatcher"), LevelFilter::Debug);
        assert_eq!(filter.level_for("lobby_client::ui"), LevelFilter::Error);
        assert_eq!(filter.level_for("tokio_tungstenite"), LevelFilter::Info);
    }

    #[test]
    fn empty_or_garbage_falls_back_to_info() {
        assert_eq!(LogFilter::parse("").max_level(), LevelFilter::Info);
        let filter = LogFilter::parse("loud,x=verbose");
        assert_eq!(filter.level_for("x"), LevelFilter::Info);
        assert_eq!(filter.max_level(), LevelFilter::Info);
    }
}
