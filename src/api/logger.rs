// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{Level, LevelFilter, Metadata, Record};

/// Set once the global logger is installed; later calls are no-ops.
static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

const LOG_LEVEL_ENV: &str = "PROPOSAL_ENGINE_LOG";

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_record(record.level(), record.target(), &record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn format_record(level: Level, target: &str, message: &str) -> String {
    format!("[{}][{}] {}", level, target, message)
}

fn build_default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Level from `PROPOSAL_ENGINE_LOG` (e.g. `warn`), else Debug in debug builds and Info in release.
fn resolve_level(raw: Option<&str>) -> LevelFilter {
    raw.and_then(|value| LevelFilter::from_str(value.trim()).ok())
        .unwrap_or_else(build_default_level)
}

/// Install the stderr logger at the resolved level.
///
/// Idempotent. Hosts that install their own `log` backend simply skip this.
pub fn init_logger() -> anyhow::Result<()> {
    let raw = std::env::var(LOG_LEVEL_ENV).ok();
    init_logger_with_level(resolve_level(raw.as_deref()))
}

pub fn init_logger_with_level(level: LevelFilter) -> anyhow::Result<()> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(level))
        .map_err(|e| {
            LOGGER_INITIALIZED.store(false, Ordering::SeqCst);
            anyhow::anyhow!("Logger init failed: {}", e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_record() {
        let line = format_record(Level::Warn, "proposal_engine::api::embedding", "all-zero vector");
        assert_eq!(line, "[WARN][proposal_engine::api::embedding] all-zero vector");
    }

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level(Some("warn")), LevelFilter::Warn);
        assert_eq!(resolve_level(Some(" TRACE ")), LevelFilter::Trace);
        assert_eq!(resolve_level(Some("loud")), build_default_level());
        assert_eq!(resolve_level(None), build_default_level());
    }

    #[test]
    fn test_init_logger_idempotent() {
        assert!(init_logger().is_ok());
        assert!(init_logger_with_level(LevelFilter::Error).is_ok());
    }
}
