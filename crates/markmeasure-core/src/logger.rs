//! Logging for the command-line tools.
//!
//! Records from the `markmeasure` crates are shown down to the chosen level.
//! Everything else, such as image decoders, is capped at warnings. Lines read
//! `[  0.412s  INFO session] message`, with the last module path segment as
//! the source.

use std::fmt::Arguments;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Crate roots whose records follow the chosen level.
const OWN_CRATES: [&str; 3] = ["markmeasure", "markmeasure_core", "markmeasure_aruco"];

fn is_own_target(target: &str) -> bool {
    let root = target.split("::").next().unwrap_or(target);
    OWN_CRATES.contains(&root)
}

/// Whether a record at `record` from `target` is shown under `level`.
fn passes(level: LevelFilter, target: &str, record: Level) -> bool {
    let cap = if is_own_target(target) {
        level
    } else {
        level.min(LevelFilter::Warn)
    };
    record <= cap
}

fn format_line(elapsed_s: f64, level: Level, target: &str, message: Arguments<'_>) -> String {
    let source = target.rsplit("::").next().unwrap_or(target);
    format!("[{elapsed_s:7.3}s {level:>5} {source}] {message}")
}

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        passes(self.level, metadata.target(), metadata.level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            *record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. Later calls keep the first level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Map a repeated `-v` count onto a level: 0 = warn, 1 = info, 2 = debug, 3+ = trace.
pub fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// `EnvFilter` directives equivalent to the stderr logger at `level`.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
fn filter_directives(level: LevelFilter) -> String {
    let own = level.to_string().to_ascii_lowercase();
    let other = level.min(LevelFilter::Warn).to_string().to_ascii_lowercase();
    let mut directives = other;
    for name in OWN_CRATES {
        directives.push_str(&format!(",{name}={own}"));
    }
    directives
}

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the filter matches
/// [`init_with_level`] at `level`. `log` records are not bridged here;
/// callers that want them install `tracing_log::LogTracer` first. A second
/// call is ignored.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));
    let _ = if json {
        tracing::subscriber::set_global_default(
            fmt()
                .with_env_filter(filter)
                .with_span_events(FmtSpan::CLOSE)
                .json()
                .flatten_event(true)
                .finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            fmt()
                .with_env_filter(filter)
                .with_span_events(FmtSpan::CLOSE)
                .with_timer(fmt::time::Uptime::default())
                .finish(),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels_increase() {
        assert_eq!(level_from_verbosity(0), LevelFilter::Warn);
        assert_eq!(level_from_verbosity(1), LevelFilter::Info);
        assert_eq!(level_from_verbosity(2), LevelFilter::Debug);
        assert_eq!(level_from_verbosity(9), LevelFilter::Trace);
    }

    #[test]
    fn foreign_crates_are_capped_at_warn() {
        let debug = LevelFilter::Debug;
        assert!(passes(debug, "markmeasure_aruco::detector", Level::Debug));
        assert!(passes(debug, "markmeasure", Level::Info));
        assert!(!passes(debug, "markmeasure_core::warp", Level::Trace));
        assert!(!passes(debug, "png::decoder", Level::Info));
        assert!(passes(debug, "png::decoder", Level::Warn));
        // A similar prefix is not one of ours.
        assert!(!passes(debug, "markmeasure_extra", Level::Info));
        assert!(!passes(LevelFilter::Error, "png", Level::Warn));
    }

    #[test]
    fn line_shows_the_last_module_segment() {
        let line = format_line(
            1.5,
            Level::Info,
            "markmeasure::session",
            format_args!("px/mm: {:.3}", 2.0),
        );
        assert_eq!(line, "[  1.500s  INFO session] px/mm: 2.000");
        let line = format_line(0.0, Level::Warn, "markmeasure", format_args!("x"));
        assert_eq!(line, "[  0.000s  WARN markmeasure] x");
    }

    #[test]
    fn tracing_directives_follow_the_verbosity() {
        assert_eq!(
            filter_directives(LevelFilter::Debug),
            "warn,markmeasure=debug,markmeasure_core=debug,markmeasure_aruco=debug"
        );
        assert!(filter_directives(LevelFilter::Error).starts_with("error,"));
    }
}
