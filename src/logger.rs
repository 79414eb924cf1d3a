//! Stderr backend for the `log` facade, used by the CLI.
//!
//! Library code only emits through `log`. Lines look like
//! `warn: message`; at trace level the module path is appended.

use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = record.level().as_str().to_lowercase();
        let mut stderr = std::io::stderr().lock();
        let _ = if log::max_level() >= LevelFilter::Trace {
            writeln!(stderr, "{}: {} ({})", level, record.args(), record.target())
        } else {
            writeln!(stderr, "{}: {}", level, record.args())
        };
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the logger at the level selected by `-v`/`-q`.
///
/// A second call only changes the level.
pub fn init(verbose: u8, quiet: bool) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level_for(verbose, quiet));
}

/// Map `-v` repetitions and `-q` to a filter; warnings show by default
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0, false), LevelFilter::Warn);
        assert_eq!(level_for(1, false), LevelFilter::Info);
        assert_eq!(level_for(2, false), LevelFilter::Debug);
        assert_eq!(level_for(9, false), LevelFilter::Trace);
        assert_eq!(level_for(3, true), LevelFilter::Error);
    }

    #[test]
    fn test_repeat_init_updates_level() {
        init(0, false);
        init(0, true);
        assert_eq!(log::max_level(), LevelFilter::Error);
        assert!(!LOGGER.enabled(&Metadata::builder().level(log::Level::Warn).build()));
    }
}
