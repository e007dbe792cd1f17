//! Logging initialization.

use simplelog::ColorChoice;
use simplelog::CombinedLogger;
use simplelog::Config as LogConfig;
use simplelog::LevelFilter;
use simplelog::TermLogger;
use simplelog::TerminalMode;

/// Maps the run configuration's `verbosity` to a log level: 0 = Warn,
/// 1 = Info, 2 = Debug, anything higher = Trace.
fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs a single terminal logger as the global logger. Safe to call
/// once per process; a second call returns an error from the underlying
/// `log` crate, which callers may ignore (tests calling this repeatedly
/// across the suite is the expected case).
pub fn init(verbosity: u8) {
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level_for(verbosity),
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
