use std::io::Write;

use log::{Level, LevelFilter};

use crate::args::LogLevel;

impl LogLevel {
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => LevelFilter::Error,
        }
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// `LEVEL   message` lines on stderr. Dependencies are capped at WARNING.
pub fn init(level: LogLevel) {
    let ours = level.filter();
    env_logger::Builder::new()
        .filter_level(ours.min(LevelFilter::Warn))
        .filter_module("imagescan_core", ours)
        .filter_module("imagescan_cli", ours)
        .target(env_logger::Target::Stderr)
        .format(|buf, record| writeln!(buf, "{:<8}{}", level_name(record.level()), record.args()))
        .init();
}
