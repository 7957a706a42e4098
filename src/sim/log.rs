use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::timeq::Cycle;

#[derive(PartialEq, PartialOrd, Debug, Default, Clone, Copy)]
pub enum LogLevel {
    #[default]
    NONE,
    INFO,
    DEBUG,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::NONE => "NONE",
            LogLevel::INFO => "INFO",
            LogLevel::DEBUG => "DEBUG",
        };
        f.write_str(name)
    }
}

/// Anything above 2 is treated as debug.
pub fn to_loglevel(ulevel: u64) -> LogLevel {
    match ulevel {
        0 => LogLevel::NONE,
        1 => LogLevel::INFO,
        _ => LogLevel::DEBUG,
    }
}

/// Cycle-stamped console logger shared by the buffer and the harness.
pub struct Logger {
    level: LogLevel,
    cycle: AtomicU64,
}

impl Logger {
    pub fn new(ulevel: u64) -> Self {
        Logger {
            level: to_loglevel(ulevel),
            cycle: AtomicU64::new(0),
        }
    }

    pub fn silent() -> Self {
        Logger::new(0)
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::NONE && level <= self.level
    }

    pub fn set_cycle(&self, cycle: Cycle) {
        self.cycle.store(cycle, Ordering::Relaxed);
    }

    pub fn log(&self, level: LogLevel, args: std::fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        println!("[{}] @{} {}", level, self.cycle.load(Ordering::Relaxed), args);
    }
}

#[macro_export]
macro_rules! log {
    // usage: log!(logger, LogLevel::INFO, "a {} event", "clock")
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        $logger.log($level, format_args!($($arg)+));
    }};
}
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => ( $crate::log!($logger, $crate::sim::log::LogLevel::INFO, $($arg)+); )
}
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => ( $crate::log!($logger, $crate::sim::log::LogLevel::DEBUG, $($arg)+); )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_gate_output() {
        let logger = Logger::new(1);
        assert!(logger.enabled(LogLevel::INFO));
        assert!(!logger.enabled(LogLevel::DEBUG));
        assert!(!Logger::silent().enabled(LogLevel::INFO));
        assert!(!logger.enabled(LogLevel::NONE));
        assert_eq!(LogLevel::DEBUG, to_loglevel(7));
    }
}
