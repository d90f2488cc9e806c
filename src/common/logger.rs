//! Logger setup
//! stdout logging through pretty_env_logger, level taken from settings

use std::io::Error;
use super::setting::Settings;

/// init the logger backend, calling it twice is harmless
pub fn init_logger() -> Result<(), Error> {
    // already initialised
    if log::max_level() != log::LevelFilter::Off {
        return Ok(())
    }

    let level = parse_level(Settings::get().env.log_level.as_str());

    // tests may race on init, the loser just keeps the existing logger
    let _ = pretty_env_logger::formatted_builder()
        .target(pretty_env_logger::env_logger::Target::Stdout)
        .filter_level(level)
        .try_init();
    Ok(())
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info
    }
}


/// log with a module TAG prefix, supports trace debug info warn error
#[macro_export]
macro_rules! warn {
    ($tag:expr, $($arg:tt)*) => ({
        log::warn!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! error {
    ($tag:expr, $($arg:tt)*) => ({
        log::error!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! info {
    ($tag:expr, $($arg:tt)*) => ({
        log::info!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! debug {
    ($tag:expr, $($arg:tt)*) => ({
        log::debug!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! trace {
    ($tag:expr, $($arg:tt)*) => ({
        log::trace!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), log::LevelFilter::Debug);
        assert_eq!(parse_level("error"), log::LevelFilter::Error);
        // unknown levels fall back to info
        assert_eq!(parse_level("loud"), log::LevelFilter::Info);
    }

    #[test]
    fn test_init_twice() {
        assert!(init_logger().is_ok());
        assert!(init_logger().is_ok());
    }
}
