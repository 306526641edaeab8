#![deny(missing_docs)]
//! Shared logging utilities for the pressroom workspace.
//!
//! This crate provides the `press_*` logging macros used across the codebase,
//! a per-thread run label that prefixes every pipeline log line, and the
//! logger initializers used by tests and the binary.

use std::cell::RefCell;
use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

#[doc(hidden)]
pub use log;

thread_local! {
    /// Label of the pipeline run currently driven on this thread.
    static RUN_LABEL: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets the run label for the current thread.
/// The pipeline runner calls this when a run starts.
pub fn set_run_label(label: impl Into<String>) {
    let label = label.into();
    RUN_LABEL.with(|v| *v.borrow_mut() = Some(label));
}

/// Clears the run label for the current thread.
pub fn clear_run_label() {
    RUN_LABEL.with(|v| *v.borrow_mut() = None);
}

/// Retrieves the run label for the current thread, if one is set.
pub fn run_label() -> Option<String> {
    RUN_LABEL.with(|v| v.borrow().clone())
}

/// Prefix inserted in front of every `press_*` log line.
#[doc(hidden)]
pub fn run_prefix() -> String {
    match run_label() {
        Some(label) => format!("[{label}] "),
        None => String::new(),
    }
}

/// Logs a trace-level message, prefixed with the active run label.
#[macro_export]
macro_rules! press_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!(target: "pressroom", "{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message, prefixed with the active run label.
#[macro_export]
macro_rules! press_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!(target: "pressroom", "{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message, prefixed with the active run label.
#[macro_export]
macro_rules! press_info {
    ($($arg:tt)*) => {{
        $crate::log::info!(target: "pressroom", "{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message, prefixed with the active run label.
#[macro_export]
macro_rules! press_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!(target: "pressroom", "{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message, prefixed with the active run label.
#[macro_export]
macro_rules! press_error {
    ($($arg:tt)*) => {{
        $crate::log::error!(target: "pressroom", "{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to a log file.
    File,
    /// Write to the terminal.
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Initializes the global logger for a binary.
///
/// The log file is truncated on start. If it cannot be created the file logger
/// is skipped and a warning is printed to stderr; a terminal logger is still
/// installed for `Both`.
pub fn initialize(destination: LogDestination, level: LevelFilter, log_path: &Path) {
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if matches!(destination, LogDestination::Terminal | LogDestination::Both) {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if matches!(destination, LogDestination::File | LogDestination::Both) {
        match File::create(log_path) {
            Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
            Err(err) => eprintln!("Warning: could not create log file at {log_path:?}: {err}"),
        }
    }
    if loggers.is_empty() {
        return;
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_prefix_follows_label() {
        clear_run_label();
        assert_eq!(run_prefix(), "");
        set_run_label("file-1");
        assert_eq!(run_prefix(), "[file-1] ");
        assert_eq!(run_label().as_deref(), Some("file-1"));
        clear_run_label();
        assert!(run_label().is_none());
    }

    #[test]
    fn macros_expand_without_logger() {
        press_info!("plain message {}", 1);
        press_warn!("warning with {value}", value = "named arg");
    }
}
