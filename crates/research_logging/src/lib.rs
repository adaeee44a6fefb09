#![deny(missing_docs)]
//! Shared logging utilities for the research workspace.
//!
//! This crate provides the `research_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every line logged
//! through the macros is prefixed with the active job label, when one is set.

use std::sync::Mutex;

#[doc(hidden)]
pub use log;

/// Label of the job currently attached to the controller, shared by all threads.
static ACTIVE_JOB: Mutex<Option<String>> = Mutex::new(None);

/// Sets the job label prefixed onto log lines.
/// Passing `None` clears it (for example after a reset).
pub fn set_active_job(job_id: Option<&str>) {
    if let Ok(mut guard) = ACTIVE_JOB.lock() {
        *guard = job_id.map(ToOwned::to_owned);
    }
}

/// Retrieves the job label currently prefixed onto log lines.
pub fn active_job() -> Option<String> {
    ACTIVE_JOB.lock().ok().and_then(|guard| guard.clone())
}

/// Formats the log prefix for the active job, or an empty string when idle.
#[doc(hidden)]
pub fn job_prefix() -> String {
    match active_job() {
        Some(job_id) => format!("[job {job_id}] "),
        None => String::new(),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! research_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! research_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! research_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! research_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! research_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
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
    use super::{active_job, job_prefix, set_active_job};

    #[test]
    fn prefix_follows_active_job() {
        set_active_job(Some("job-7"));
        assert_eq!(active_job().as_deref(), Some("job-7"));
        assert_eq!(job_prefix(), "[job job-7] ");

        set_active_job(None);
        assert_eq!(job_prefix(), "");
    }
}
