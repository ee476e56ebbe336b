// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Console output for the CLI.
//!
//! Messages are printed through the `info!`, `warn!`, `error!`, `success!`,
//! `verbose!` and `section!` macros. `verbose!` and `section!` respect the global
//! verbosity flag; warnings and errors go to stderr.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::{ColoredString, Colorize};

/// Global verbosity flag.
static VERBOSE: AtomicBool = AtomicBool::new(true);

/// Set the global verbosity flag.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// Check if verbose output is enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Message severity, which selects the prefix and output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Plain stdout line.
    Info,
    /// Yellow `WARNING ⚠️` prefix on stderr.
    Warn,
    /// Red `Error:` prefix on stderr.
    Error,
    /// Green check mark on stdout.
    Success,
}

impl Level {
    fn prefix(self) -> Option<ColoredString> {
        match self {
            Self::Info => None,
            Self::Warn => Some("WARNING ⚠️".yellow().bold()),
            Self::Error => Some("Error:".red().bold()),
            Self::Success => Some("✅".green()),
        }
    }

    const fn is_stderr(self) -> bool {
        matches!(self, Self::Warn | Self::Error)
    }
}

/// Format a message with its level prefix.
#[must_use]
pub fn format_message(level: Level, message: &str) -> String {
    level
        .prefix()
        .map_or_else(|| message.to_string(), |prefix| format!("{prefix} {message}"))
}

/// Print a message at `level`.
pub fn log(level: Level, message: &str) {
    let line = format_message(level, message);
    if level.is_stderr() {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}

/// Print a cyan section header when verbose.
pub fn section_header(title: &str) {
    if is_verbose() {
        println!();
        println!("{}", title.cyan().bold());
    }
}

/// Macro for standard info messages.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::cli::logging::log($crate::cli::logging::Level::Info, &format!($($arg)*))
    };
}

/// Macro for warning messages.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::cli::logging::log($crate::cli::logging::Level::Warn, &format!($($arg)*))
    };
}

/// Macro for error messages.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::cli::logging::log($crate::cli::logging::Level::Error, &format!($($arg)*))
    };
}

/// Macro for success messages.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::cli::logging::log($crate::cli::logging::Level::Success, &format!($($arg)*))
    };
}

/// Macro for verbose messages.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::cli::logging::is_verbose() {
            $crate::cli::logging::log($crate::cli::logging::Level::Info, &format!($($arg)*));
        }
    };
}

/// Macro for section headers.
#[macro_export]
macro_rules! section {
    ($($arg:tt)*) => {
        $crate::cli::logging::section_header(&format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_toggle() {
        set_verbose(false);
        assert!(!is_verbose());

        set_verbose(true);
        assert!(is_verbose());
    }

    #[test]
    fn test_format_message() {
        colored::control::set_override(false);
        assert_eq!(format_message(Level::Info, "17 keypoints"), "17 keypoints");
        assert_eq!(format_message(Level::Warn, "slow"), "WARNING ⚠️ slow");
        assert_eq!(format_message(Level::Error, "bad"), "Error: bad");
        assert!(format_message(Level::Success, "done").ends_with(" done"));
    }
}
