//! Trackly Library
//!
//! Watches a music library laid out as `<root>/<artist>/<album>`, keeps a
//! catalog of its artists with their MusicBrainz ids and periodically asks
//! MusicBrainz for albums released this year. Albums that are neither in the
//! library nor already announced this year are recorded and announced once.
//!
//! # Modules
//!
//! - `cli` - Command implementations used by the binary
//! - `config` - Configuration loading from environment variables
//! - `library` - Access to the local music directory
//! - `management` - Durable JSON state: artist catalog, notification ledger
//! - `musicbrainz` - Paced MusicBrainz client
//! - `notify` - Notification transport (Discord webhook)
//! - `scanner` - One release scan pass
//! - `scheduler` - Recurring scans and the startup sequence
//! - `types` - Data structures and type definitions
//! - `utils` - Small helpers

pub mod cli;
pub mod config;
pub mod library;
pub mod management;
pub mod musicbrainz;
pub mod notify;
pub mod scanner;
pub mod scheduler;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Used by the command layer, where errors of every component meet and are
/// only reported to the user.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Found {} artists", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only for fatal errors, such as missing configuration at startup. Code
/// after this macro does not run.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
