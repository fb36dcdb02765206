//! User-facing output utilities for clean, colored terminal messages
//!
//! Kept separate from logging so that user-facing errors and warnings don't
//! carry timestamps, levels or module paths.

use owo_colors::OwoColorize;

/// Display a warning message to the user in yellow with padding
pub fn warn(message: &str) {
    eprintln!("\n{}\n", message.yellow());
}

/// Display an error message to the user in red with padding
///
/// # Example
/// ```ignore
/// output::error("Error: malformed wire message: EOF while parsing");
/// ```
pub fn error(message: &str) {
    eprintln!("\n{}\n", message.red());
}
