//! User-facing output.
//!
//! This module handles:
//! - Colored console lines and JSON output for results
//! - Progress bars driven by sync events

pub mod console;
pub mod progress;

pub use console::ConsoleOutput;
pub use progress::ProgressObserver;
