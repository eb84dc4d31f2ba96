//! Colored console output for validation results.

use crate::types::{NameCheckError, ValidationResult, ValidationStatus};
use colored::Colorize;

const TICK: &str = if cfg!(windows) { "√" } else { "✔" };
const CROSS: &str = if cfg!(windows) { "×" } else { "✖" };

/// Console output handler with colors and formatting.
pub struct ConsoleOutput {
    json_mode: bool,
}

impl ConsoleOutput {
    /// Create a new console output handler.
    pub fn new(json_mode: bool) -> Self {
        Self { json_mode }
    }

    /// Print a validation result.
    pub fn print_result(&self, result: &ValidationResult) {
        if self.json_mode {
            if let Ok(json) = serde_json::to_string_pretty(result) {
                println!("{}", json);
            }
            return;
        }

        for line in render_lines(result) {
            println!("{}", line);
        }
    }

    /// Print an error that stopped validation.
    pub fn print_error(&self, name: &str, error: &NameCheckError) {
        if self.json_mode {
            let body = serde_json::json!({
                "query_name": name,
                "error": error.to_string(),
                "transient": error.is_transient(),
            });
            println!("{}", body);
            return;
        }

        eprintln!(
            "{}  Could not validate \"{}\": {}",
            CROSS.red(),
            name,
            error
        );
    }
}

/// Human readable lines for a result.
pub fn render_lines(result: &ValidationResult) -> Vec<String> {
    let name = &result.query_name;
    match result.status {
        ValidationStatus::Valid => {
            vec![format!("{}  \"{}\" is a valid name.", TICK.green(), name)]
        }
        ValidationStatus::Available => {
            vec![format!("{}  \"{}\" is available.", TICK.green(), name)]
        }
        ValidationStatus::Invalid => {
            let mut lines = vec![format!("{}  \"{}\" is invalid:", CROSS.red(), name)];
            lines.extend(result.syntax_errors.iter().cloned());
            lines
        }
        ValidationStatus::Unavailable => {
            let mut lines = vec![format!("{}  \"{}\" is unavailable:", CROSS.red(), name)];
            lines.extend(
                result
                    .conflicting_names
                    .iter()
                    .map(|existing| format!("{} is taken.", existing)),
            );
            lines
        }
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(false)
    }
}
