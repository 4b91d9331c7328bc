//! Output formatting utilities.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::OutputFormat;

/// Format a value for non-table output
pub fn format_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(data)?),
        OutputFormat::Table => Ok(serde_json::to_string_pretty(data)?),
    }
}

/// Print success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

/// Print table
pub fn print_table<T: Tabled>(items: Vec<T>) {
    if items.is_empty() {
        print_info("No records found");
        return;
    }

    let table = Table::new(items);
    println!("{}", table);
}

/// Shorten `text` to `max` characters for table cells
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("ünïcödé", 4), "ünï…");
    }

    #[test]
    fn test_json_output_is_single_line() {
        let out = format_output(&serde_json::json!({"a": 1, "b": [1, 2]}), OutputFormat::Json).unwrap();
        assert!(!out.contains('\n'));
    }
}
