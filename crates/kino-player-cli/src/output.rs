//! Output formatting for CLI

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Render rows as JSON or a table; `None` for text, which each command
/// prints itself
pub fn format_rows<T: Serialize + Tabled>(rows: &[T], format: OutputFormat) -> Option<String> {
    match format {
        OutputFormat::Json => {
            Some(serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string()))
        }
        OutputFormat::Table => Some(Table::new(rows).with(Style::rounded()).to_string()),
        OutputFormat::Text => None,
    }
}
