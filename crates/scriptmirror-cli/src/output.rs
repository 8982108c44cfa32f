//! Output formatting for human and JSON consumers
//!
//! Human output goes to stdout with status glyphs; errors and warnings go
//! to stderr. In JSON mode only structured documents reach stdout, so the
//! output can be piped straight into `jq`.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    /// Renders rows under the given column headers
    fn table(&self, headers: &[&str], rows: &[Vec<String>]);
    fn print_json(&self, value: &Value);
}

pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }

    fn info(&self, message: &str) {
        println!("  {message}");
    }

    fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        for line in render_table(headers, rows) {
            println!("  {line}");
        }
    }

    fn print_json(&self, _value: &Value) {}
}

/// Emits one JSON document per call; plain info lines are dropped
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({ "success": true, "message": message }));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", json!({ "success": false, "error": message }));
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", json!({ "level": "warning", "message": message }));
    }

    fn info(&self, _message: &str) {}

    fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        self.print_json(&table_to_json(headers, rows));
    }

    fn print_json(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("{}", json!({ "success": false, "error": e.to_string() })),
        }
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

/// Left-aligned columns sized to their widest cell; trailing padding trimmed
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_row = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_row(headers.to_vec()));
    for row in rows {
        lines.push(format_row(row.iter().map(String::as_str).collect()));
    }
    lines
}

/// One object per row keyed by the lowercased header
fn table_to_json(headers: &[&str], rows: &[Vec<String>]) -> Value {
    let objects = rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = headers
                .iter()
                .zip(row)
                .map(|(header, cell)| (header.to_lowercase(), Value::String(cell.clone())))
                .collect();
            Value::Object(object)
        })
        .collect();
    Value::Array(objects)
}
