//! Output formatters for CLI commands.
//!
//! Every report is a `Serialize` value rendered through `serde_json::Value`,
//! so object keys come out sorted. `json` prints the value as is. `text`
//! flattens it into `path=value` lines for scripts, and `pretty` renders an
//! indented, colored tree.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use tarn_core::cli::OutputFormat;

/// Formats data according to the output format.
///
/// # Examples
///
/// ```
/// use tarn_cli::formatters::format_output;
/// use tarn_core::cli::OutputFormat;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct CallResult {
///     export: String,
///     results: Vec<String>,
/// }
///
/// let result = CallResult {
///     export: "add".to_string(),
///     results: vec!["5:i32".to_string()],
/// };
///
/// let output = format_output(&result, OutputFormat::Text)?;
/// assert_eq!(output, "export=add\nresults.0=5:i32");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn format_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::Text => Ok(text(&serde_json::to_value(data)?)),
        OutputFormat::Pretty => Ok(pretty(&serde_json::to_value(data)?)),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text(value: &Value) -> String {
    let mut lines = Vec::new();
    flatten(value, "", &mut lines);
    lines.join("\n")
}

fn flatten(value: &Value, path: &str, lines: &mut Vec<String>) {
    let child = |key: &str| {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{path}.{key}")
        }
    };
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                flatten(item, &child(key), lines);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(item, &child(&i.to_string()), lines);
            }
        }
        other => lines.push(format!("{path}={}", scalar(other))),
    }
}

fn pretty(value: &Value) -> String {
    let mut out = String::new();
    render(value, 0, &mut out);
    out.trim_end().to_string()
}

fn colored_scalar(value: &Value) -> String {
    match value {
        Value::Null => "none".dimmed().to_string(),
        Value::Bool(b) => b.to_string().yellow().to_string(),
        Value::Number(n) => n.to_string().cyan().to_string(),
        Value::String(s) => s.green().to_string(),
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn render(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                let key = key.blue().bold();
                if is_empty_container(item) {
                    let _ = writeln!(out, "{pad}{key}: {}", "(empty)".dimmed());
                } else if item.is_object() || item.is_array() {
                    let _ = writeln!(out, "{pad}{key}:");
                    render(item, indent + 1, out);
                } else {
                    let _ = writeln!(out, "{pad}{key}: {}", colored_scalar(item));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if item.is_object() || item.is_array() {
                    let _ = writeln!(out, "{pad}-");
                    render(item, indent + 1, out);
                } else {
                    let _ = writeln!(out, "{pad}- {}", colored_scalar(item));
                }
            }
        }
        scalar => {
            let _ = writeln!(out, "{pad}{}", colored_scalar(scalar));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Export {
        name: String,
        index: u32,
    }

    #[derive(Serialize)]
    struct Report {
        module: String,
        start: Option<u32>,
        exports: Vec<Export>,
        imports: Vec<String>,
    }

    fn report() -> Report {
        Report {
            module: "game".to_string(),
            start: None,
            exports: vec![
                Export {
                    name: "init".to_string(),
                    index: 3,
                },
                Export {
                    name: "frame".to_string(),
                    index: 4,
                },
            ],
            imports: Vec::new(),
        }
    }

    #[test]
    fn test_json_format() {
        let output = format_output(&report(), OutputFormat::Json).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["exports"][1]["name"], "frame");
        assert!(parsed["start"].is_null());
    }

    #[test]
    fn test_text_format_flattens_paths() {
        let output = format_output(&report(), OutputFormat::Text).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(
            lines,
            [
                "exports.0.index=3",
                "exports.0.name=init",
                "exports.1.index=4",
                "exports.1.name=frame",
                "module=game",
                "start=null",
            ]
        );
    }

    #[test]
    fn test_pretty_format() {
        colored::control::set_override(false);
        let output = format_output(&report(), OutputFormat::Pretty).unwrap();
        assert!(output.starts_with("exports:\n  -\n    index: 3\n    name: init\n"));
        assert!(output.contains("\nimports: (empty)\nmodule: game\n"));
        assert!(output.ends_with("start: none"));
    }

    #[test]
    fn test_scalar_top_level() {
        assert_eq!(format_output(&42, OutputFormat::Text).unwrap(), "=42");
        colored::control::set_override(false);
        assert_eq!(format_output(&"ok", OutputFormat::Pretty).unwrap(), "ok");
    }
}
