//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, StringsubsArgs};
use crate::error::Result;

/// Result structure for applying a definition.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyResult {
    pub definition: String,
    pub groups_processed: usize,
    pub groups_skipped: usize,
    pub archives_failed: usize,
    pub files: Vec<String>,
    pub duration_ms: u64,
}

/// Result structure for a single-stream replacement.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplaceResult {
    pub input: String,
    pub output: String,
    pub keys: usize,
    pub duration_ms: u64,
}

/// One default property.
#[derive(Debug, Serialize, Deserialize)]
pub struct PropertyRow {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub property_type: String,
    pub description: Option<String>,
}

/// Result structure for listing default properties.
#[derive(Debug, Serialize, Deserialize)]
pub struct DefaultPropertiesResult {
    pub properties: Vec<PropertyRow>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &StringsubsArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &StringsubsArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    if std::any::type_name::<T>().contains("DefaultPropertiesResult") {
        output_properties_human(&value)
    } else {
        output_generic_human(&value)
    }
}

fn output_properties_human(value: &serde_json::Value) -> Result<()> {
    let Some(properties) = value.get("properties").and_then(|v| v.as_array()) else {
        return Ok(());
    };
    if properties.is_empty() {
        println!("No default properties.");
        return Ok(());
    }

    let width = properties
        .iter()
        .filter_map(|p| p.get("key").and_then(|k| k.as_str()))
        .map(|k| k.chars().count())
        .max()
        .unwrap_or(0);
    for property in properties {
        let key = property.get("key").map(format_value).unwrap_or_default();
        let val = property.get("value").map(format_value).unwrap_or_default();
        let kind = property.get("type").map(format_value).unwrap_or_default();
        print!("{key:<width$}  {val}  ({kind})");
        match property.get("description").and_then(|d| d.as_str()) {
            Some(description) => println!("  {description}"),
            None => println!(),
        }
    }
    Ok(())
}

fn output_generic_human(value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                let formatted_val = format_value(val);
                println!("{key}: {formatted_val}");
            }
        }
        _ => {
            let formatted_value = format_value(value);
            println!("{formatted_value}");
        }
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &StringsubsArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(_) => "[object]".to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}
