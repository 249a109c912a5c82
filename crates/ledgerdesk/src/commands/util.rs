//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use ledgerdesk_core::{
    EntityId, FilterDataType, FilterDescriptor, FilterField, FilterMode, SortDescriptor,
    SortDirection,
};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Read and parse a JSON file for `--from-file` flags.
pub fn read_json_file(path: &Path) -> Result<Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "from-file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

pub fn parse_ids(ids: &[String]) -> Vec<EntityId> {
    ids.iter().map(|id| EntityId::from(id.as_str())).collect()
}

pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("expected YYYY-MM-DD, got '{raw}'"),
    })
}

/// Spinner on stderr while a request is in flight. Hidden for scripted
/// output, quiet mode and non-terminals.
pub fn spinner(global: &GlobalOpts, message: &str) -> ProgressBar {
    if global.quiet
        || global.output != OutputFormat::Table
        || !std::io::stderr().is_terminal()
    {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

// ── Filter / sort flags ─────────────────────────────────────────────

/// `--filter` values, one per field. A later flag for the same field wins.
pub fn parse_filters(specs: &[String]) -> Result<FilterDescriptor, CliError> {
    let mut filter = FilterDescriptor::new();
    for spec in specs {
        let (field, predicate) = parse_filter(spec)?;
        filter.insert(field, predicate);
    }
    Ok(filter)
}

/// `FIELD:MODE:VALUE`. The value may itself contain colons.
pub fn parse_filter(spec: &str) -> Result<(String, FilterField), CliError> {
    let invalid = |reason: String| CliError::Validation {
        field: "filter".into(),
        reason,
    };
    let mut parts = spec.splitn(3, ':');
    let (Some(field), Some(mode), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid(format!("expected FIELD:MODE:VALUE, got '{spec}'")));
    };
    if field.is_empty() {
        return Err(invalid(format!("missing field name in '{spec}'")));
    }
    let mode = parse_mode(mode).ok_or_else(|| invalid(format!("unknown filter mode '{mode}'")))?;

    let predicate = match mode {
        FilterMode::Between => {
            let Some((low, high)) = value.split_once("..") else {
                return Err(invalid(format!("between expects LOW..HIGH, got '{value}'")));
            };
            let data_type = infer_type(low);
            FilterField::new(
                mode,
                data_type,
                Value::Array(vec![typed_value(low, data_type), typed_value(high, data_type)]),
            )
        }
        FilterMode::In => {
            let items: Vec<&str> = value.split(',').collect();
            let data_type = items.first().copied().map_or(FilterDataType::Text, infer_type);
            let items = items.iter().map(|v| typed_value(v, data_type)).collect();
            // A closed set of text values is what the server calls an enum.
            let data_type = match data_type {
                FilterDataType::Text => FilterDataType::Enum,
                other => other,
            };
            FilterField::new(mode, data_type, Value::Array(items))
        }
        _ => {
            let data_type = infer_type(value);
            FilterField::new(mode, data_type, typed_value(value, data_type))
        }
    };
    Ok((field.to_owned(), predicate))
}

/// Accepts `starts-with`, `starts_with` and `startsWith` alike.
fn parse_mode(raw: &str) -> Option<FilterMode> {
    let normalized: String = raw
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    Some(match normalized.as_str() {
        "eq" | "equal" | "equals" => FilterMode::Equal,
        "ne" | "notequal" => FilterMode::NotEqual,
        "contains" => FilterMode::Contains,
        "startswith" => FilterMode::StartsWith,
        "endswith" => FilterMode::EndsWith,
        "gt" => FilterMode::Gt,
        "gte" => FilterMode::Gte,
        "lt" => FilterMode::Lt,
        "lte" => FilterMode::Lte,
        "between" => FilterMode::Between,
        "in" => FilterMode::In,
        _ => return None,
    })
}

fn infer_type(value: &str) -> FilterDataType {
    if value.parse::<f64>().is_ok_and(f64::is_finite) {
        FilterDataType::Number
    } else if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        FilterDataType::Date
    } else if value == "true" || value == "false" {
        FilterDataType::Boolean
    } else {
        FilterDataType::Text
    }
}

fn typed_value(raw: &str, data_type: FilterDataType) -> Value {
    match data_type {
        FilterDataType::Number => raw
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| raw.parse::<f64>().map(Value::from))
            .unwrap_or_else(|_| Value::from(raw)),
        FilterDataType::Boolean => Value::Bool(raw == "true"),
        _ => Value::from(raw),
    }
}

/// `--sort` values in precedence order: `FIELD` or `FIELD:asc|desc`.
pub fn parse_sorts(specs: &[String]) -> Result<SortDescriptor, CliError> {
    specs.iter().try_fold(SortDescriptor::new(), |sort, spec| {
        let (field, direction) = match spec.split_once(':') {
            None => (spec.as_str(), SortDirection::Asc),
            Some((field, dir)) => match dir.to_ascii_lowercase().as_str() {
                "asc" => (field, SortDirection::Asc),
                "desc" => (field, SortDirection::Desc),
                _ => {
                    return Err(CliError::Validation {
                        field: "sort".into(),
                        reason: format!("direction must be asc or desc, got '{dir}'"),
                    });
                }
            },
        };
        if field.is_empty() {
            return Err(CliError::Validation {
                field: "sort".into(),
                reason: format!("missing field name in '{spec}'"),
            });
        }
        Ok(sort.then(field, direction))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_spec_infers_types() {
        let (field, f) = parse_filter("name:contains:year").unwrap();
        assert_eq!(field, "name");
        assert_eq!(f, FilterField::new(FilterMode::Contains, FilterDataType::Text, "year"));

        let (_, f) = parse_filter("entry_date:gte:2025-01-01").unwrap();
        assert_eq!(f.data_type, FilterDataType::Date);

        let (_, f) = parse_filter("amount:lt:100").unwrap();
        assert_eq!(f.value, json!(100));
    }

    #[test]
    fn filter_modes_accept_any_casing() {
        for mode in ["starts-with", "starts_with", "startsWith"] {
            let (_, f) = parse_filter(&format!("name:{mode}:Ne")).unwrap();
            assert_eq!(f.mode, FilterMode::StartsWith);
        }
        assert!(parse_filter("name:like:x").is_err());
        assert!(parse_filter("name:contains").is_err());
    }

    #[test]
    fn between_and_in_build_arrays() {
        let (_, f) = parse_filter("entry_date:between:2025-01-01..2025-12-31").unwrap();
        assert_eq!(f.value, json!(["2025-01-01", "2025-12-31"]));
        assert_eq!(f.data_type, FilterDataType::Date);

        let (_, f) = parse_filter("status:in:draft,posted").unwrap();
        assert_eq!(f.value, json!(["draft", "posted"]));
        assert_eq!(f.data_type, FilterDataType::Enum);
    }

    #[test]
    fn value_keeps_embedded_colons() {
        let (_, f) = parse_filter("narration:equal:ref:42").unwrap();
        assert_eq!(f.value, json!("ref:42"));
    }

    #[test]
    fn sorts_keep_flag_order() {
        let sort = parse_sorts(&["entry_date:desc".into(), "name".into()]).unwrap();
        assert_eq!(sort, SortDescriptor::new().desc("entry_date").asc("name"));
        assert!(parse_sorts(&["name:up".into()]).is_err());
    }
}
