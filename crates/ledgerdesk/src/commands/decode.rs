//! `decode`: show what an encoded `filter` / `sort` query parameter says.

use serde_json::json;

use ledgerdesk_core::{FilterDescriptor, SortDescriptor};

use crate::cli::{DecodeArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &DecodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let filter = args
        .filter
        .as_deref()
        .map(FilterDescriptor::decode)
        .transpose()
        .map_err(|e| invalid("filter", &e))?;
    let sort = args
        .sort
        .as_deref()
        .map(SortDescriptor::decode)
        .transpose()
        .map_err(|e| invalid("sort", &e))?;

    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => describe(filter.as_ref(), sort.as_ref()),
        OutputFormat::Json => serde_json::to_string_pretty(&json!({ "filter": filter, "sort": sort }))?,
        OutputFormat::JsonCompact => serde_json::to_string(&json!({ "filter": filter, "sort": sort }))?,
        OutputFormat::Yaml => serde_yaml::to_string(&json!({ "filter": filter, "sort": sort }))?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

fn invalid(field: &str, err: &impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: err.to_string(),
    }
}

fn describe(filter: Option<&FilterDescriptor>, sort: Option<&SortDescriptor>) -> String {
    let mut lines = Vec::new();
    if let Some(filter) = filter {
        lines.push("filter:".to_owned());
        if filter.is_empty() {
            lines.push("  (none)".to_owned());
        }
        for (field, predicate) in filter.iter() {
            let mode = serde_json::to_value(predicate.mode).unwrap_or_default();
            let data_type = serde_json::to_value(predicate.data_type).unwrap_or_default();
            lines.push(format!(
                "  {field} {} {} ({})",
                mode.as_str().unwrap_or("?"),
                predicate.value,
                data_type.as_str().unwrap_or("?")
            ));
        }
    }
    if let Some(sort) = sort {
        lines.push("sort:".to_owned());
        if sort.is_empty() {
            lines.push("  (none)".to_owned());
        }
        for (i, key) in sort.fields().iter().enumerate() {
            let direction = serde_json::to_value(key.direction).unwrap_or_default();
            lines.push(format!(
                "  {}. {} {}",
                i + 1,
                key.field,
                direction.as_str().unwrap_or("?")
            ));
        }
    }
    lines.join("\n")
}
