//! Column order, visibility and page size for list tables, saved per table.

use ledgerdesk_config::tables;
use ledgerdesk_core::{Holiday, Record, TableState, Voucher};

use crate::cli::{ColumnsArgs, ColumnsCommand, GlobalOpts, OutputFormat, TableId};
use crate::error::CliError;
use crate::output;

use super::{holidays, vouchers};

impl TableId {
    pub fn key(self) -> &'static str {
        match self {
            Self::Holiday => holidays::LISTING.table_id,
            Self::Voucher => vouchers::LISTING.table_id,
        }
    }
}

/// Fresh table state for `columns` with saved preferences applied.
pub fn load_table<T: Record + Clone>(
    table_id: &str,
    columns: &[&str],
) -> Result<TableState<T>, CliError> {
    let mut table = TableState::new(columns);
    if let Some(prefs) = tables::load_table_preferences(table_id)? {
        tracing::debug!(table_id, "applying saved table preferences");
        table.apply_preferences(&prefs);
    }
    Ok(table)
}

pub fn handle(args: ColumnsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let table = match &args.command {
        ColumnsCommand::Show { table }
        | ColumnsCommand::Order { table, .. }
        | ColumnsCommand::Hide { table, .. }
        | ColumnsCommand::Unhide { table, .. }
        | ColumnsCommand::PageSize { table, .. }
        | ColumnsCommand::Reset { table } => *table,
    };
    match table {
        TableId::Holiday => apply::<Holiday>(table, holidays::LISTING.columns, args.command, global),
        TableId::Voucher => apply::<Voucher>(table, vouchers::LISTING.columns, args.command, global),
    }
}

fn apply<T: Record + Clone>(
    table_id: TableId,
    columns: &[&str],
    command: ColumnsCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let key = table_id.key();
    let mut table: TableState<T> = load_table(key, columns)?;

    match command {
        ColumnsCommand::Show { .. } => {
            return show(&table, global);
        }
        ColumnsCommand::Order { columns: order, .. } => {
            if let Some(unknown) = order.iter().find(|c| !columns.contains(&c.as_str())) {
                return Err(unknown_column(unknown, columns));
            }
            table.set_column_order(order.as_slice());
        }
        ColumnsCommand::Hide { column, .. } => {
            if !table.set_column_visible(&column, false) {
                return Err(unknown_column(&column, columns));
            }
        }
        ColumnsCommand::Unhide { column, .. } => {
            if !table.set_column_visible(&column, true) {
                return Err(unknown_column(&column, columns));
            }
        }
        ColumnsCommand::PageSize { size, .. } => table.set_page_size(size),
        ColumnsCommand::Reset { .. } => {
            let path = tables::table_preferences_path(key)?;
            if tables::reset_table_preferences_at(&path)? && !global.quiet {
                eprintln!("Reset preferences for {key}");
            }
            return Ok(());
        }
    }

    let path = tables::save_table_preferences(key, &table.preferences())?;
    tracing::debug!(path = %path.display(), "saved table preferences");
    show(&table, global)
}

fn show<T: Record + Clone>(table: &TableState<T>, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match global.output {
        OutputFormat::Plain => table.visible_columns().join("\n"),
        OutputFormat::Table => {
            let lines: Vec<String> = table
                .column_order()
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let mark = if table.is_column_visible(c) { "x" } else { " " };
                    format!("{:>2}. [{mark}] {c}", i + 1)
                })
                .collect();
            format!(
                "{}\nPage size: {}",
                lines.join("\n"),
                table.pagination().page_size
            )
        }
        OutputFormat::Json => serde_json::to_string_pretty(&table.preferences())?,
        OutputFormat::JsonCompact => serde_json::to_string(&table.preferences())?,
        OutputFormat::Yaml => serde_yaml::to_string(&table.preferences())?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

fn unknown_column(column: &str, columns: &[&str]) -> CliError {
    CliError::Validation {
        field: "column".into(),
        reason: format!("unknown column '{column}', expected one of: {}", columns.join(", ")),
    }
}
