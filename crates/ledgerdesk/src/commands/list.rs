//! Paginated listing shared by every entity: saved table preferences,
//! `--filter`/`--sort` flags, one cached `/search` query.

use serde::Serialize;
use serde::de::DeserializeOwned;

use ledgerdesk_core::{
    CoreError, DataLayer, PageQuery, Paginated, QueryOptions, Record, TableState,
};

use crate::cli::{GlobalOpts, ListArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::{columns, util};

/// How one entity renders as table rows.
pub struct Listing<T> {
    pub table_id: &'static str,
    pub columns: &'static [&'static str],
    pub cell: fn(&T, &str) -> String,
}

pub async fn run<T, R>(
    layer: &DataLayer<T, R>,
    listing: &Listing<T>,
    args: &ListArgs,
    global: &GlobalOpts,
) -> Result<(), CliError>
where
    T: Record + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    R: Serialize + Clone + Send + Sync + 'static,
{
    let mut table: TableState<T> = columns::load_table(listing.table_id, listing.columns)?;

    if args.all {
        let spinner = util::spinner(global, &format!("Loading all {}s", layer.label()));
        let result = layer.query_all(QueryOptions::default()).fetch().await;
        spinner.finish_and_clear();
        if let Some(err) = result.error {
            return Err(err.into());
        }
        return print_rows(&table, listing, &result.data, global);
    }

    if let Some(size) = args.page_size {
        table.set_page_size(size);
    }
    table.set_filter(util::parse_filters(&args.filter)?);
    table.set_sort(util::parse_sorts(&args.sort)?);
    table.set_page_index(args.page.saturating_sub(1));

    if args.explain {
        let out = explain(layer, &table.page_query())?;
        output::print_output(&out, false);
        return Ok(());
    }

    let mut page = fetch_page(layer, &table.page_query(), global).await?;
    // Asked past the end: show the last page instead of an empty one.
    if page.data.is_empty() && page.total_page > 0 && table.sync_with(&page) {
        tracing::info!(
            page_index = table.pagination().page_index,
            "requested page out of range, showing last page"
        );
        page = fetch_page(layer, &table.page_query(), global).await?;
    }

    print_rows(&table, listing, &page.data, global)?;
    if global.output == OutputFormat::Table && !global.quiet {
        eprintln!(
            "Page {} of {} ({} total)",
            page.page_index.saturating_add(1),
            page.total_page.max(1),
            page.total_size
        );
    }
    Ok(())
}

async fn fetch_page<T, R>(
    layer: &DataLayer<T, R>,
    query: &PageQuery,
    global: &GlobalOpts,
) -> Result<Paginated<T>, CliError>
where
    T: Record + DeserializeOwned + Clone + Send + Sync + 'static,
    R: Serialize + Clone + Send + Sync + 'static,
{
    let spinner = util::spinner(global, &format!("Loading {}s", layer.label()));
    let result = layer.query_paginated(query, QueryOptions::default()).fetch().await;
    spinner.finish_and_clear();
    match result.error {
        Some(err) => Err(err.into()),
        None => Ok((*result.data).clone()),
    }
}

fn print_rows<T: Record + Serialize + Clone>(
    table: &TableState<T>,
    listing: &Listing<T>,
    rows: &[T],
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = output::render_list(
        global.output,
        rows,
        &table.visible_columns(),
        listing.cell,
        |r| r.record_id().to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// The request a list would send, with descriptors shown decoded.
fn explain<T, R>(layer: &DataLayer<T, R>, query: &PageQuery) -> Result<String, CliError>
where
    T: Record + DeserializeOwned + Clone + Send + Sync + 'static,
    R: Serialize + Clone + Send + Sync + 'static,
{
    let url = layer
        .api()
        .url(&format!("{}/search", layer.config().url))
        .map_err(CoreError::from)?;
    let params = query.to_params().map_err(CoreError::from)?;

    let mut lines = vec![format!("GET {url}")];
    lines.extend(params.iter().map(|(k, v)| format!("  {k}={v}")));
    if let Some(filter) = &query.filter {
        lines.push(format!("filter: {}", serde_json::to_string(filter)?));
    }
    if let Some(sort) = &query.sort {
        lines.push(format!("sort:   {}", serde_json::to_string(sort)?));
    }
    Ok(lines.join("\n"))
}
