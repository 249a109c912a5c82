//! Holiday command handlers.

use serde_json::{Map, Value, json};

use ledgerdesk_core::{
    EntityForm, EntityId, FormProps, Holiday, MutationOptions, QueryOptions, Session,
};

use crate::cli::{GlobalOpts, HolidaysArgs, HolidaysCommand};
use crate::error::CliError;
use crate::output;

use super::list::{self, Listing};
use super::util;

// ── Table ───────────────────────────────────────────────────────────

pub const LISTING: Listing<Holiday> = Listing {
    table_id: "holiday",
    columns: &["id", "name", "entry_date", "description", "created_by", "created_at"],
    cell,
};

fn cell(h: &Holiday, column: &str) -> String {
    match column {
        "id" => h.id.to_string(),
        "name" => h.name.clone(),
        "entry_date" => h.entry_date.to_string(),
        "description" => h.description.clone(),
        "created_by" => h.created_by.as_ref().map(|u| u.name.clone()).unwrap_or_default(),
        "created_at" => h
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn detail(h: &Holiday) -> String {
    let mut lines = vec![
        format!("ID:          {}", h.id),
        format!("Name:        {}", h.name),
        format!("Date:        {}", h.entry_date),
        format!("Description: {}", if h.description.is_empty() { "-" } else { &h.description }),
    ];
    if let Some(ref user) = h.created_by {
        lines.push(format!("Created by:  {}", user.name));
    }
    if let Some(at) = h.created_at {
        lines.push(format!("Created at:  {}", at.to_rfc3339()));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: HolidaysArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let layer = session.holidays();

    match args.command {
        HolidaysCommand::List(list_args) => list::run(&layer, &LISTING, &list_args, global).await,

        HolidaysCommand::Get { id } => {
            let id = EntityId::from(id);
            let result = layer.query_by_id(&id, QueryOptions::default()).fetch().await;
            if let Some(err) = result.error {
                return Err(err.into());
            }
            let holiday = Option::as_ref(&result.data).ok_or_else(|| CliError::NotFound {
                message: format!("Holiday {id} not found"),
            })?;
            print_holiday(holiday, global)
        }

        HolidaysCommand::Create {
            from_file,
            name,
            date,
            description,
        } => {
            let values = match from_file {
                Some(path) => util::read_json_file(&path)?,
                None => {
                    let mut map = Map::new();
                    if let Some(name) = name {
                        map.insert("name".into(), json!(name));
                    }
                    if let Some(ref date) = date {
                        map.insert("entry_date".into(), json!(util::parse_date("date", date)?));
                    }
                    if let Some(description) = description {
                        map.insert("description".into(), json!(description));
                    }
                    Value::Object(map)
                }
            };

            let mut form = EntityForm::new(layer, None, FormProps::default().default_values(values))?;
            let holiday = form.submit().await?;
            print_holiday(&holiday, global)
        }

        HolidaysCommand::Update {
            id,
            name,
            date,
            description,
        } => {
            let date = date.as_deref().map(|d| util::parse_date("date", d)).transpose()?;

            let mut form = EntityForm::new(layer, Some(EntityId::from(id)), FormProps::default())?;
            form.load().await?;
            form.edit(|values| {
                if let Some(name) = name {
                    values.name = name;
                }
                if date.is_some() {
                    values.entry_date = date;
                }
                if let Some(description) = description {
                    values.description = description;
                }
            })
            .await;
            let holiday = form.submit().await?;
            print_holiday(&holiday, global)
        }

        HolidaysCommand::Delete { id } => {
            if !util::confirm(&format!("Delete holiday {id}?"), global.yes)? {
                return Ok(());
            }
            layer
                .delete_mutation(MutationOptions::new())
                .mutate(EntityId::from(id))
                .await?;
            Ok(())
        }

        HolidaysCommand::DeleteMany(args) => {
            let ids = util::parse_ids(&args.ids);
            if !util::confirm(&format!("Delete {} holidays?", ids.len()), global.yes)? {
                return Ok(());
            }
            layer
                .delete_many_mutation(MutationOptions::new())
                .mutate(ids)
                .await?;
            Ok(())
        }
    }
}

fn print_holiday(holiday: &Holiday, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(global.output, holiday, detail, |h| h.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
