//! Journal voucher command handlers.

use serde_json::{Value, json};

use ledgerdesk_core::{
    DraftRows, EntityForm, EntityId, FormProps, MutationOptions, QueryOptions, Session, Voucher,
    VoucherEntryRequest,
};

use crate::cli::{GlobalOpts, VouchersArgs, VouchersCommand};
use crate::error::CliError;
use crate::output;

use super::list::{self, Listing};
use super::util;

// ── Table ───────────────────────────────────────────────────────────

pub const LISTING: Listing<Voucher> = Listing {
    table_id: "voucher",
    columns: &[
        "id",
        "voucher_no",
        "entry_date",
        "narration",
        "status",
        "debit",
        "credit",
        "created_by",
    ],
    cell,
};

fn cell(v: &Voucher, column: &str) -> String {
    match column {
        "id" => v.id.to_string(),
        "voucher_no" => v.voucher_no.clone(),
        "entry_date" => v.entry_date.to_string(),
        "narration" => v.narration.clone(),
        "status" => v.status.to_string(),
        "debit" => total(v.total_debit()),
        "credit" => total(v.total_credit()),
        "created_by" => v.created_by.as_ref().map(|u| u.name.clone()).unwrap_or_default(),
        _ => String::new(),
    }
}

fn total(sum: Option<u64>) -> String {
    sum.map_or_else(|| "overflow".into(), |t| t.to_string())
}

fn detail(v: &Voucher) -> String {
    let mut lines = vec![
        format!("ID:        {}", v.id),
        format!("Number:    {}", v.voucher_no),
        format!("Date:      {}", v.entry_date),
        format!("Status:    {}", v.status),
        format!("Narration: {}", if v.narration.is_empty() { "-" } else { &v.narration }),
        String::new(),
    ];
    for entry in &v.entries {
        let account = entry
            .account
            .as_ref()
            .map_or_else(|| entry.account_id.to_string(), |a| a.name.clone());
        lines.push(format!(
            "  {account:<32} {:>12} {:>12}  {}",
            entry.debit, entry.credit, entry.description
        ));
    }
    lines.push(format!(
        "  {:<32} {:>12} {:>12}",
        "Total",
        total(v.total_debit()),
        total(v.total_credit())
    ));
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: VouchersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let layer = session.vouchers();

    match args.command {
        VouchersCommand::List(list_args) => list::run(&layer, &LISTING, &list_args, global).await,

        VouchersCommand::Get { id } => {
            let id = EntityId::from(id);
            let result = layer.query_by_id(&id, QueryOptions::default()).fetch().await;
            if let Some(err) = result.error {
                return Err(err.into());
            }
            let voucher = Option::as_ref(&result.data).ok_or_else(|| CliError::NotFound {
                message: format!("Voucher {id} not found"),
            })?;
            print_voucher(voucher, global)
        }

        VouchersCommand::Create {
            from_file,
            date,
            narration,
            line,
        } => {
            let mut drafts = DraftRows::new();
            let values = match from_file {
                Some(path) => util::read_json_file(&path)?,
                None => {
                    for spec in &line {
                        drafts.add(parse_line(spec)?);
                    }
                    let entries: Vec<&VoucherEntryRequest> =
                        drafts.pending().map(|row| &row.value).collect();
                    let mut values = json!({ "entries": entries });
                    if let Some(ref date) = date {
                        values["entry_date"] = json!(util::parse_date("date", date)?);
                    }
                    if let Some(narration) = narration {
                        values["narration"] = Value::String(narration);
                    }
                    values
                }
            };

            let mut form = EntityForm::new(layer, None, FormProps::default().default_values(values))?;
            let voucher = form.submit().await?;

            // Lines come back in submission order.
            let row_ids: Vec<_> = drafts.iter().map(|row| row.row_id).collect();
            for (row_id, entry) in row_ids.into_iter().zip(&voucher.entries) {
                drafts.reconcile(row_id, entry.id.clone());
            }
            tracing::debug!(
                saved = drafts.len(),
                pending = drafts.pending().count(),
                "voucher lines reconciled"
            );

            print_voucher(&voucher, global)
        }

        VouchersCommand::Delete { id } => {
            if !util::confirm(&format!("Delete voucher {id}?"), global.yes)? {
                return Ok(());
            }
            layer
                .delete_mutation(MutationOptions::new())
                .mutate(EntityId::from(id))
                .await?;
            Ok(())
        }

        VouchersCommand::DeleteMany(args) => {
            let ids = util::parse_ids(&args.ids);
            if !util::confirm(&format!("Delete {} vouchers?", ids.len()), global.yes)? {
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

fn print_voucher(voucher: &Voucher, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(global.output, voucher, detail, |v| v.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// `ACCOUNT:DEBIT:CREDIT[:DESCRIPTION]`, amounts in minor units.
fn parse_line(spec: &str) -> Result<VoucherEntryRequest, CliError> {
    let invalid = |reason: String| CliError::Validation {
        field: "line".into(),
        reason,
    };
    let mut parts = spec.splitn(4, ':');
    let (Some(account), Some(debit), Some(credit)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid(format!("expected ACCOUNT:DEBIT:CREDIT, got '{spec}'")));
    };
    let amount = |raw: &str| -> Result<u64, CliError> {
        if raw.is_empty() {
            return Ok(0);
        }
        raw.parse()
            .map_err(|_| invalid(format!("'{raw}' is not an amount in minor units")))
    };
    Ok(VoucherEntryRequest {
        account_id: account.to_owned(),
        debit: amount(debit)?,
        credit: amount(credit)?,
        description: parts.next().unwrap_or_default().to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn line_spec_parses_amounts_and_description() {
        let line = parse_line("1001:5000::Interest: March").unwrap();
        assert_eq!(line.account_id, "1001");
        assert_eq!(line.debit, 5000);
        assert_eq!(line.credit, 0);
        assert_eq!(line.description, "Interest: March");
    }

    #[test]
    fn line_spec_rejects_bad_amounts() {
        assert!(parse_line("1001:12.50:0").is_err());
        assert!(parse_line("1001:100").is_err());
    }

    #[test]
    fn voucher_cells_show_totals() {
        let voucher: Voucher = serde_json::from_value(json!({
            "id": "v1",
            "voucher_no": "JV-0001",
            "entry_date": "2025-03-31",
            "entries": [
                { "id": "e1", "account_id": "1001", "debit": 5000 },
                { "id": "e2", "account_id": "4001", "credit": 5000 }
            ]
        }))
        .unwrap();
        assert_eq!(cell(&voucher, "debit"), "5000");
        assert_eq!(cell(&voucher, "status"), "draft");
        assert!(detail(&voucher).contains("Total"));
    }
}
