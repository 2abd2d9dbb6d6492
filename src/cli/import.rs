use std::path::PathBuf;

use colored::Colorize;
use dialoguer::{Confirm, Select};

use crate::error::{ContasError, Result};
use crate::flatfile::FlatFileOptions;
use crate::fmt::money;
use crate::models::AccountType;
use crate::pipeline::{self, DuplicateDecision, ImportOptions, PreparedImport, ResolvedAccount};
use crate::settings::load_settings;
use crate::store::{self, get_connection};

pub fn run(
    file: &str,
    account: Option<&str>,
    delimiter: Option<char>,
    no_header: bool,
    yes: bool,
) -> Result<()> {
    let path = PathBuf::from(file);
    let settings = load_settings();
    let mut conn = get_connection(&settings.db_path())?;

    let opts = ImportOptions {
        account: account.map(str::to_string),
        flat: FlatFileOptions {
            delimiter: delimiter_byte(delimiter)?,
            has_header: !no_header,
        },
        matching: settings.match_config(),
        ..Default::default()
    };
    let mut prepared = pipeline::prepare(&conn, &path, &opts)?;

    if prepared.already_imported {
        println!(
            "{}",
            "This exact file has already been imported (matching checksum).".yellow()
        );
        let proceed = !yes
            && Confirm::new()
                .with_prompt("Import it again anyway?")
                .default(false)
                .interact()
                .unwrap_or(false);
        if !proceed {
            return Ok(());
        }
    }

    // A proposed account means nothing matched; creating it and
    // re-preparing lets installments use the card's billing cycle.
    if let ResolvedAccount::Proposed(name) = prepared.account.clone() {
        let create = !yes
            && Confirm::new()
                .with_prompt(format!("No account matched. Create '{name}'?"))
                .default(true)
                .interact()
                .unwrap_or(false);
        if create {
            let statement = prepared.statement.clone().unwrap_or_default();
            let account_type = if statement.card_last_digits.is_some() {
                AccountType::CreditCard
            } else {
                AccountType::Other
            };
            store::create_account(
                &conn,
                &name,
                account_type,
                statement.institution.as_deref(),
                statement.card_last_digits.as_deref(),
                None,
                None,
            )?;
            println!("Added account: {name}");
            prepared = pipeline::prepare(&conn, &path, &opts)?;
        }
    }

    report_findings(&prepared);

    let decision = if prepared.duplicates.is_empty() {
        DuplicateDecision::Discard
    } else if yes {
        println!(
            "{} possible duplicates will be skipped",
            prepared.duplicates.len()
        );
        DuplicateDecision::Discard
    } else {
        prompt_duplicate_decision(&prepared)?
    };

    let written = pipeline::commit(&mut conn, &prepared, decision)?;
    let skipped = prepared.drafts.len() - written;
    println!("{written} imported, {skipped} skipped (duplicates)");
    Ok(())
}

/// The csv reader takes a single byte; anything outside ASCII would be
/// silently truncated by a plain cast.
fn delimiter_byte(delimiter: Option<char>) -> Result<u8> {
    match delimiter {
        None => Ok(b','),
        Some(c) if c.is_ascii() => Ok(c as u8),
        Some(c) => Err(ContasError::Other(format!(
            "Delimiter '{c}' is not an ASCII character"
        ))),
    }
}

fn report_findings(prepared: &PreparedImport) {
    if let ResolvedAccount::Linked(account) = &prepared.account {
        println!("Importing into account: {}", account.name);
    }
    if let Some(summary) = &prepared.sheet_summary {
        println!(
            "Parsed {} transactions across {} month tabs ({} in, {} out)",
            summary.total_transactions,
            summary.by_month.len(),
            money(summary.total_income),
            money(summary.total_expense)
        );
    }
    for payment in &prepared.skipped_payments {
        println!(
            "{} {}",
            "Excluded as statement payment:".yellow(),
            payment
        );
    }
    if prepared.refund_count > 0 {
        println!("{} refunds recorded as income", prepared.refund_count);
    }
    if prepared.skipped_invalid > 0 {
        println!(
            "{}",
            format!("{} lines skipped (no usable date)", prepared.skipped_invalid).yellow()
        );
    }
    for diag in &prepared.diagnostics {
        println!(
            "{}",
            format!("{} row {}: {}", diag.tab, diag.row, diag.message).yellow()
        );
    }
    for (idx, existing_id) in &prepared.near_matches {
        if let Some(draft) = prepared.drafts.get(*idx) {
            println!(
                "{}",
                format!(
                    "'{}' may match existing entry #{existing_id}; review after import",
                    draft.description
                )
                .yellow()
            );
        }
    }
    println!("{} new transactions staged", prepared.new_count());
}

fn prompt_duplicate_decision(prepared: &PreparedImport) -> Result<DuplicateDecision> {
    println!(
        "{}",
        format!(
            "{} of {} transactions look like duplicates of existing entries",
            prepared.duplicates.len(),
            prepared.drafts.len()
        )
        .yellow()
    );
    let choice = Select::new()
        .with_prompt("How should duplicates be handled?")
        .items(&["Skip duplicates", "Import everything anyway", "Cancel import"])
        .default(0)
        .interact()
        .unwrap_or(2);
    Ok(match choice {
        0 => DuplicateDecision::Discard,
        1 => DuplicateDecision::Force,
        _ => DuplicateDecision::Cancel,
    })
}
