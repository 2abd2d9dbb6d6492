use comfy_table::{Cell, Table};

use crate::error::{ContasError, Result};
use crate::models::AccountType;
use crate::settings::load_settings;
use crate::store::{self, get_connection};

#[allow(clippy::too_many_arguments)]
pub fn add(
    name: &str,
    account_type: &str,
    institution: Option<&str>,
    last_four: Option<&str>,
    closing_day: Option<u32>,
    due_day: Option<u32>,
) -> Result<()> {
    let Some(account_type) = AccountType::parse(account_type) else {
        return Err(ContasError::Other(format!(
            "Unknown account type '{account_type}' (expected checking, savings, credit_card, investment, cash or other)"
        )));
    };
    if let Some(day) = closing_day.or(due_day) {
        if !(1..=31).contains(&day) {
            return Err(ContasError::Other(format!("Invalid cycle day: {day}")));
        }
    }
    let conn = get_connection(&load_settings().db_path())?;
    let account = store::create_account(
        &conn,
        name,
        account_type,
        institution,
        last_four,
        closing_day,
        due_day,
    )?;
    println!("Added account: {}", account.name);
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&load_settings().db_path())?;
    let accounts = store::find_accounts(&conn)?;

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Name", "Type", "Institution", "Last Four", "Closing", "Due", "Status",
    ]);
    for a in accounts {
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(&a.name),
            Cell::new(a.account_type.as_str()),
            Cell::new(a.institution.unwrap_or_default()),
            Cell::new(a.card_last_digits.unwrap_or_default()),
            Cell::new(a.closing_day.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(a.due_day.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(a.status.as_str()),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}
