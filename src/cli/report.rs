use chrono::{Datelike, NaiveDate};
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::parse_month_opt;
use crate::error::{ContasError, Result};
use crate::fmt::money;
use crate::installments::shift_months;
use crate::settings::load_settings;
use crate::store::{self, get_connection};
use crate::summary::summarize;

fn month_window(year: i32, month: u32) -> (NaiveDate, NaiveDate) {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    let last = shift_months(first, 1) - chrono::Duration::days(1);
    (first, last)
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ContasError::Other(format!("Invalid date '{raw}' (expected YYYY-MM-DD)")))
}

/// Resolve the filter flags to one inclusive window. Explicit from/to
/// win, then --month, then --year; with nothing given the current
/// calendar month is summarized. A missing from/to side stays `None`
/// (open bound); sentinel dates like `NaiveDate::MAX` must never reach
/// the store, whose text columns sort extreme years incorrectly.
fn resolve_window(
    month: &Option<String>,
    year: Option<i32>,
    from_date: &Option<String>,
    to_date: &Option<String>,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
    if from_date.is_some() || to_date.is_some() {
        let from = from_date.as_deref().map(parse_date).transpose()?;
        let to = to_date.as_deref().map(parse_date).transpose()?;
        return Ok((from, to));
    }
    let (my, mm) = parse_month_opt(month);
    if let (Some(y), Some(m)) = (my, mm) {
        let (from, to) = month_window(y, m);
        return Ok((Some(from), Some(to)));
    }
    if let Some(y) = year {
        return Ok((
            NaiveDate::from_ymd_opt(y, 1, 1),
            NaiveDate::from_ymd_opt(y, 12, 31),
        ));
    }
    let today = chrono::Local::now().date_naive();
    let (from, to) = month_window(today.year(), today.month());
    Ok((Some(from), Some(to)))
}

fn window_label(from: Option<NaiveDate>, to: Option<NaiveDate>) -> String {
    match (from, to) {
        (Some(f), Some(t)) => format!("{f} to {t}"),
        (Some(f), None) => format!("from {f}"),
        (None, Some(t)) => format!("through {t}"),
        (None, None) => "all time".to_string(),
    }
}

pub fn run(
    month: Option<String>,
    year: Option<i32>,
    from_date: Option<String>,
    to_date: Option<String>,
) -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&settings.db_path())?;
    let (from, to) = resolve_window(&month, year, &from_date, &to_date)?;

    let transactions = store::find_many(&conn, from, to)?;
    let summary = summarize(
        &transactions,
        from.unwrap_or(NaiveDate::MIN),
        to.unwrap_or(NaiveDate::MAX),
        &settings.anomaly_config(),
    );

    let mut table = Table::new();
    table.set_header(vec!["", "Amount"]);
    table.add_row(vec![
        Cell::new("Income".green().bold()),
        Cell::new(money(summary.total_income)),
    ]);
    table.add_row(vec![
        Cell::new("Expenses".red().bold()),
        Cell::new(money(summary.total_expenses)),
    ]);
    let balance_label = if summary.balance >= 0.0 {
        "Balance".green().bold()
    } else {
        "Balance".red().bold()
    };
    table.add_row(vec![Cell::new(balance_label), Cell::new(money(summary.balance))]);
    table.add_row(vec![
        Cell::new("Savings rate"),
        Cell::new(match summary.savings_rate {
            Some(rate) => format!("{:.1}%", rate * 100.0),
            None => "n/a".to_string(),
        }),
    ]);
    println!("Summary {}\n{table}", window_label(from, to));

    if !summary.categories.is_empty() {
        let mut ctable = Table::new();
        ctable.set_header(vec!["Category", "Amount", "%", "Count"]);
        for item in &summary.categories {
            let pct = if summary.total_expenses > 0.0 {
                item.amount / summary.total_expenses * 100.0
            } else {
                0.0
            };
            ctable.add_row(vec![
                Cell::new(&item.category),
                Cell::new(money(item.amount)),
                Cell::new(format!("{pct:.1}%")),
                Cell::new(item.transaction_count),
            ]);
        }
        println!("\nExpenses by Category\n{ctable}");
    }

    for alert in &summary.alerts {
        println!("{} {alert}", "!".yellow().bold());
    }

    if !summary.anomalies.is_empty() {
        let mut atable = Table::new();
        atable.set_header(vec!["Date", "Description", "Amount", "Z"]);
        for a in &summary.anomalies {
            atable.add_row(vec![
                Cell::new(a.date),
                Cell::new(&a.description),
                Cell::new(money(a.amount)),
                Cell::new(format!("{:.1}", a.z_score)),
            ]);
        }
        println!("\nUnusual Expenses\n{atable}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_window_clamps_end() {
        let (from, to) = month_window(2025, 2);
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[test]
    fn test_resolve_window_precedence() {
        let (from, to) = resolve_window(
            &Some("2025-03".to_string()),
            Some(2024),
            &Some("2025-01-10".to_string()),
            &None,
        )
        .unwrap();
        // Explicit from/to beats month and year.
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 1, 10));
        assert_eq!(to, None);

        let (from, to) = resolve_window(&Some("2025-03".to_string()), Some(2024), &None, &None).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 3, 31));

        let (from, to) = resolve_window(&None, Some(2024), &None, &None).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 12, 31));
    }

    #[test]
    fn test_open_ended_sides_stay_open() {
        // A one-sided window must reach the store as an open bound, not
        // a sentinel date.
        let (from, to) =
            resolve_window(&None, None, &Some("2025-01-01".to_string()), &None).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(to, None);

        let (from, to) =
            resolve_window(&None, None, &None, &Some("2025-06-30".to_string())).unwrap();
        assert_eq!(from, None);
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 6, 30));
    }

    #[test]
    fn test_window_label() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(window_label(Some(d(2025, 1, 1)), None), "from 2025-01-01");
        assert_eq!(window_label(None, Some(d(2025, 6, 30))), "through 2025-06-30");
        assert_eq!(window_label(None, None), "all time");
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("2025-01-10").is_ok());
        assert!(parse_date("10/01/2025").is_err());
    }
}
