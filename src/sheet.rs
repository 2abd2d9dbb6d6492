use std::collections::BTreeMap;
use std::path::Path;

use calamine::Reader;
use log::debug;
use serde::Serialize;

use crate::cell::{coerce, CellScalar, RawCell};
use crate::error::{ContasError, Result};
use crate::models::{Diagnostic, Direction, DraftTransaction};

// ---------------------------------------------------------------------------
// Month tab lookup
// ---------------------------------------------------------------------------

/// Calendar-month lookup table for tab names, pt-BR abbreviations.
/// Matching is case-insensitive; exact token first, then substring for
/// long/accented variants ("Janeiro", "MAR\u{c7}O"). On ambiguity the
/// first token in this list wins.
const MONTH_TABS: [(&str, u32); 12] = [
    ("JAN", 1),
    ("FEV", 2),
    ("MAR", 3),
    ("ABR", 4),
    ("MAI", 5),
    ("JUN", 6),
    ("JUL", 7),
    ("AGO", 8),
    ("SET", 9),
    ("OUT", 10),
    ("NOV", 11),
    ("DEZ", 12),
];

pub fn month_for_tab(name: &str) -> Option<u32> {
    let upper = name.trim().to_uppercase();
    if let Some((_, m)) = MONTH_TABS.iter().find(|(tok, _)| *tok == upper) {
        return Some(*m);
    }
    MONTH_TABS
        .iter()
        .find(|(tok, _)| upper.contains(tok))
        .map(|(_, m)| *m)
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Fixed row/column window of the monthly ledger template. Rows at or
/// before `header_row` are ignored.
#[derive(Debug, Clone)]
pub struct SheetLayout {
    pub header_row: usize,
    pub date_col: usize,
    pub direction_col: usize,
    pub description_col: usize,
    pub amount_col: usize,
    pub category_col: usize,
    pub notes_col: usize,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            header_row: 0,
            date_col: 0,
            direction_col: 1,
            description_col: 2,
            amount_col: 3,
            category_col: 4,
            notes_col: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct MonthSummary {
    pub count: usize,
    pub income: f64,
    pub expense: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub total_transactions: usize,
    pub total_income: f64,
    pub total_expense: f64,
    pub by_month: BTreeMap<String, MonthSummary>,
}

#[derive(Debug, Default, Serialize)]
pub struct SheetParseResult {
    pub transactions: Vec<DraftTransaction>,
    pub errors: Vec<Diagnostic>,
    pub summary: SheetSummary,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a multi-tab ledger workbook, one tab per calendar month.
/// Unrecognized tabs are skipped; rows failing required-field coercion
/// become diagnostics, never abort the document.
pub fn parse_ledger_sheet(path: &Path, layout: &SheetLayout) -> Result<SheetParseResult> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| ContasError::Sheet(format!("failed to open workbook: {e}")))?;

    let mut result = SheetParseResult::default();
    let sheet_names = workbook.sheet_names().to_vec();
    for name in sheet_names {
        let Some(month) = month_for_tab(&name) else {
            debug!("skipping tab '{name}': not a month tab");
            continue;
        };
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ContasError::Sheet(format!("tab '{name}': {e}")))?;
        let rows: Vec<Vec<RawCell>> = range
            .rows()
            .map(|row| row.iter().map(RawCell::from).collect())
            .collect();
        parse_tab(&name, month, &rows, layout, &mut result);
    }

    Ok(result)
}

fn parse_tab(
    tab: &str,
    month: u32,
    rows: &[Vec<RawCell>],
    layout: &SheetLayout,
    out: &mut SheetParseResult,
) {
    for (idx, row) in rows.iter().enumerate().skip(layout.header_row + 1) {
        // Rows are reported 1-based, as a user sees them in the sheet.
        let row_num = (idx + 1) as u32;
        if row.iter().all(|c| matches!(c, RawCell::Empty)) {
            continue;
        }
        match parse_row(row, layout) {
            Ok(mut draft) => {
                draft.source_tab = Some(tab.to_string());
                draft.source_row = Some(row_num);
                let key = format!("{month:02}");
                let entry = out.summary.by_month.entry(key).or_default();
                entry.count += 1;
                match draft.direction {
                    Direction::Income => {
                        entry.income += draft.amount;
                        out.summary.total_income += draft.amount;
                    }
                    Direction::Expense => {
                        entry.expense += draft.amount;
                        out.summary.total_expense += draft.amount;
                    }
                }
                out.summary.total_transactions += 1;
                out.transactions.push(draft);
            }
            Err(message) => out.errors.push(Diagnostic {
                tab: tab.to_string(),
                row: row_num,
                message: message.to_string(),
            }),
        }
    }
}

fn cell_at(row: &[RawCell], col: usize) -> Option<CellScalar> {
    row.get(col).and_then(coerce)
}

fn parse_row(
    row: &[RawCell],
    layout: &SheetLayout,
) -> std::result::Result<DraftTransaction, &'static str> {
    let date = cell_at(row, layout.date_col)
        .and_then(|c| c.as_date())
        .ok_or("missing or invalid date")?;
    let direction = cell_at(row, layout.direction_col)
        .and_then(|c| c.as_text().and_then(Direction::from_keyword))
        .ok_or("missing or invalid direction")?;
    let description = cell_at(row, layout.description_col)
        .and_then(|c| c.as_text().map(str::to_string))
        .ok_or("missing description")?;
    let amount = cell_at(row, layout.amount_col)
        .and_then(|c| c.as_number())
        .ok_or("missing or invalid amount")?;

    let mut draft = DraftTransaction::new(date, &description, amount.abs(), direction);
    if let Some(CellScalar::Text(cat)) = cell_at(row, layout.category_col) {
        draft.category = cat;
    }
    if let Some(CellScalar::Text(notes)) = cell_at(row, layout.notes_col) {
        draft.notes = Some(notes);
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawCell {
        RawCell::Text(s.to_string())
    }

    fn header() -> Vec<RawCell> {
        ["Data", "Tipo", "Descri\u{e7}\u{e3}o", "Valor", "Categoria", "Notas"]
            .iter()
            .map(|s| text(s))
            .collect()
    }

    #[test]
    fn test_month_for_tab_exact_and_fallback() {
        assert_eq!(month_for_tab("JAN"), Some(1));
        assert_eq!(month_for_tab("fev"), Some(2));
        assert_eq!(month_for_tab("Mar\u{e7}o"), Some(3));
        assert_eq!(month_for_tab("JANEIRO"), Some(1));
        assert_eq!(month_for_tab("Resumo"), None);
    }

    #[test]
    fn test_month_for_tab_first_token_wins_on_ambiguity() {
        // Contains both MAR (3) and ABR? No — craft one containing two
        // tokens: "MARABR" matches MAR first in list order.
        assert_eq!(month_for_tab("MARABR"), Some(3));
    }

    #[test]
    fn test_parse_tab_valid_and_malformed_rows() {
        let rows = vec![
            header(),
            vec![
                text("15/01/2025"),
                text("Saida"),
                text("Mercado"),
                text("R$ 150,00"),
                text("Alimenta\u{e7}\u{e3}o"),
            ],
            // Malformed: amount missing
            vec![text("16/01/2025"), text("Saida"), text("Farm\u{e1}cia")],
        ];
        let mut out = SheetParseResult::default();
        parse_tab("JAN", 1, &rows, &SheetLayout::default(), &mut out);

        assert_eq!(out.transactions.len(), 1);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].tab, "JAN");
        assert_eq!(out.errors[0].row, 3);
        assert!(out.errors[0].message.contains("amount"));

        let t = &out.transactions[0];
        assert_eq!(t.description, "Mercado");
        assert_eq!(t.amount, 150.0);
        assert_eq!(t.direction, Direction::Expense);
        assert_eq!(t.category, "Alimenta\u{e7}\u{e3}o");
        assert_eq!(t.source_tab.as_deref(), Some("JAN"));
        assert_eq!(t.source_row, Some(2));
    }

    #[test]
    fn test_parse_tab_summary_totals() {
        let rows = vec![
            header(),
            vec![
                text("05/01/2025"),
                text("Entrada"),
                text("Sal\u{e1}rio"),
                text("5.000,00"),
            ],
            vec![
                text("10/01/2025"),
                text("Saida"),
                text("Aluguel"),
                text("1.500,00"),
            ],
        ];
        let mut out = SheetParseResult::default();
        parse_tab("JAN", 1, &rows, &SheetLayout::default(), &mut out);

        assert_eq!(out.summary.total_transactions, 2);
        assert_eq!(out.summary.total_income, 5000.0);
        assert_eq!(out.summary.total_expense, 1500.0);
        let jan = out.summary.by_month.get("01").unwrap();
        assert_eq!(jan.count, 2);
        assert_eq!(jan.income, 5000.0);
        assert_eq!(jan.expense, 1500.0);
    }

    #[test]
    fn test_parse_tab_skips_blank_rows() {
        let rows = vec![
            header(),
            vec![RawCell::Empty, RawCell::Empty, RawCell::Empty],
            vec![
                text("20/01/2025"),
                text("Saida"),
                text("Uber"),
                RawCell::Number(23.9),
            ],
        ];
        let mut out = SheetParseResult::default();
        parse_tab("JAN", 1, &rows, &SheetLayout::default(), &mut out);
        assert_eq!(out.transactions.len(), 1);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_parse_tab_negative_amount_normalized() {
        let rows = vec![
            header(),
            vec![
                text("20/01/2025"),
                text("Saida"),
                text("Estorno parcial"),
                RawCell::Number(-42.0),
            ],
        ];
        let mut out = SheetParseResult::default();
        parse_tab("JAN", 1, &rows, &SheetLayout::default(), &mut out);
        assert_eq!(out.transactions[0].amount, 42.0);
    }
}
