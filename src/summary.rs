use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Direction, ExistingTransaction};

/// Expenses further than this many standard deviations from the window
/// mean are flagged as unusual.
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    pub z_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: String,
    pub amount: f64,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub transaction_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub balance: f64,
    /// `balance / totalIncome`; `None` (JSON null) when the window has
    /// no income, since the ratio is undefined.
    pub savings_rate: Option<f64>,
    pub categories: Vec<CategoryBreakdown>,
    pub alerts: Vec<String>,
    pub anomalies: Vec<Anomaly>,
}

/// Aggregate a date window of the ledger: totals, savings rate,
/// expense-category breakdown and rule/statistical alerts. Read-only.
pub fn summarize(
    transactions: &[ExistingTransaction],
    from: NaiveDate,
    to: NaiveDate,
    config: &AnomalyConfig,
) -> LedgerSummary {
    let window: Vec<&ExistingTransaction> = transactions
        .iter()
        .filter(|t| t.date >= from && t.date <= to)
        .collect();

    let mut summary = LedgerSummary::default();
    let mut by_category: HashMap<&str, (f64, usize)> = HashMap::new();
    let mut expenses: Vec<&ExistingTransaction> = Vec::new();

    for t in &window {
        match t.direction {
            Direction::Income => summary.total_income += t.amount,
            Direction::Expense => {
                summary.total_expenses += t.amount;
                let entry = by_category.entry(t.category.as_str()).or_default();
                entry.0 += t.amount;
                entry.1 += 1;
                expenses.push(t);
            }
        }
    }
    summary.balance = summary.total_income - summary.total_expenses;
    summary.savings_rate = if summary.total_income > 0.0 {
        Some(summary.balance / summary.total_income)
    } else {
        None
    };

    summary.categories = by_category
        .into_iter()
        .map(|(category, (amount, transaction_count))| CategoryBreakdown {
            category: category.to_string(),
            amount,
            transaction_count,
        })
        .collect();
    summary
        .categories
        .sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(std::cmp::Ordering::Equal));

    if summary.balance < 0.0 {
        summary
            .alerts
            .push("Spent more than earned in this period".to_string());
    }
    if let Some(top) = summary.categories.first() {
        if summary.total_expenses > 0.0 && top.amount / summary.total_expenses > 0.5 {
            summary.alerts.push(format!(
                "Category '{}' accounts for over half of all expenses",
                top.category
            ));
        }
    }

    summary.anomalies = detect_anomalies(&expenses, config);
    summary
}

/// Z-score outliers among the window's expenses. Zero or one data point
/// leaves the standard deviation undefined, so nothing is flagged.
fn detect_anomalies(expenses: &[&ExistingTransaction], config: &AnomalyConfig) -> Vec<Anomaly> {
    if expenses.len() < 2 {
        return Vec::new();
    }
    let n = expenses.len() as f64;
    let mean = expenses.iter().map(|t| t.amount).sum::<f64>() / n;
    let variance = expenses
        .iter()
        .map(|t| (t.amount - mean).powi(2))
        .sum::<f64>()
        / n;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return Vec::new();
    }
    expenses
        .iter()
        .filter_map(|t| {
            let z_score = (t.amount - mean) / stddev;
            (z_score > config.z_threshold).then(|| Anomaly {
                transaction_id: t.id,
                date: t.date,
                description: t.description.clone(),
                amount: t.amount,
                z_score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(id: i64, d: NaiveDate, direction: Direction, amount: f64, category: &str) -> ExistingTransaction {
        ExistingTransaction {
            id,
            date: d,
            description: format!("tx {id}"),
            amount,
            direction,
            category: category.to_string(),
            installment_group_id: None,
            is_refund: false,
        }
    }

    fn window() -> (NaiveDate, NaiveDate) {
        (date(2025, 1, 1), date(2025, 1, 31))
    }

    #[test]
    fn test_summary_scenario() {
        let (from, to) = window();
        let txns = vec![
            tx(1, date(2025, 1, 5), Direction::Income, 5000.0, "Renda"),
            tx(2, date(2025, 1, 8), Direction::Expense, 1500.0, "Moradia"),
            tx(3, date(2025, 1, 9), Direction::Expense, 800.0, "Mercado"),
            tx(4, date(2025, 1, 10), Direction::Expense, 200.0, "Transporte"),
            tx(5, date(2025, 1, 12), Direction::Expense, 8000.0, "Eletr\u{f4}nicos"),
        ];
        let summary = summarize(&txns, from, to, &AnomalyConfig::default());
        assert_eq!(summary.total_income, 5000.0);
        assert_eq!(summary.total_expenses, 10500.0);
        assert_eq!(summary.balance, -5500.0);
        assert!(summary.savings_rate.unwrap() < 0.0);
        let top = &summary.categories[0];
        assert_eq!(top.category, "Eletr\u{f4}nicos");
        assert_eq!(top.amount, 8000.0);
        assert_eq!(top.transaction_count, 1);
        assert!(summary
            .alerts
            .iter()
            .any(|a| a.contains("Spent more than earned")));
    }

    #[test]
    fn test_savings_rate_none_without_income() {
        let (from, to) = window();
        let txns = vec![tx(1, date(2025, 1, 5), Direction::Expense, 100.0, "Mercado")];
        let summary = summarize(&txns, from, to, &AnomalyConfig::default());
        assert_eq!(summary.savings_rate, None);
        assert_eq!(summary.balance, -100.0);
        assert!(!summary.alerts.is_empty());
    }

    #[test]
    fn test_window_filtering() {
        let (from, to) = window();
        let txns = vec![
            tx(1, date(2025, 1, 5), Direction::Income, 1000.0, "Renda"),
            tx(2, date(2025, 2, 5), Direction::Income, 9999.0, "Renda"),
        ];
        let summary = summarize(&txns, from, to, &AnomalyConfig::default());
        assert_eq!(summary.total_income, 1000.0);
    }

    #[test]
    fn test_anomaly_detection_flags_outlier() {
        let (from, to) = window();
        let mut txns: Vec<ExistingTransaction> = (0..9)
            .map(|i| tx(i, date(2025, 1, 5), Direction::Expense, 100.0, "Mercado"))
            .collect();
        txns.push(tx(99, date(2025, 1, 20), Direction::Expense, 1000.0, "Mercado"));
        let summary = summarize(&txns, from, to, &AnomalyConfig::default());
        assert_eq!(summary.anomalies.len(), 1);
        let anomaly = &summary.anomalies[0];
        assert_eq!(anomaly.transaction_id, 99);
        assert!((anomaly.z_score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_anomalies_for_tiny_or_uniform_sets() {
        let (from, to) = window();
        let single = vec![tx(1, date(2025, 1, 5), Direction::Expense, 100.0, "Mercado")];
        assert!(summarize(&single, from, to, &AnomalyConfig::default())
            .anomalies
            .is_empty());

        let empty: Vec<ExistingTransaction> = Vec::new();
        assert!(summarize(&empty, from, to, &AnomalyConfig::default())
            .anomalies
            .is_empty());

        let uniform: Vec<ExistingTransaction> = (0..5)
            .map(|i| tx(i, date(2025, 1, 5), Direction::Expense, 50.0, "Mercado"))
            .collect();
        assert!(summarize(&uniform, from, to, &AnomalyConfig::default())
            .anomalies
            .is_empty());
    }
}
