use std::path::Path;
use std::sync::OnceLock;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cell::parse_flex_date;
use crate::error::{ContasError, Result};
use crate::models::{Direction, DraftTransaction, Installment, StatementInfo};

// ---------------------------------------------------------------------------
// Extraction service contract
// ---------------------------------------------------------------------------

pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;
const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "jpeg", "jpg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Regex,
    Ai,
}

/// Single-transaction extraction (one receipt/invoice).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleExtraction {
    pub merchant: String,
    pub date: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, alias = "method")]
    pub extraction_method: Option<ExtractionMethod>,
}

/// One line of a multi-transaction card statement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLine {
    pub merchant: String,
    #[serde(default)]
    pub date: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub installment_info: Option<String>,
    #[serde(default)]
    pub card_last_digits: Option<String>,
    #[serde(default)]
    pub is_refund: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementExtraction {
    pub is_multi_transaction: bool,
    pub transactions: Vec<ExtractedLine>,
    #[serde(default)]
    pub statement_info: Option<StatementInfo>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, alias = "method")]
    pub extraction_method: Option<ExtractionMethod>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExtractionResult {
    Statement(StatementExtraction),
    Single(SingleExtraction),
}

/// Gate inherited from the upload boundary: pdf/jpeg/png only, 10 MB max.
pub fn validate_document(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ContasError::UnsupportedDocument {
            name,
            reason: format!("file type '.{ext}' not accepted (pdf, jpeg, png)"),
        });
    }
    let size = std::fs::metadata(path)?.len();
    if size > MAX_DOCUMENT_BYTES {
        return Err(ContasError::UnsupportedDocument {
            name,
            reason: format!("{size} bytes exceeds the 10 MB limit"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Installment free text
// ---------------------------------------------------------------------------

fn installment_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)parcela\s+(\d{1,3})\s+de\s+(\d{1,3})",
            r"(?i)parcela\s+(\d{1,3})\s*/\s*(\d{1,3})",
            r"(?i)\b(\d{1,3})\s+de\s+(\d{1,3})\b",
            r"\b(\d{1,3})\s*/\s*(\d{1,3})\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
    })
}

/// Parse free-form installment text ("Parcela 02 de 12", "02/12").
/// Patterns are tried in order; the first match satisfying
/// `1 <= current <= total` wins. No match means not an installment.
pub fn parse_installment_text(raw: &str) -> Option<Installment> {
    for pattern in installment_patterns() {
        if let Some(caps) = pattern.captures(raw) {
            let current: u32 = caps[1].parse().ok()?;
            let total: u32 = caps[2].parse().ok()?;
            if current >= 1 && current <= total {
                return Some(Installment { current, total });
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Keywords marking a statement line as repayment of a previous balance
/// (a movement between the card and the paying account, not an expense).
/// Known false-positive risk: a merchant legitimately named e.g.
/// "Pagamento Digital" also matches, so excluded lines are surfaced for
/// confirmation rather than silently dropped.
const PAYMENT_KEYWORDS: &[&str] = &["pagamento", "pagto", "pag fatura", "cr\u{e9}dito recebido"];

pub fn is_statement_payment(line: &ExtractedLine) -> bool {
    let haystack = format!(
        "{} {}",
        line.merchant,
        line.category.as_deref().unwrap_or("")
    )
    .to_lowercase();
    PAYMENT_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedExtraction {
    pub drafts: Vec<DraftTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<StatementInfo>,
    /// Descriptions of lines excluded as statement payments.
    pub skipped_payments: Vec<String>,
    pub refund_count: usize,
    pub skipped_invalid: usize,
    /// Preview of what the selection owes: expenses minus refunds,
    /// payments excluded.
    pub selected_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<ExtractionMethod>,
}

pub fn normalize_json(json: &str) -> Result<NormalizedExtraction> {
    let result: ExtractionResult = serde_json::from_str(json)?;
    Ok(normalize(&result))
}

pub fn normalize(result: &ExtractionResult) -> NormalizedExtraction {
    match result {
        ExtractionResult::Single(single) => normalize_single(single),
        ExtractionResult::Statement(statement) => normalize_statement(statement),
    }
}

fn normalize_single(single: &SingleExtraction) -> NormalizedExtraction {
    let mut out = NormalizedExtraction {
        confidence: single.confidence,
        extraction_method: single.extraction_method,
        ..Default::default()
    };
    let Some(date) = parse_flex_date(&single.date) else {
        warn!("extraction for '{}' has unparsable date", single.merchant);
        out.skipped_invalid = 1;
        return out;
    };
    let direction = if single.amount < 0.0 {
        Direction::Income
    } else {
        Direction::Expense
    };
    let mut draft = DraftTransaction::new(date, &single.merchant, single.amount.abs(), direction);
    draft.is_refund = single.amount < 0.0;
    if let Some(cat) = &single.category {
        draft.category = cat.clone();
    }
    if !single.items.is_empty() {
        draft.notes = Some(single.items.join("; "));
    }
    if draft.is_refund {
        out.refund_count = 1;
        out.selected_total -= draft.amount;
    } else {
        out.selected_total += draft.amount;
    }
    out.drafts.push(draft);
    out
}

fn normalize_statement(statement: &StatementExtraction) -> NormalizedExtraction {
    let info = statement.statement_info.clone().unwrap_or_default();
    let mut out = NormalizedExtraction {
        confidence: statement.confidence,
        extraction_method: statement.extraction_method,
        ..Default::default()
    };

    for line in &statement.transactions {
        // Payment lines are checked before the refund rule: a negative
        // "Pagamento de Fatura" is a balance payment, not a refund.
        if is_statement_payment(line) {
            out.skipped_payments.push(line.merchant.clone());
            continue;
        }
        let date = line
            .date
            .as_deref()
            .and_then(parse_flex_date)
            .or(info.due_date);
        let Some(date) = date else {
            warn!("statement line '{}' has no usable date", line.merchant);
            out.skipped_invalid += 1;
            continue;
        };

        let is_refund = line.is_refund || line.amount < 0.0;
        let direction = if is_refund {
            Direction::Income
        } else {
            Direction::Expense
        };
        let mut draft = DraftTransaction::new(date, &line.merchant, line.amount.abs(), direction);
        draft.is_refund = is_refund;
        if let Some(cat) = &line.category {
            draft.category = cat.clone();
        }
        draft.card_last_digits = line
            .card_last_digits
            .clone()
            .or_else(|| info.card_last_digits.clone());
        draft.institution = info.institution.clone();

        if let Some(text) = &line.installment_info {
            match parse_installment_text(text) {
                Some(installment) => draft.installment = Some(installment),
                None if !text.trim().is_empty() => {
                    // Ambiguous installment text: keep the draft as a
                    // plain single transaction rather than dropping it.
                    warn!("unparsable installment text '{text}' on '{}'", line.merchant);
                }
                None => {}
            }
        }

        if is_refund {
            out.refund_count += 1;
            out.selected_total -= draft.amount;
        } else {
            out.selected_total += draft.amount;
        }
        out.drafts.push(draft);
    }

    out.statement = Some(info);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installment_text_patterns() {
        let expected = Some(Installment { current: 2, total: 12 });
        assert_eq!(parse_installment_text("Parcela 02 de 12"), expected);
        assert_eq!(parse_installment_text("parcela 2/12"), expected);
        assert_eq!(parse_installment_text("2 de 12"), expected);
        assert_eq!(parse_installment_text("02/12"), expected);
        assert_eq!(parse_installment_text("LOJA X 02/12"), expected);
    }

    #[test]
    fn test_parse_installment_text_rejects_invalid() {
        assert_eq!(parse_installment_text("13 de 12"), None);
        assert_eq!(parse_installment_text("0/12"), None);
        assert_eq!(parse_installment_text("sem parcelas"), None);
        assert_eq!(parse_installment_text(""), None);
    }

    #[test]
    fn test_payment_line_excluded_not_refund() {
        let json = r#"{
            "isMultiTransaction": true,
            "transactions": [
                {"merchant": "PAGAMENTO DE FATURA", "date": "10/01/2025",
                 "amount": -1500.0, "category": "Pagamento de Fatura"},
                {"merchant": "Mercado", "date": "11/01/2025", "amount": 200.0}
            ]
        }"#;
        let out = normalize_json(json).unwrap();
        assert_eq!(out.drafts.len(), 1);
        assert_eq!(out.skipped_payments, vec!["PAGAMENTO DE FATURA"]);
        assert_eq!(out.refund_count, 0);
        assert_eq!(out.selected_total, 200.0);
    }

    #[test]
    fn test_refund_normalized_to_income() {
        let json = r#"{
            "isMultiTransaction": true,
            "transactions": [
                {"merchant": "Loja", "date": "05/01/2025", "amount": 300.0},
                {"merchant": "Estorno Loja", "date": "08/01/2025", "amount": -100.0}
            ]
        }"#;
        let out = normalize_json(json).unwrap();
        assert_eq!(out.drafts.len(), 2);
        let refund = &out.drafts[1];
        assert_eq!(refund.direction, Direction::Income);
        assert!(refund.is_refund);
        assert_eq!(refund.amount, 100.0);
        assert_eq!(out.refund_count, 1);
        // Refunds subtract from the preview total.
        assert_eq!(out.selected_total, 200.0);
    }

    #[test]
    fn test_statement_context_flows_into_drafts() {
        let json = r#"{
            "isMultiTransaction": true,
            "transactions": [
                {"merchant": "Livraria", "date": "05/01/2025", "amount": 80.0,
                 "installmentInfo": "Parcela 01 de 03"}
            ],
            "statementInfo": {"institution": "Nubank", "cardLastDigits": "4321",
                              "dueDate": "2025-02-07", "holderName": "Ana"}
        }"#;
        let out = normalize_json(json).unwrap();
        let draft = &out.drafts[0];
        assert_eq!(draft.institution.as_deref(), Some("Nubank"));
        assert_eq!(draft.card_last_digits.as_deref(), Some("4321"));
        assert_eq!(draft.installment, Some(Installment { current: 1, total: 3 }));
    }

    #[test]
    fn test_ambiguous_installment_text_kept_as_single() {
        let json = r#"{
            "isMultiTransaction": true,
            "transactions": [
                {"merchant": "Loja", "date": "05/01/2025", "amount": 50.0,
                 "installmentInfo": "parcelado sem juros"}
            ]
        }"#;
        let out = normalize_json(json).unwrap();
        assert_eq!(out.drafts.len(), 1);
        assert!(out.drafts[0].installment.is_none());
    }

    #[test]
    fn test_single_extraction() {
        let json = r#"{
            "merchant": "Restaurante Bom Prato",
            "date": "15/01/2025",
            "amount": 89.9,
            "category": "Alimentacao",
            "items": ["prato feito", "suco"],
            "confidence": 0.93,
            "extractionMethod": "ai"
        }"#;
        let out = normalize_json(json).unwrap();
        assert_eq!(out.drafts.len(), 1);
        assert_eq!(out.drafts[0].amount, 89.9);
        assert_eq!(out.drafts[0].notes.as_deref(), Some("prato feito; suco"));
        assert_eq!(out.confidence, Some(0.93));
        assert_eq!(out.extraction_method, Some(ExtractionMethod::Ai));
    }

    #[test]
    fn test_line_without_date_uses_statement_due_date() {
        let json = r#"{
            "isMultiTransaction": true,
            "transactions": [{"merchant": "Anuidade", "amount": 30.0}],
            "statementInfo": {"dueDate": "2025-02-07"}
        }"#;
        let out = normalize_json(json).unwrap();
        assert_eq!(out.drafts.len(), 1);
        assert_eq!(
            out.drafts[0].date,
            chrono::NaiveDate::from_ymd_opt(2025, 2, 7).unwrap()
        );
    }

    #[test]
    fn test_validate_document() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("fatura.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        assert!(validate_document(&pdf).is_ok());

        let xls = dir.path().join("fatura.xls");
        std::fs::write(&xls, b"junk").unwrap();
        let err = validate_document(&xls).unwrap_err();
        assert!(matches!(
            err,
            ContasError::UnsupportedDocument { .. }
        ));
    }
}
