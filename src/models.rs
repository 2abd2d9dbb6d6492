use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    /// Parse a direction keyword as it appears in ledger sheets
    /// (pt-BR first, English tolerated).
    pub fn from_keyword(raw: &str) -> Option<Direction> {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "entrada" | "receita" | "income" => Some(Direction::Income),
            "saida" | "sa\u{ed}da" | "despesa" | "expense" => Some(Direction::Expense),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Income => "income",
            Direction::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Paid,
    Pending,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Paid => "paid",
            TransactionStatus::Pending => "pending",
        }
    }
}

fn default_status() -> TransactionStatus {
    TransactionStatus::Paid
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub current: u32,
    pub total: u32,
}

pub const DEFAULT_CATEGORY: &str = "Other";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// A normalized transaction candidate produced by a parser or normalizer,
/// not yet persisted. Amounts are always non-negative; refunds carry
/// `direction = Income` with `is_refund` set, never a negative amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub direction: Direction,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment: Option<Installment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last_digits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_row: Option<u32>,
    #[serde(default)]
    pub is_refund: bool,
    #[serde(default = "default_status")]
    pub status: TransactionStatus,
    /// Set only once an installment series has been expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
}

impl DraftTransaction {
    pub fn new(date: NaiveDate, description: &str, amount: f64, direction: Direction) -> Self {
        Self {
            date,
            description: description.to_string(),
            amount,
            direction,
            category: default_category(),
            installment: None,
            institution: None,
            card_last_digits: None,
            notes: None,
            source_tab: None,
            source_row: None,
            is_refund: false,
            status: TransactionStatus::Paid,
            group_id: None,
        }
    }
}

/// Persisted shape, read back for duplicate detection and summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingTransaction {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub direction: Direction,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment_group_id: Option<String>,
    #[serde(default)]
    pub is_refund: bool,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    CreditCard,
    Investment,
    Cash,
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::CreditCard => "credit_card",
            AccountType::Investment => "investment",
            AccountType::Cash => "cash",
            AccountType::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<AccountType> {
        match raw {
            "checking" => Some(AccountType::Checking),
            "savings" => Some(AccountType::Savings),
            "credit_card" => Some(AccountType::CreditCard),
            "investment" => Some(AccountType::Investment),
            "cash" => Some(AccountType::Cash),
            "other" => Some(AccountType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Archived,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Archived => "archived",
        }
    }
}

/// A named money container. Billing-cycle fields are present only for
/// credit cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: AccountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last_digits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_day: Option<u32>,
    pub status: AccountStatus,
}

// ---------------------------------------------------------------------------
// Statement metadata
// ---------------------------------------------------------------------------

/// Describes the invoice/document a multi-transaction extraction came
/// from. Read-only context for installment dating and account
/// resolution; never persisted as a transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementInfo {
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub card_last_digits: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub holder_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A row that failed required-field coercion. Recorded, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub tab: String,
    pub row: u32,
    pub message: String,
}
