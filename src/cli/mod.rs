pub mod accounts;
pub mod import;
pub mod init;
pub mod report;

use clap::{Parser, Subcommand};

pub(crate) fn parse_month_opt(month: &Option<String>) -> (Option<i32>, Option<u32>) {
    if let Some(m) = month {
        let parts: Vec<&str> = m.split('-').collect();
        if parts.len() == 2 {
            let year = parts[0].parse().ok();
            let month = parts[1].parse().ok();
            return (year, month);
        }
    }
    (None, None)
}

#[derive(Parser)]
#[command(
    name = "contas",
    about = "Transaction ingestion and reconciliation for a shared finance tracker."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up contas: choose a data directory and initialize the database.
    Init {
        /// Path for contas data (default: ~/Documents/contas)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Import a ledger spreadsheet, CSV extract or extraction JSON.
    Import {
        /// Path to xlsx/xls, csv/txt or json file to import
        file: String,
        /// Account name to import into (skips resolution)
        #[arg(long)]
        account: Option<String>,
        /// Field delimiter for flat files (default: ,)
        #[arg(long)]
        delimiter: Option<char>,
        /// Flat file has no header row; assume the default column order
        #[arg(long = "no-header")]
        no_header: bool,
        /// Answer prompts with their defaults (skip duplicates)
        #[arg(long)]
        yes: bool,
    },
    /// Summarize a period: totals, categories, alerts and anomalies.
    Summary {
        /// Month filter: YYYY-MM
        #[arg(long)]
        month: Option<String>,
        /// Year filter: YYYY
        #[arg(long)]
        year: Option<i32>,
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'Cartao Nubank'
        name: String,
        /// Account type: checking, savings, credit_card, investment, cash, other
        #[arg(long = "type")]
        account_type: String,
        /// Institution name
        #[arg(long)]
        institution: Option<String>,
        /// Last 4 digits of the card number
        #[arg(long = "last-four")]
        last_four: Option<String>,
        /// Billing cycle closing day (credit cards)
        #[arg(long = "closing-day")]
        closing_day: Option<u32>,
        /// Billing cycle due day (credit cards)
        #[arg(long = "due-day")]
        due_day: Option<u32>,
    },
    /// List all accounts.
    List,
}
