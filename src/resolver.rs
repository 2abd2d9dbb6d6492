use log::debug;

use crate::models::{Account, AccountStatus, AccountType, DraftTransaction, StatementInfo};

/// Outcome of resolving a draft against the known accounts. Creation is
/// offered to the caller, never performed automatically.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountResolution<'a> {
    Matched(&'a Account),
    /// No account matched; the caller may create one under this name.
    Propose(String),
    /// The draft carries neither card digits nor an institution.
    NoContext,
}

fn is_active(account: &Account) -> bool {
    account.status == AccountStatus::Active
}

/// Exact match only for card digits: collision risk must stay at zero,
/// so there is deliberately no fuzzy step here.
fn match_by_digits<'a>(accounts: &'a [Account], digits: &str) -> Option<&'a Account> {
    accounts.iter().find(|a| {
        is_active(a)
            && a.account_type == AccountType::CreditCard
            && a.card_last_digits.as_deref() == Some(digits)
    })
}

fn match_by_institution<'a>(accounts: &'a [Account], institution: &str) -> Option<&'a Account> {
    let term = institution.trim().to_lowercase();
    if term.is_empty() {
        return None;
    }
    // Exact case-insensitive institution match first.
    if let Some(hit) = accounts.iter().find(|a| {
        is_active(a)
            && a.institution
                .as_deref()
                .is_some_and(|i| i.to_lowercase() == term)
    }) {
        return Some(hit);
    }
    // Bidirectional substring containment against name and institution.
    accounts.iter().filter(|a| is_active(a)).find(|a| {
        let name = a.name.to_lowercase();
        let inst = a.institution.as_deref().unwrap_or("").to_lowercase();
        name.contains(&term)
            || term.contains(&name)
            || (!inst.is_empty() && (inst.contains(&term) || term.contains(&inst)))
    })
}

pub fn resolve_account<'a>(
    accounts: &'a [Account],
    card_last_digits: Option<&str>,
    institution: Option<&str>,
) -> Option<&'a Account> {
    if let Some(digits) = card_last_digits {
        return match_by_digits(accounts, digits);
    }
    institution.and_then(|i| match_by_institution(accounts, i))
}

/// Resolve a draft, proposing a new-account name when nothing matches.
pub fn resolve_draft<'a>(
    accounts: &'a [Account],
    draft: &DraftTransaction,
    statement: Option<&StatementInfo>,
) -> AccountResolution<'a> {
    let digits = draft.card_last_digits.as_deref();
    let institution = draft.institution.as_deref();
    if digits.is_none() && institution.is_none() {
        return AccountResolution::NoContext;
    }
    match resolve_account(accounts, digits, institution) {
        Some(account) => {
            debug!("draft '{}' resolved to account '{}'", draft.description, account.name);
            AccountResolution::Matched(account)
        }
        None => {
            let info = statement.cloned().unwrap_or_else(|| StatementInfo {
                institution: institution.map(str::to_string),
                card_last_digits: digits.map(str::to_string),
                ..Default::default()
            });
            AccountResolution::Propose(propose_account_name(&info))
        }
    }
}

/// Proposed name for a new account: holder + institution + masked
/// digits for cards, institution alone otherwise.
pub fn propose_account_name(info: &StatementInfo) -> String {
    match info.card_last_digits.as_deref() {
        Some(digits) => {
            let mut parts: Vec<String> = Vec::new();
            if let Some(holder) = info.holder_name.as_deref() {
                parts.push(holder.to_string());
            }
            if let Some(institution) = info.institution.as_deref() {
                parts.push(institution.to_string());
            }
            parts.push(format!("**** {digits}"));
            parts.join(" ")
        }
        None => info
            .institution
            .clone()
            .unwrap_or_else(|| "Nova conta".to_string()),
    }
}
