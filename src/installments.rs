use chrono::{Datelike, Months, NaiveDate};
use log::debug;
use uuid::Uuid;

use crate::models::{Account, DraftTransaction, Installment, TransactionStatus};

// ---------------------------------------------------------------------------
// Date arithmetic
// ---------------------------------------------------------------------------

/// Shift by whole months, clamping to the end of shorter months
/// (Jan 31 + 1 month = Feb 28/29).
pub fn shift_months(date: NaiveDate, delta: i64) -> NaiveDate {
    if delta >= 0 {
        date.checked_add_months(Months::new(delta as u32)).unwrap_or(date)
    } else {
        date.checked_sub_months(Months::new((-delta) as u32)).unwrap_or(date)
    }
}

fn clamp_day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_else(|| {
        let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
        shift_months(first, 1) - chrono::Duration::days(1)
    })
}

/// Due date of the billing cycle that contains `purchase`. A purchase
/// after the closing day rolls into the next cycle; when the due day
/// precedes the closing day, the bill is paid in the month after the
/// cycle closes.
pub fn cycle_due_date(purchase: NaiveDate, closing_day: u32, due_day: u32) -> NaiveDate {
    let mut closing = NaiveDate::from_ymd_opt(purchase.year(), purchase.month(), 1).unwrap();
    if purchase.day() > closing_day {
        closing = shift_months(closing, 1);
    }
    let mut due = closing;
    if due_day < closing_day {
        due = shift_months(due, 1);
    }
    clamp_day(due.year(), due.month(), due_day)
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

/// Expand a draft carrying installment metadata into the full dated
/// series, one draft per installment 1..total, all sharing a fresh
/// group id.
///
/// The anchor dates installment `#current`. When the linked account
/// knows its billing cycle the anchor is derived from the purchase date
/// (precise mode, the account's own contract); otherwise the
/// statement's due date is used; failing both, the purchase date
/// itself. Already-billed installments (`i <= current`) come out Paid,
/// later ones Pending.
pub fn expand(
    draft: &DraftTransaction,
    account: Option<&Account>,
    statement_due: Option<NaiveDate>,
) -> Vec<DraftTransaction> {
    let Some(installment) = draft.installment else {
        return vec![draft.clone()];
    };
    if installment.total <= 1 {
        // Not a real plan; keep the draft as a single transaction.
        return vec![draft.clone()];
    }

    let cycle = account.and_then(|a| Some((a.closing_day?, a.due_day?)));
    let anchor = match cycle {
        Some((closing_day, due_day)) => cycle_due_date(draft.date, closing_day, due_day),
        None => statement_due.unwrap_or(draft.date),
    };
    debug!(
        "expanding '{}' into {} installments anchored at {anchor}",
        draft.description, installment.total
    );

    let group_id = Uuid::new_v4();
    let current = installment.current;
    (1..=installment.total)
        .map(|i| {
            let mut member = draft.clone();
            member.date = shift_months(anchor, i64::from(i) - i64::from(current));
            member.description = format!("{} ({i}/{})", draft.description, installment.total);
            member.installment = Some(Installment {
                current: i,
                total: installment.total,
            });
            member.status = if i <= current {
                TransactionStatus::Paid
            } else {
                TransactionStatus::Pending
            };
            member.group_id = Some(group_id);
            member
        })
        .collect()
}
