use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{
    Account, AccountStatus, AccountType, Direction, DraftTransaction, ExistingTransaction,
    DEFAULT_CATEGORY,
};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    account_type TEXT NOT NULL,
    institution TEXT,
    card_last_digits TEXT,
    closing_day INTEGER,
    due_day INTEGER,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount REAL NOT NULL CHECK (amount >= 0),
    direction TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'Other',
    installment_number INTEGER,
    installment_total INTEGER,
    installment_group_id TEXT,
    institution TEXT,
    card_last_digits TEXT,
    notes TEXT,
    is_refund INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'paid',
    source_tab TEXT,
    source_row INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    checksum TEXT NOT NULL,
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    import_date TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Persist a batch of drafts as a single SQL transaction: either every
/// draft is written or none is, so an installment group can never be
/// half-persisted.
pub fn create_many(
    conn: &mut Connection,
    drafts: &[DraftTransaction],
    account_id: Option<i64>,
) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO transactions (account_id, date, description, amount, direction, \
             category, installment_number, installment_total, installment_group_id, \
             institution, card_last_digits, notes, is_refund, status, source_tab, source_row) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )?;
        for draft in drafts {
            stmt.execute(rusqlite::params![
                account_id,
                draft.date,
                draft.description,
                draft.amount,
                draft.direction.as_str(),
                draft.category,
                draft.installment.map(|i| i.current),
                draft.installment.map(|i| i.total),
                draft.group_id.map(|g| g.to_string()),
                draft.institution,
                draft.card_last_digits,
                draft.notes,
                draft.is_refund as i32,
                draft.status.as_str(),
                draft.source_tab,
                draft.source_row,
            ])?;
        }
    }
    tx.commit()?;
    Ok(drafts.len())
}

/// Read-only snapshot of persisted transactions, optionally windowed.
pub fn find_many(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<ExistingTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, description, amount, direction, category, \
         installment_group_id, is_refund \
         FROM transactions \
         WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2) \
         ORDER BY date, id",
    )?;
    let rows = stmt.query_map(rusqlite::params![from, to], |row| {
        let direction: String = row.get(4)?;
        Ok(ExistingTransaction {
            id: row.get(0)?,
            date: row.get(1)?,
            description: row.get(2)?,
            amount: row.get(3)?,
            direction: match direction.as_str() {
                "income" => Direction::Income,
                _ => Direction::Expense,
            },
            category: row
                .get::<_, Option<String>>(5)?
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            installment_group_id: row.get(6)?,
            is_refund: row.get::<_, i64>(7)? != 0,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let account_type: String = row.get(2)?;
    let status: String = row.get(7)?;
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        account_type: AccountType::parse(&account_type).unwrap_or(AccountType::Other),
        institution: row.get(3)?,
        card_last_digits: row.get(4)?,
        closing_day: row.get(5)?,
        due_day: row.get(6)?,
        status: if status == "archived" {
            AccountStatus::Archived
        } else {
            AccountStatus::Active
        },
    })
}

pub fn find_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, account_type, institution, card_last_digits, \
         closing_day, due_day, status FROM accounts ORDER BY name",
    )?;
    let rows = stmt.query_map([], account_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[allow(clippy::too_many_arguments)]
pub fn create_account(
    conn: &Connection,
    name: &str,
    account_type: AccountType,
    institution: Option<&str>,
    card_last_digits: Option<&str>,
    closing_day: Option<u32>,
    due_day: Option<u32>,
) -> Result<Account> {
    // Billing-cycle fields only make sense on credit cards.
    let (closing_day, due_day) = match account_type {
        AccountType::CreditCard => (closing_day, due_day),
        _ => (None, None),
    };
    conn.execute(
        "INSERT INTO accounts (name, account_type, institution, card_last_digits, closing_day, due_day) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            name,
            account_type.as_str(),
            institution,
            card_last_digits,
            closing_day,
            due_day
        ],
    )?;
    Ok(Account {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        account_type,
        institution: institution.map(str::to_string),
        card_last_digits: card_last_digits.map(str::to_string),
        closing_day,
        due_day,
        status: AccountStatus::Active,
    })
}

// ---------------------------------------------------------------------------
// Import ledger
// ---------------------------------------------------------------------------

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

pub fn import_exists(conn: &Connection, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1")?;
    Ok(stmt.exists([checksum])?)
}

pub fn record_import(
    conn: &Connection,
    filename: &str,
    checksum: &str,
    drafts: &[DraftTransaction],
) -> Result<()> {
    let min_date = drafts.iter().map(|d| d.date).min();
    let max_date = drafts.iter().map(|d| d.date).max();
    conn.execute(
        "INSERT INTO imports (filename, checksum, record_count, date_range_start, date_range_end) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![filename, checksum, drafts.len() as i64, min_date, max_date],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Installment;
    use uuid::Uuid;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft(d: NaiveDate, description: &str, amount: f64) -> DraftTransaction {
        DraftTransaction::new(d, description, amount, Direction::Expense)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["accounts", "transactions", "imports"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_create_many_and_find_many() {
        let (_dir, mut conn) = test_db();
        let drafts = vec![
            draft(date(2025, 1, 15), "Mercado", 100.0),
            draft(date(2025, 2, 15), "Farm\u{e1}cia", 50.0),
        ];
        let written = create_many(&mut conn, &drafts, None).unwrap();
        assert_eq!(written, 2);

        let all = find_many(&conn, None, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].description, "Mercado");
        assert_eq!(all[0].date, date(2025, 1, 15));

        let january = find_many(&conn, Some(date(2025, 1, 1)), Some(date(2025, 1, 31))).unwrap();
        assert_eq!(january.len(), 1);
    }

    #[test]
    fn test_find_many_open_bounds() {
        let (_dir, mut conn) = test_db();
        create_many(&mut conn, &[draft(date(2025, 1, 15), "Mercado", 100.0)], None).unwrap();

        // One-sided windows leave the other bound open.
        assert_eq!(find_many(&conn, Some(date(2025, 1, 1)), None).unwrap().len(), 1);
        assert_eq!(find_many(&conn, None, Some(date(2025, 1, 31))).unwrap().len(), 1);
        assert!(find_many(&conn, Some(date(2025, 2, 1)), None).unwrap().is_empty());
    }

    #[test]
    fn test_installment_group_persists_completely() {
        let (_dir, mut conn) = test_db();
        let group = Uuid::new_v4();
        let drafts: Vec<DraftTransaction> = (1..=3)
            .map(|i| {
                let mut d = draft(date(2025, i, 7), &format!("Notebook ({i}/3)"), 400.0);
                d.installment = Some(Installment { current: i, total: 3 });
                d.group_id = Some(group);
                d
            })
            .collect();
        create_many(&mut conn, &drafts, None).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM transactions WHERE installment_group_id = ?1",
                [group.to_string()],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_accounts_roundtrip() {
        let (_dir, conn) = test_db();
        let card = create_account(
            &conn,
            "Cart\u{e3}o Nubank",
            AccountType::CreditCard,
            Some("Nubank"),
            Some("4321"),
            Some(30),
            Some(7),
        )
        .unwrap();
        assert_eq!(card.closing_day, Some(30));

        // Cycle fields are dropped for non-card accounts.
        let checking = create_account(
            &conn,
            "Conta Ita\u{fa}",
            AccountType::Checking,
            Some("Ita\u{fa}"),
            None,
            Some(10),
            Some(20),
        )
        .unwrap();
        assert_eq!(checking.closing_day, None);

        let accounts = find_accounts(&conn).unwrap();
        assert_eq!(accounts.len(), 2);
        let nubank = accounts.iter().find(|a| a.card_last_digits.is_some()).unwrap();
        assert_eq!(nubank.account_type, AccountType::CreditCard);
        assert_eq!(nubank.status, AccountStatus::Active);
    }

    #[test]
    fn test_import_checksum_ledger() {
        let (dir, conn) = test_db();
        let file = dir.path().join("extrato.csv");
        std::fs::write(&file, "Data,Tipo,Descricao,Valor\n").unwrap();
        let checksum = compute_checksum(&file).unwrap();
        assert!(!import_exists(&conn, &checksum).unwrap());

        record_import(&conn, "extrato.csv", &checksum, &[]).unwrap();
        assert!(import_exists(&conn, &checksum).unwrap());
    }
}
