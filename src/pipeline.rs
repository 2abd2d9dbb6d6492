use std::path::Path;

use log::{debug, info};
use rusqlite::Connection;

use crate::dedup::{self, MatchConfig};
use crate::error::{ContasError, Result};
use crate::extraction;
use crate::flatfile::{self, FlatFileOptions};
use crate::installments;
use crate::models::{Account, Diagnostic, DraftTransaction, StatementInfo};
use crate::resolver::{self, AccountResolution};
use crate::sheet::{self, SheetLayout, SheetSummary};
use crate::store;

// ---------------------------------------------------------------------------
// Source detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Multi-tab ledger workbook (xlsx/xls/ods).
    Sheet,
    /// Single delimited file (csv/txt/tsv).
    FlatFile,
    /// Extraction-service JSON payload.
    Extraction,
}

pub fn detect_source(path: &Path) -> Result<SourceKind> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xls" | "ods" => Ok(SourceKind::Sheet),
        "csv" | "txt" | "tsv" => Ok(SourceKind::FlatFile),
        "json" => Ok(SourceKind::Extraction),
        // Raw documents pass the upload gate but need the extraction
        // service; point at its JSON output.
        "pdf" | "jpeg" | "jpg" | "png" => {
            extraction::validate_document(path)?;
            Err(ContasError::UnsupportedDocument {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                reason: "run this document through the extraction service and import its JSON output"
                    .to_string(),
            })
        }
        _ => Err(ContasError::UnsupportedDocument {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            reason: format!("no importer for '.{ext}' files"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Prepare
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Explicit target account, bypassing resolution.
    pub account: Option<String>,
    pub flat: FlatFileOptions,
    pub layout: SheetLayout,
    pub matching: MatchConfig,
}

/// How the import relates to the known accounts, decided during
/// `prepare` and acted on by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAccount {
    Linked(Account),
    /// Nothing matched; a new account under this name may be created.
    Proposed(String),
    Unlinked,
}

/// Everything `prepare` learned about a file, staged for the caller to
/// inspect before anything is written.
#[derive(Debug)]
pub struct PreparedImport {
    pub filename: String,
    pub checksum: String,
    /// The exact file was imported before (checksum hit).
    pub already_imported: bool,
    pub drafts: Vec<DraftTransaction>,
    /// Draft index to duplicated ledger id.
    pub duplicates: std::collections::HashMap<usize, i64>,
    /// Weaker matches worth flagging: draft index to the closest
    /// existing transaction that is not a strict duplicate.
    pub near_matches: Vec<(usize, i64)>,
    pub diagnostics: Vec<Diagnostic>,
    pub skipped_payments: Vec<String>,
    pub refund_count: usize,
    pub skipped_invalid: usize,
    pub account: ResolvedAccount,
    pub statement: Option<StatementInfo>,
    pub sheet_summary: Option<SheetSummary>,
}

impl PreparedImport {
    pub fn new_count(&self) -> usize {
        self.drafts.len() - self.duplicates.len()
    }
}

/// Phase one of an import: parse, resolve the account, expand
/// installment series and flag duplicates against the current ledger.
/// Nothing is persisted; the caller reviews the result and calls
/// `commit`.
pub fn prepare(conn: &Connection, path: &Path, opts: &ImportOptions) -> Result<PreparedImport> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let checksum = store::compute_checksum(path)?;
    let already_imported = store::import_exists(conn, &checksum)?;

    let mut diagnostics = Vec::new();
    let mut skipped_payments = Vec::new();
    let mut refund_count = 0;
    let mut skipped_invalid = 0;
    let mut statement = None;
    let mut sheet_summary = None;

    let drafts = match detect_source(path)? {
        SourceKind::Sheet => {
            let parsed = sheet::parse_ledger_sheet(path, &opts.layout)?;
            diagnostics = parsed.errors;
            sheet_summary = Some(parsed.summary);
            parsed.transactions
        }
        SourceKind::FlatFile => flatfile::parse_flat_file(path, &opts.flat)?,
        SourceKind::Extraction => {
            let json = std::fs::read_to_string(path)?;
            let normalized = extraction::normalize_json(&json)?;
            skipped_payments = normalized.skipped_payments;
            refund_count = normalized.refund_count;
            skipped_invalid = normalized.skipped_invalid;
            statement = normalized.statement;
            normalized.drafts
        }
    };

    let accounts = store::find_accounts(conn)?;
    let account = resolve_for_batch(&accounts, opts.account.as_deref(), &drafts, statement.as_ref())?;

    let linked = match &account {
        ResolvedAccount::Linked(a) => Some(a),
        _ => None,
    };
    let statement_due = statement.as_ref().and_then(|s| s.due_date);
    let drafts: Vec<DraftTransaction> = drafts
        .iter()
        .flat_map(|d| installments::expand(d, linked, statement_due))
        .collect();

    let ledger = store::find_many(conn, None, None)?;
    let duplicates = dedup::find_strict_duplicates(&opts.matching, &drafts, &ledger);
    let near_matches: Vec<(usize, i64)> = drafts
        .iter()
        .enumerate()
        .filter(|(idx, _)| !duplicates.contains_key(idx))
        .filter_map(|(idx, draft)| {
            dedup::find_loose_candidates(&opts.matching, draft, &ledger)
                .first()
                .map(|hit| (idx, hit.id))
        })
        .collect();

    info!(
        "prepared '{filename}': {} drafts, {} duplicates, {} diagnostics",
        drafts.len(),
        duplicates.len(),
        diagnostics.len()
    );
    Ok(PreparedImport {
        filename,
        checksum,
        already_imported,
        drafts,
        duplicates,
        near_matches,
        diagnostics,
        skipped_payments,
        refund_count,
        skipped_invalid,
        account,
        statement,
        sheet_summary,
    })
}

/// Pick the account for a whole batch. An explicit name must exist;
/// otherwise the first draft carrying card digits or an institution
/// drives resolution, since extraction batches share one statement.
fn resolve_for_batch(
    accounts: &[Account],
    explicit: Option<&str>,
    drafts: &[DraftTransaction],
    statement: Option<&StatementInfo>,
) -> Result<ResolvedAccount> {
    if let Some(name) = explicit {
        let wanted = name.trim().to_lowercase();
        return accounts
            .iter()
            .find(|a| a.name.to_lowercase() == wanted)
            .map(|a| ResolvedAccount::Linked(a.clone()))
            .ok_or_else(|| ContasError::UnknownAccount(name.to_string()));
    }
    let contextual = drafts
        .iter()
        .find(|d| d.card_last_digits.is_some() || d.institution.is_some());
    let Some(draft) = contextual else {
        debug!("no account context in batch");
        return Ok(ResolvedAccount::Unlinked);
    };
    Ok(match resolver::resolve_draft(accounts, draft, statement) {
        AccountResolution::Matched(a) => ResolvedAccount::Linked(a.clone()),
        AccountResolution::Propose(name) => ResolvedAccount::Proposed(name),
        AccountResolution::NoContext => ResolvedAccount::Unlinked,
    })
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateDecision {
    /// Keep only drafts that matched nothing.
    Discard,
    /// Import everything, duplicates included.
    Force,
    Cancel,
}

/// Phase two: persist the staged drafts atomically and record the file
/// in the import ledger. Returns the number of rows written.
pub fn commit(
    conn: &mut Connection,
    prepared: &PreparedImport,
    decision: DuplicateDecision,
) -> Result<usize> {
    let selected: Vec<DraftTransaction> = match decision {
        DuplicateDecision::Cancel => return Err(ContasError::Cancelled),
        DuplicateDecision::Force => prepared.drafts.clone(),
        DuplicateDecision::Discard => prepared
            .drafts
            .iter()
            .enumerate()
            .filter(|(idx, _)| !prepared.duplicates.contains_key(idx))
            .map(|(_, d)| d.clone())
            .collect(),
    };

    let account_id = match &prepared.account {
        ResolvedAccount::Linked(a) => Some(a.id),
        _ => None,
    };
    let written = store::create_many(conn, &selected, account_id)?;
    store::record_import(conn, &prepared.filename, &prepared.checksum, &selected)?;
    info!("committed '{}': {written} transactions", prepared.filename);
    Ok(written)
}
