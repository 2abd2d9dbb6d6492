use std::path::Path;

use log::debug;

use crate::cell::{coerce, CellScalar, RawCell};
use crate::error::{ContasError, Result};
use crate::models::{Direction, DraftTransaction};

// Accepted header spellings per semantic field, to tolerate locale
// variants. First columns win when a file repeats a header.
const DATE_HEADERS: &[&str] = &["data", "date", "dia"];
const DIRECTION_HEADERS: &[&str] = &["tipo", "type", "direcao", "dire\u{e7}\u{e3}o"];
const DESCRIPTION_HEADERS: &[&str] = &[
    "descricao",
    "descri\u{e7}\u{e3}o",
    "description",
    "historico",
    "hist\u{f3}rico",
];
const AMOUNT_HEADERS: &[&str] = &["valor", "amount", "quantia"];
const CATEGORY_HEADERS: &[&str] = &["categoria", "category"];
const NOTES_HEADERS: &[&str] = &["obs", "observacoes", "observa\u{e7}\u{f5}es", "notes", "notas"];

#[derive(Debug, Clone)]
pub struct FlatFileOptions {
    /// Single-character field delimiter.
    pub delimiter: u8,
    /// When false the file carries no header row and the default column
    /// order applies: date, direction, description, amount, category, notes.
    pub has_header: bool,
}

impl Default for FlatFileOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
        }
    }
}

#[derive(Debug, Clone)]
struct ColumnMap {
    date: usize,
    direction: usize,
    description: usize,
    amount: Option<usize>,
    category: Option<usize>,
    notes: Option<usize>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            date: 0,
            direction: 1,
            description: 2,
            amount: Some(3),
            category: Some(4),
            notes: Some(5),
        }
    }
}

fn find_header(record: &csv::StringRecord, synonyms: &[&str]) -> Option<usize> {
    record.iter().position(|field| {
        let f = field.trim().to_lowercase();
        synonyms.contains(&f.as_str())
    })
}

fn map_columns(record: &csv::StringRecord) -> Option<ColumnMap> {
    let date = find_header(record, DATE_HEADERS)?;
    let direction = find_header(record, DIRECTION_HEADERS)?;
    let description = find_header(record, DESCRIPTION_HEADERS)?;
    Some(ColumnMap {
        date,
        direction,
        description,
        amount: find_header(record, AMOUNT_HEADERS),
        category: find_header(record, CATEGORY_HEADERS),
        notes: find_header(record, NOTES_HEADERS),
    })
}

fn field_scalar(record: &csv::StringRecord, col: usize) -> Option<CellScalar> {
    record
        .get(col)
        .map(|f| RawCell::Text(f.to_string()))
        .as_ref()
        .and_then(coerce)
}

/// Parse a single delimited file into drafts. Rows missing date,
/// direction or description after coercion are dropped; flat files are
/// assumed pre-flattened, so no installment expansion happens here.
pub fn parse_flat_file(path: &Path, opts: &FlatFileOptions) -> Result<Vec<DraftTransaction>> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(opts.delimiter)
        .from_reader(std::io::BufReader::new(file));

    let mut columns = if opts.has_header {
        None
    } else {
        Some(ColumnMap::default())
    };
    let mut drafts = Vec::new();
    let mut dropped = 0usize;

    for result in rdr.records() {
        let record = result?;
        let Some(cols) = columns.as_ref() else {
            columns = map_columns(&record);
            continue;
        };
        match parse_record(&record, cols) {
            Some(draft) => drafts.push(draft),
            None => dropped += 1,
        }
    }
    // Never finding a header would otherwise yield an empty Ok and hide
    // a wrong file or delimiter.
    if columns.is_none() {
        return Err(ContasError::Other(format!(
            "{}: no header row matched known column names (need date, type and description)",
            path.display()
        )));
    }
    if dropped > 0 {
        debug!("flat file {}: dropped {dropped} incomplete rows", path.display());
    }
    Ok(drafts)
}

fn parse_record(record: &csv::StringRecord, cols: &ColumnMap) -> Option<DraftTransaction> {
    if record.iter().all(|f| f.trim().is_empty()) {
        return None;
    }
    let date = field_scalar(record, cols.date)?.as_date()?;
    let direction = Direction::from_keyword(record.get(cols.direction)?.trim())?;
    let description = record.get(cols.description)?.trim().to_string();
    if description.is_empty() {
        return None;
    }
    let amount = cols
        .amount
        .and_then(|c| field_scalar(record, c))
        .and_then(|s| s.as_number())
        .unwrap_or(0.0);

    let mut draft = DraftTransaction::new(date, &description, amount.abs(), direction);
    if let Some(cat) = cols
        .category
        .and_then(|c| record.get(c))
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        draft.category = cat.to_string();
    }
    if let Some(notes) = cols
        .notes
        .and_then(|c| record.get(c))
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        draft.notes = Some(notes.to_string());
    }
    Some(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_with_pt_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "extrato.csv",
            "Data,Tipo,Descri\u{e7}\u{e3}o,Valor,Categoria\n\
             15/01/2025,Saida,Mercado Central,\"R$ 150,00\",Alimenta\u{e7}\u{e3}o\n\
             20/01/2025,Entrada,Sal\u{e1}rio,\"5.000,00\",Renda\n",
        );
        let drafts = parse_flat_file(&path, &FlatFileOptions::default()).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].amount, 150.0);
        assert_eq!(drafts[0].direction, Direction::Expense);
        assert_eq!(drafts[0].category, "Alimenta\u{e7}\u{e3}o");
        assert_eq!(drafts[1].direction, Direction::Income);
        assert_eq!(drafts[1].amount, 5000.0);
    }

    #[test]
    fn test_parse_with_en_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "export.csv",
            "Date,Type,Description,Amount\n2025-01-15,expense,Groceries,99.90\n",
        );
        let drafts = parse_flat_file(&path, &FlatFileOptions::default()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].amount, 99.9);
        assert_eq!(drafts[0].description, "Groceries");
    }

    #[test]
    fn test_incomplete_rows_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "extrato.csv",
            "Data,Tipo,Descricao,Valor\n\
             15/01/2025,Saida,Mercado,100\n\
             not-a-date,Saida,Padaria,10\n\
             16/01/2025,???,Farmacia,20\n",
        );
        let drafts = parse_flat_file(&path, &FlatFileOptions::default()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].description, "Mercado");
    }

    #[test]
    fn test_custom_delimiter_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "extrato.txt",
            "15/01/2025;Saida;Mercado;\"1.234,56\"\n",
        );
        let opts = FlatFileOptions {
            delimiter: b';',
            has_header: false,
        };
        let drafts = parse_flat_file(&path, &opts).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].amount, 1234.56);
    }

    #[test]
    fn test_unrecognized_headers_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "saldo.csv",
            "Conta,Saldo,Limite\nCorrente,1000,5000\n",
        );
        let err = parse_flat_file(&path, &FlatFileOptions::default()).unwrap_err();
        assert!(err.to_string().contains("no header row"));
    }

    #[test]
    fn test_missing_amount_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "extrato.csv",
            "Data,Tipo,Descricao\n15/01/2025,Saida,Mercado\n",
        );
        let drafts = parse_flat_file(&path, &FlatFileOptions::default()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].amount, 0.0);
    }
}
