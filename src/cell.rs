use calamine::Data;
use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Raw cell union
// ---------------------------------------------------------------------------

/// A spreadsheet cell before coercion. Formula cells carry their computed
/// result alongside the display text; rich-text cells are flattened to
/// their concatenated text.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Computed { result: Box<RawCell>, text: String },
    Rich { text: String },
}

/// Typed scalar produced by coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum CellScalar {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellScalar {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellScalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellScalar::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellScalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Data> for RawCell {
    fn from(data: &Data) -> RawCell {
        match data {
            Data::Empty | Data::Error(_) => RawCell::Empty,
            Data::String(s) => RawCell::Text(s.clone()),
            Data::Float(f) => RawCell::Number(*f),
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Bool(b) => RawCell::Bool(*b),
            Data::DateTime(dt) => RawCell::Date(excel_serial_to_date(dt.as_f64())),
            Data::DateTimeIso(s) => match parse_flex_date(s) {
                Some(d) => RawCell::Date(d),
                None => RawCell::Text(s.clone()),
            },
            Data::DurationIso(s) => RawCell::Text(s.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Coerce a raw cell into a typed scalar. Formula cells prefer their
/// computed result, falling back to the display text. Unparsable cells
/// yield `None`, never an error.
pub fn coerce(raw: &RawCell) -> Option<CellScalar> {
    match raw {
        RawCell::Empty => None,
        RawCell::Number(n) => Some(CellScalar::Number(*n)),
        RawCell::Date(d) => Some(CellScalar::Date(*d)),
        RawCell::Bool(b) => Some(CellScalar::Text(b.to_string())),
        RawCell::Text(s) => coerce_text(s),
        RawCell::Computed { result, text } => coerce(result).or_else(|| coerce_text(text)),
        RawCell::Rich { text } => coerce_text(text),
    }
}

fn coerce_text(raw: &str) -> Option<CellScalar> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(date) = parse_flex_date(trimmed) {
        return Some(CellScalar::Date(date));
    }
    if let Some(n) = parse_locale_number(trimmed) {
        return Some(CellScalar::Number(n));
    }
    Some(CellScalar::Text(trimmed.to_string()))
}

// ---------------------------------------------------------------------------
// Locale parsing helpers
// ---------------------------------------------------------------------------

/// Parse a pt-BR currency/number string: `R$ 1.234,56`-style with `.`
/// thousands and `,` decimal. Plain `1234.56` is accepted too.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let s = raw.replace("R$", "").replace('\u{a0}', " ");
    let mut s = s.trim();
    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner.trim();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.trim();
    }
    let cleaned = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else {
        s.to_string()
    };
    // f64::parse accepts "nan"/"inf"; neither is an amount.
    let value: f64 = cleaned.parse().ok().filter(|v: &f64| v.is_finite())?;
    Some(if negative { -value } else { value })
}

/// Parse a date in the formats ledgers actually contain: `dd/mm/yyyy`,
/// `dd/mm/yy`, `dd-mm-yyyy` or ISO `yyyy-mm-dd`.
pub fn parse_flex_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    // %d/%m/%y must run before %d/%m/%Y: %Y accepts a two-digit year
    // as the literal year 25.
    for fmt in ["%d/%m/%y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }
    None
}

/// Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug).
pub fn excel_serial_to_date(serial: f64) -> NaiveDate {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    base + chrono::Duration::days(serial as i64)
}
