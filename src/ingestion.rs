//! Deterministic parsing of delimited statement exports.
//!
//! No external service is involved here: a table whose headers match the
//! known vocabulary becomes canonical transactions directly, anything else
//! is reported as [`TableParse::Unrecognized`] so the router can decide on a
//! fallback.

use log::debug;

use crate::error::{EmptyCause, Result, StatementError};
use crate::schema::{ExtractionOutcome, Transaction};
use crate::utils::{coerce_amount, normalize_date};

const DATE_NAMES: &[&str] = &[
    "date",
    "transaction date",
    "txn date",
    "value date",
    "posting date",
    "post date",
    "trans date",
];
const DESCRIPTION_NAMES: &[&str] = &[
    "description",
    "narration",
    "particulars",
    "details",
    "remarks",
    "transaction details",
    "memo",
    "payee",
];
const SIGNED_AMOUNT_NAMES: &[&str] = &["amount", "transaction amount"];
const OUTFLOW_NAMES: &[&str] = &["debit", "withdrawal", "withdrawals", "debit amount"];
const INFLOW_NAMES: &[&str] = &["credit", "deposit", "deposits", "credit amount"];
const CATEGORY_NAMES: &[&str] = &["category", "transaction category"];

/// Where the money column(s) of a table live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountColumns {
    /// One column already carrying the sign.
    Signed(usize),
    /// Separate debit/credit style columns; at least one is present.
    Split {
        outflow: Option<usize>,
        inflow: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRoles {
    pub date: usize,
    pub description: usize,
    pub amount: AmountColumns,
    pub category: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableParse {
    /// Headers matched; this is the complete deterministic result.
    Parsed(ExtractionOutcome),
    /// At least one required role has no matching column.
    Unrecognized,
}

/// Interpret raw upload bytes as text.
///
/// UTF-8 (with or without BOM) and BOM-marked UTF-16 are honoured; anything
/// else is read as Latin-1. Whatever the encoding, C0 control characters
/// other than tab, line breaks and form feed mark the upload as binary.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    let text = if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        decode_utf16(rest, u16::from_le_bytes)?
    } else if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        decode_utf16(rest, u16::from_be_bytes)?
    } else {
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        }
    };

    if let Some(c) = text.chars().find(|&c| is_binary_control(c)) {
        return Err(StatementError::Decode(format!(
            "file is not text (control byte 0x{:02x})",
            c as u32
        )));
    }
    Ok(text)
}

fn is_binary_control(c: char) -> bool {
    (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r' | '\x0C')
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(StatementError::Decode(
            "UTF-16 input has an odd number of bytes".to_string(),
        ));
    }
    let units = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| StatementError::Decode(e.to_string()))
}

fn find_column(lookup: &[String], vocabulary: &[&str]) -> Option<usize> {
    vocabulary
        .iter()
        .find_map(|name| lookup.iter().position(|h| h == name))
}

/// Map declared headers onto the date/description/amount roles.
pub fn resolve_columns<S: AsRef<str>>(headers: &[S]) -> Option<ColumnRoles> {
    let lookup: Vec<String> = headers
        .iter()
        .map(|h| h.as_ref().trim().to_lowercase())
        .collect();

    let date = find_column(&lookup, DATE_NAMES)?;
    let description = find_column(&lookup, DESCRIPTION_NAMES)?;

    let amount = match find_column(&lookup, SIGNED_AMOUNT_NAMES) {
        Some(idx) => AmountColumns::Signed(idx),
        None => {
            let outflow = find_column(&lookup, OUTFLOW_NAMES);
            let inflow = find_column(&lookup, INFLOW_NAMES);
            if outflow.is_none() && inflow.is_none() {
                return None;
            }
            AmountColumns::Split { outflow, inflow }
        }
    };

    Some(ColumnRoles {
        date,
        description,
        amount,
        category: find_column(&lookup, CATEGORY_NAMES),
    })
}

impl ColumnRoles {
    fn amount_of(&self, record: &csv::StringRecord) -> f64 {
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
        match self.amount {
            AmountColumns::Signed(idx) => coerce_amount(cell(Some(idx))),
            AmountColumns::Split { outflow, inflow } => {
                coerce_amount(cell(inflow)).abs() - coerce_amount(cell(outflow)).abs()
            }
        }
    }

    fn to_transaction(&self, record: &csv::StringRecord) -> Option<Transaction> {
        let date = normalize_date(record.get(self.date)?)?;
        let description = record.get(self.description)?.to_string();
        let category = self
            .category
            .and_then(|idx| record.get(idx))
            .map(str::to_string);

        Some(Transaction::new(
            date,
            description,
            self.amount_of(record),
            category,
        ))
    }
}

/// Parse delimited statement text without calling any external service.
///
/// Malformed tables yield an empty outcome rather than an error. Rows may
/// have any number of cells; a row missing a required cell is skipped, as is
/// a row whose amount folds to exactly zero, which also drops genuine
/// zero-value transactions.
pub fn normalize_table(text: &str) -> TableParse {
    if text.trim().is_empty() {
        return TableParse::Parsed(ExtractionOutcome::empty(EmptyCause::NoRecords));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(str::to_string).collect(),
        Err(e) => {
            debug!("Unparsable table header: {}", e);
            return TableParse::Parsed(ExtractionOutcome::empty(EmptyCause::UnparsableTable));
        }
    };

    let roles = match resolve_columns(&headers) {
        Some(roles) => roles,
        None => {
            debug!("No known column vocabulary in headers {:?}", headers);
            return TableParse::Unrecognized;
        }
    };
    debug!("Resolved column roles {:?} from {:?}", roles, headers);

    let mut transactions = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("Malformed table row: {}", e);
                return TableParse::Parsed(ExtractionOutcome::empty(EmptyCause::UnparsableTable));
            }
        };

        match roles.to_transaction(&record) {
            Some(txn) if txn.amount != 0.0 => transactions.push(txn),
            _ => skipped += 1,
        }
    }

    debug!(
        "Deterministic table parse kept {} rows, skipped {}",
        transactions.len(),
        skipped
    );

    TableParse::Parsed(ExtractionOutcome::found(transactions))
}
