//! Upload ingestion and transaction cleaning

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::error::{Result, RfmError};
use crate::schema::ColumnIndex;

/// Fixed USD to INR conversion applied to every line amount.
pub const USD_TO_INR_RATE: f64 = 88.0;

/// A parsed upload: column labels plus rows of string cells.
///
/// Both the CSV and the Excel readers land here so the rest of the
/// pipeline is independent of the upload format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One cleaned transaction with its derived line amount.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub invoice_date: NaiveDateTime,
    pub quantity: f64,
    pub unit_price: f64,
    /// quantity * unit_price * [`USD_TO_INR_RATE`]
    pub amount: f64,
}

/// Read an uploaded file into a [`RawTable`] based on its extension.
///
/// # Arguments
/// * `bytes` - Raw upload content
/// * `filename` - Original filename; the extension selects the reader
pub fn read_table(bytes: &[u8], filename: &str) -> Result<RawTable> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".csv") {
        read_csv(bytes)
    } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        read_workbook(bytes)
    } else {
        let extension = lower.rsplit('.').next().unwrap_or("").to_string();
        Err(RfmError::UnsupportedFormat(extension))
    }
}

fn read_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| RfmError::Malformed(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RfmError::Malformed(e.to_string()))?;
        // Short records pad with empty cells, long ones truncate to the header width.
        let row: Vec<String> = (0..columns.len())
            .map(|i| record.get(i).unwrap_or("").to_string())
            .collect();
        rows.push(row);
    }
    Ok(RawTable { columns, rows })
}

fn read_workbook(bytes: &[u8]) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| RfmError::Malformed(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RfmError::Malformed("workbook has no sheets".to_string()))?
        .map_err(|e| RfmError::Malformed(e.to_string()))?;

    let mut rows_iter = range.rows();
    let columns: Vec<String> = match rows_iter.next() {
        Some(header) => header.iter().map(render_cell).collect(),
        None => return Err(RfmError::Malformed("worksheet is empty".to_string())),
    };
    let width = columns.len();

    let rows: Vec<Vec<String>> = rows_iter
        .map(|cells| {
            (0..width)
                .map(|i| cells.get(i).map(render_cell).unwrap_or_default())
                .collect()
        })
        .collect();
    Ok(RawTable { columns, rows })
}

/// Render a spreadsheet cell to the canonical string form used by the cleaner.
///
/// Whole-number floats render without the trailing `.0` so numeric customer
/// ids survive the spreadsheet float round-trip.
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => String::new(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

/// Coerce raw rows into transactions, dropping rows that fail coercion.
///
/// A row survives only with a non-empty customer id, a parseable invoice
/// date, and numeric quantity and price. Losses are logged, not fatal; an
/// upload where nothing survives fails later at aggregation.
pub fn clean_transactions(table: &RawTable, columns: &ColumnIndex) -> Vec<Transaction> {
    let mut transactions = Vec::with_capacity(table.rows.len());
    let mut dropped = 0usize;

    for row in &table.rows {
        let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("").trim();

        let customer_id = cell(columns.customer_id);
        let invoice_date = parse_invoice_date(cell(columns.invoice_date));
        let quantity = parse_numeric(cell(columns.quantity));
        let unit_price = parse_numeric(cell(columns.price));

        match (customer_id.is_empty(), invoice_date, quantity, unit_price) {
            (false, Some(invoice_date), Some(quantity), Some(unit_price)) => {
                let customer_name = columns.customer_name.map(|i| cell(i)).and_then(|name| {
                    if name.is_empty() {
                        None
                    } else {
                        Some(name.to_string())
                    }
                });
                transactions.push(Transaction {
                    customer_id: customer_id.to_string(),
                    customer_name,
                    invoice_date,
                    quantity,
                    unit_price,
                    amount: quantity * unit_price * USD_TO_INR_RATE,
                });
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!(
            dropped,
            total = table.rows.len(),
            "dropped rows that failed type coercion"
        );
    }
    transactions
}

/// Parse an invoice date, trying timestamp formats before date-only ones.
///
/// Month-first layouts are tried before day-first, matching the lenient
/// coercion the upstream datasets were produced with.
fn parse_invoice_date(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    const DATE_FORMATS: [&str; 6] = [
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%Y/%m/%d",
        "%m-%d-%Y",
        "%d-%m-%Y",
    ];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn parse_numeric(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}
