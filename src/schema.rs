//! Column name normalization for heterogeneous input schemas

use crate::error::{Result, RfmError};

/// Canonical column names required for RFM computation.
pub const REQUIRED_COLUMNS: [&str; 4] = ["customerid", "invoicedate", "quantity", "price"];

/// Known header spellings, matched after trimming and lowercasing.
const COLUMN_ALIASES: [(&str, &str); 12] = [
    ("customerid", "customerid"),
    ("customer_id", "customerid"),
    ("customername", "customername"),
    ("customer_name", "customername"),
    ("invoicedate", "invoicedate"),
    ("invoice_date", "invoicedate"),
    ("date", "invoicedate"),
    ("quantity", "quantity"),
    ("qty", "quantity"),
    ("price", "price"),
    ("unitprice", "price"),
    ("unit_price", "price"),
];

/// Resolved cell positions of the canonical columns within a raw table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    pub customer_id: usize,
    pub invoice_date: usize,
    pub quantity: usize,
    pub price: usize,
    /// Present only when the upload carried a customer name column.
    pub customer_name: Option<usize>,
}

/// Map a raw header label to its canonical column name, if known.
fn canonical(label: &str) -> Option<&'static str> {
    let normalized = label.trim().to_lowercase();
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, name)| *name)
}

/// Resolve the canonical schema against the upload's header row.
///
/// Unknown columns are ignored. When two headers map to the same canonical
/// name, the leftmost one wins. Fails with a `MissingColumns` error naming
/// every absent required field.
///
/// # Arguments
/// * `headers` - Raw column labels in original order
pub fn resolve_columns(headers: &[String]) -> Result<ColumnIndex> {
    let position = |name: &str| {
        headers
            .iter()
            .position(|label| canonical(label) == Some(name))
    };

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| position(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(RfmError::MissingColumns { missing });
    }

    Ok(ColumnIndex {
        customer_id: position("customerid").unwrap_or_default(),
        invoice_date: position("invoicedate").unwrap_or_default(),
        quantity: position("quantity").unwrap_or_default(),
        price: position("price").unwrap_or_default(),
        customer_name: position("customername"),
    })
}
