//! Error taxonomy for upload processing and view queries

use thiserror::Error;

/// Errors surfaced by the analysis pipeline and the query views.
///
/// Schema and parse failures abort an upload before the active snapshot
/// is touched, so a failed upload never clobbers prior results.
#[derive(Debug, Error)]
pub enum RfmError {
    /// Required columns absent after alias normalization.
    #[error("missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// Upload with a file extension we cannot read.
    #[error("unsupported file format '{0}'; please upload a CSV or Excel file")]
    UnsupportedFormat(String),

    /// The file extension was recognized but the content could not be read.
    #[error("failed to parse uploaded file: {0}")]
    Malformed(String),

    /// Every row was dropped during cleaning, or the table had no data rows.
    #[error("no usable rows after cleaning; check date and numeric columns")]
    EmptyDataset,

    /// A view was queried before any successful upload.
    #[error("no data uploaded; please upload a dataset first")]
    NoData,

    /// Unexpected failure during computation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Common result type used throughout the crate.
pub type Result<T> = std::result::Result<T, RfmError>;
