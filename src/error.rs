use thiserror::Error;

/// Failures of the variant-cleaning pass.
///
/// Row numbers are 1-based data rows, the header line excluded.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("row {row}: field `{field}` is not a decimal or null token: {value:?}")]
    MalformedNumber {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("row {row}: field `{field}` is not a recognised timestamp: {value:?}")]
    MalformedTimestamp {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("lineage `{lineage_code}` appears more than once in the label table")]
    DuplicateLabel { lineage_code: String },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
