use thiserror::Error;

/// Custom error type for dataset loading and view computation.
#[derive(Error, Debug)]
pub enum ViewError {
    /// The input source contains no data at all.
    #[error("The selected input is empty.")]
    EmptyInput,

    /// The input had records but none decoded into two finite numbers.
    #[error("No valid rows parsed ({invalid_rows} invalid){}", first_error_suffix(.first_error))]
    NoValidRows {
        /// Number of records that failed to decode.
        invalid_rows: u64,
        /// Description of the first decode failure, if one was captured.
        first_error: Option<String>,
    },

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV decode error: {0}")]
    Csv(#[from] csv::Error),

    /// A worker thread is gone or its channel is disconnected.
    #[error("Computation context failure: {0}")]
    ContextFailure(String),

    /// Configuration could not be read or holds an invalid value.
    #[error("Configuration Error: {0}")]
    ConfigError(String),
}

fn first_error_suffix(first_error: &Option<String>) -> String {
    match first_error {
        Some(e) => format!(". First error: {}", e),
        None => String::new(),
    }
}

/// Rejection of a single row by the chunked store.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AppendError {
    #[error("row is not a pair of finite numbers: x={x}, y={y}")]
    NonFinite { x: f64, y: f64 },
}
