//! Error types for attribute control charts.

use thiserror::Error;

/// Result type for chart accessors.
pub type Result<T> = std::result::Result<T, ChartError>;

/// Errors returned by chart accessors.
///
/// Charts perform no input validation, so the only recoverable failure is
/// asking for a sample that was never appended.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChartError {
    /// A per-sample accessor was called with an index past the end of the
    /// sample sequence.
    #[error("sample index {index} out of range for chart with {len} samples")]
    SampleIndexOutOfRange {
        /// The requested zero-based index.
        index: usize,
        /// The number of samples currently on the chart.
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_error_message() {
        let err = ChartError::SampleIndexOutOfRange { index: 7, len: 3 };
        assert_eq!(
            err.to_string(),
            "sample index 7 out of range for chart with 3 samples"
        );
    }
}
