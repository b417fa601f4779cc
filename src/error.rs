//! The error type returned across the `generate_report` boundary.
//!
//! Per-source failures never reach this type: connectors absorb them into
//! "no data" records. Parser mismatches are absorbed into empty sections.
//! What remains is invalid input, embedding or generation failures, and
//! the caller-side timeout.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("unknown country: '{0}'")]
    UnknownCountry(String),

    #[error("failed to embed passages: {0}")]
    Embedding(String),

    #[error("failed to generate report: {0}")]
    Generation(String),

    #[error("failed to generate report: the model returned no text")]
    EmptyGeneration,

    #[error("report generation timed out after {0} seconds")]
    Timeout(u64),
}

impl ReportError {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::InvalidDateRange { .. } => "invalid_date_range",
            ReportError::UnknownCountry(_) => "unknown_country",
            ReportError::Embedding(_) => "embedding_failed",
            ReportError::Generation(_) | ReportError::EmptyGeneration => "generation_failed",
            ReportError::Timeout(_) => "timeout",
        }
    }

    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ReportError::InvalidDateRange { .. } | ReportError::UnknownCountry(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        let err = ReportError::Generation("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "failed to generate report: connection refused"
        );
        assert_eq!(err.code(), "generation_failed");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_errors() {
        assert!(ReportError::UnknownCountry("Narnia".to_string()).is_client_error());
        assert_eq!(ReportError::Timeout(30).code(), "timeout");
    }
}
