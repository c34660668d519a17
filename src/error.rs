//! Error types for scoring and for the per-symbol pipeline.

use thiserror::Error;

/// Errors raised by the anomaly scorer.
#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("Invalid input: row {row} is missing required feature '{field}'")]
    InvalidInput { row: usize, field: String },

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Result type for scorer operations.
pub type Result<T> = std::result::Result<T, ScorerError>;

/// Errors raised while processing one symbol.
///
/// None of these are fatal to the polling loop: a failing symbol is
/// reported and skipped for the cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No data fetched for {symbol}")]
    NoData { symbol: String },

    #[error("Fetch failed for {symbol}: {reason}")]
    Fetch { symbol: String, reason: String },

    #[error(transparent)]
    Scoring(#[from] ScorerError),

    #[error("Delivery failed for {symbol}: {reason}")]
    Delivery { symbol: String, reason: String },

    #[error("Insight generation failed: {0}")]
    InsightGeneration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let error = ScorerError::InvalidInput {
            row: 3,
            field: "volume".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid input: row 3 is missing required feature 'volume'"
        );
    }

    #[test]
    fn test_invalid_parameter_display() {
        let error = ScorerError::InvalidParameter {
            name: "contamination".to_string(),
            reason: "must be in (0, 0.5]".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid parameter: contamination - must be in (0, 0.5]"
        );
    }

    #[test]
    fn test_scoring_error_is_transparent() {
        let error: PipelineError = ScorerError::InvalidInput {
            row: 0,
            field: "close".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "Invalid input: row 0 is missing required feature 'close'"
        );
    }

    #[test]
    fn test_no_data_display() {
        let error = PipelineError::NoData {
            symbol: "AAPL".to_string(),
        };
        assert_eq!(error.to_string(), "No data fetched for AAPL");
    }

    #[test]
    fn test_task_display() {
        let error = PipelineError::Task("task 7 panicked".to_string());
        assert_eq!(error.to_string(), "Worker task failed: task 7 panicked");
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScorerError>();
        assert_send_sync::<PipelineError>();
    }
}
