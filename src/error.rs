//! Error types for the dashboard.
//!
//! Errors stop at the component that raised them: pollers record them,
//! downloads turn them into `Failed` log rows and the UI shows a notice.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filter text that does not parse as JSON
    #[error("Invalid JSON body: {0}")]
    InvalidFilter(String),

    /// Well-formed JSON that cannot be merged into the filter object
    #[error("Invalid JSON body: a JSON object is required, got {0}")]
    FilterNotObject(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network response was not ok (status {0})")]
    Status(u16),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("The download was aborted")]
    Aborted,

    #[error("Report error: {0}")]
    Report(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_names_the_code() {
        let err = DashboardError::Status(503);
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn non_object_filter_says_object_is_required() {
        let err = DashboardError::FilterNotObject("an array");
        assert_eq!(err.to_string(), "Invalid JSON body: a JSON object is required, got an array");
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err: DashboardError = json_err.into();
        assert!(matches!(err, DashboardError::Json(_)));
    }
}
