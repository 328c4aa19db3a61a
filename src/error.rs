use std::path::PathBuf;

/// Conditions that stop the run. None of them leave a feed behind.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No event containers matched selector '{selector}'")]
    NoCandidatesFound { selector: String },

    #[error("All {skipped} candidate events were skipped")]
    NoEventsParsed { skipped: usize },

    #[error("Invalid {field} selector '{selector}': {reason}")]
    InvalidRule {
        field: &'static str,
        selector: String,
        reason: String,
    },

    #[error("Invalid site origin: {0}")]
    InvalidOrigin(#[from] url::ParseError),

    #[error("Failed to write feed to {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single event block was dropped. Never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
pub enum SkipReason {
    #[error("no date block")]
    MissingDateBlock,

    #[error("expected at least 3 date fragments, found {found}")]
    TooFewDateFragments { found: usize },

    #[error("unreadable day of month '{0}'")]
    InvalidDayOfMonth(String),

    #[error("unknown month '{0}'")]
    InvalidMonth(String),

    #[error("no such date: day {day} of month {month}")]
    NonexistentDate { day: u32, month: u32 },
}
