//! Harvest error types.

use thiserror::Error;

/// Errors raised while locating, loading or exporting history records.
///
/// Extraction misses (`NoContainerFound`, `EmptyFieldFallback`) and
/// `GrowthTimeout` are soft signals that loaders absorb locally; only
/// network and session failures reach the caller. The type is `Clone` so a
/// memoized load can hand the same outcome to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HarvestError {
    #[error("No record container found")]
    NoContainerFound,

    #[error("Timed out waiting for new rows")]
    GrowthTimeout,

    #[error("Failed to fetch page {page}: {reason}")]
    PageFetchFailure { page: u32, reason: String },

    #[error("Field not found: {field}")]
    EmptyFieldFallback { field: String },

    #[error("Harvest superseded by a newer operation")]
    Superseded,

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl HarvestError {
    /// Build a fetch failure for the given 1-based page index.
    pub fn page_fetch(page: u32, reason: impl Into<String>) -> Self {
        Self::PageFetchFailure {
            page,
            reason: reason.into(),
        }
    }

    /// Short label naming the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoContainerFound => "NoContainerFound",
            Self::GrowthTimeout => "GrowthTimeout",
            Self::PageFetchFailure { .. } => "PageFetchFailure",
            Self::EmptyFieldFallback { .. } => "EmptyFieldFallback",
            Self::Superseded => "Superseded",
            Self::Browser(_) => "Browser",
            Self::Config(_) => "Config",
            Self::Io(_) => "Io",
        }
    }

    /// Message shown to the user on failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::PageFetchFailure { page, .. } => format!("Load failed: {} (page {})", self.kind(), page),
            Self::EmptyFieldFallback { field } => format!("Load failed: {} ({})", self.kind(), field),
            _ => format!("Load failed: {}", self.kind()),
        }
    }

    /// Whether the caller can resume from a specific page.
    pub fn failed_page(&self) -> Option<u32> {
        match self {
            Self::PageFetchFailure { page, .. } => Some(*page),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_fetch_failure_carries_page_index() {
        let err = HarvestError::page_fetch(3, "HTTP 502");
        assert_eq!(err.failed_page(), Some(3));
        assert!(err.to_string().contains("page 3"));
        assert_eq!(err.user_message(), "Load failed: PageFetchFailure (page 3)");
    }

    #[test]
    fn user_message_names_field() {
        let err = HarvestError::EmptyFieldFallback {
            field: "title".to_string(),
        };
        assert_eq!(err.user_message(), "Load failed: EmptyFieldFallback (title)");
        assert_eq!(err.failed_page(), None);
    }
}
