//! Failure taxonomy of the ingestion pipeline

use thiserror::Error;

/// Every way a single message can fail to become a persisted report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Body transport encoding could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// No HTML part in the message
    #[error("no HTML body found")]
    NoHtmlFound,

    /// The strategy could not find the child name or report date
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// No strategy resolves for this sender
    #[error("no parser found for sender {0}")]
    NoParserFound(String),

    #[error("no child matches '{0}'")]
    ChildNotFound(String),

    /// More than one roster entry matches the parsed name
    #[error("'{name}' matches several children: {}", candidates.join(", "))]
    AmbiguousChildMatch { name: String, candidates: Vec<String> },

    #[error("invalid report date '{0}'")]
    InvalidDate(String),

    /// Persistence gateway failed (read or write)
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Anything else: fetch failures, bugs, unexpected states
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl IngestError {
    /// Expected data-quality conditions: logged as warnings, never retried
    pub fn is_data_quality(&self) -> bool {
        !self.is_retryable()
    }

    /// Persistence and unexpected failures may succeed on a later sync run
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::Persistence(_) | IngestError::Unexpected(_))
    }
}

impl From<anyhow::Error> for IngestError {
    fn from(err: anyhow::Error) -> Self {
        IngestError::Unexpected(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(IngestError::Persistence("down".into()).is_retryable());
        assert!(IngestError::Unexpected("boom".into()).is_retryable());
        assert!(IngestError::NoHtmlFound.is_data_quality());
        assert!(IngestError::InvalidDate("x".into()).is_data_quality());
        assert!(IngestError::AmbiguousChildMatch { name: "Em".into(), candidates: vec![] }.is_data_quality());
    }

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = IngestError::AmbiguousChildMatch {
            name: "Em".into(),
            candidates: vec!["Emma".into(), "Emmanuel".into()],
        };
        assert_eq!(err.to_string(), "'Em' matches several children: Emma, Emmanuel");
    }
}
