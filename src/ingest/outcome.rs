use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::IngestError;

/// Terminal result for one source message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Success { report_id: Uuid },
    SkippedExists,
    SkippedChildNotFound { child_name: String },
    SkippedAmbiguousChildMatch { child_name: String, candidates: Vec<String> },
    SkippedInvalidData { reason: String },
    SkippedNoParserFound { sender: String },
    Error { message: String },
}

impl ProcessingOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingOutcome::Success { .. } => "imported",
            ProcessingOutcome::SkippedExists => "skipped (already imported)",
            ProcessingOutcome::SkippedChildNotFound { .. } => "skipped (child not found)",
            ProcessingOutcome::SkippedAmbiguousChildMatch { .. } => "skipped (ambiguous child)",
            ProcessingOutcome::SkippedInvalidData { .. } => "skipped (invalid data)",
            ProcessingOutcome::SkippedNoParserFound { .. } => "skipped (no parser)",
            ProcessingOutcome::Error { .. } => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingOutcome::Success { .. })
    }
}

impl From<IngestError> for ProcessingOutcome {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Decode(_)
            | IngestError::NoHtmlFound
            | IngestError::ParseFailure(_)
            | IngestError::InvalidDate(_) => ProcessingOutcome::SkippedInvalidData { reason: err.to_string() },
            IngestError::NoParserFound(sender) => ProcessingOutcome::SkippedNoParserFound { sender },
            IngestError::ChildNotFound(child_name) => ProcessingOutcome::SkippedChildNotFound { child_name },
            IngestError::AmbiguousChildMatch { name, candidates } => {
                ProcessingOutcome::SkippedAmbiguousChildMatch { child_name: name, candidates }
            }
            IngestError::Persistence(_) | IngestError::Unexpected(_) => {
                ProcessingOutcome::Error { message: err.to_string() }
            }
        }
    }
}

impl fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingOutcome::Success { report_id } => write!(f, "imported as report {}", report_id),
            ProcessingOutcome::SkippedExists => f.write_str("already imported"),
            ProcessingOutcome::SkippedChildNotFound { child_name } => write!(f, "no child matches '{}'", child_name),
            ProcessingOutcome::SkippedAmbiguousChildMatch { child_name, candidates } => {
                write!(f, "'{}' is ambiguous ({})", child_name, candidates.join(", "))
            }
            ProcessingOutcome::SkippedInvalidData { reason } => write!(f, "invalid data: {}", reason),
            ProcessingOutcome::SkippedNoParserFound { sender } => write!(f, "no parser for {}", sender),
            ProcessingOutcome::Error { message } => write!(f, "error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageOutcome {
    pub message_id: String,
    pub outcome: ProcessingOutcome,
}

/// Counts per outcome category plus the per-message list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total_found: usize,
    pub imported: usize,
    pub skipped_exists: usize,
    pub skipped_child_not_found: usize,
    pub skipped_invalid_data: usize,
    pub skipped_no_parser_found: usize,
    pub skipped_ambiguous_child_match: usize,
    pub errors: usize,
    /// Ids left unattempted because the run deadline passed
    pub deferred: usize,
    pub outcomes: Vec<MessageOutcome>,
}

impl BatchSummary {
    pub fn new(total_found: usize) -> Self {
        Self {
            total_found,
            ..Default::default()
        }
    }

    pub fn record(&mut self, message_id: &str, outcome: ProcessingOutcome) {
        match &outcome {
            ProcessingOutcome::Success { .. } => self.imported += 1,
            ProcessingOutcome::SkippedExists => self.skipped_exists += 1,
            ProcessingOutcome::SkippedChildNotFound { .. } => self.skipped_child_not_found += 1,
            ProcessingOutcome::SkippedAmbiguousChildMatch { .. } => self.skipped_ambiguous_child_match += 1,
            ProcessingOutcome::SkippedInvalidData { .. } => self.skipped_invalid_data += 1,
            ProcessingOutcome::SkippedNoParserFound { .. } => self.skipped_no_parser_found += 1,
            ProcessingOutcome::Error { .. } => self.errors += 1,
        }
        self.outcomes.push(MessageOutcome {
            message_id: message_id.to_string(),
            outcome,
        });
    }

    /// Messages that reached a terminal outcome
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn skipped(&self) -> usize {
        self.skipped_exists
            + self.skipped_child_not_found
            + self.skipped_invalid_data
            + self.skipped_no_parser_found
            + self.skipped_ambiguous_child_match
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} found, {} imported, {} already imported, {} child not found, {} ambiguous child, \
             {} invalid data, {} no parser, {} error(s)",
            self.total_found,
            self.imported,
            self.skipped_exists,
            self.skipped_child_not_found,
            self.skipped_ambiguous_child_match,
            self.skipped_invalid_data,
            self.skipped_no_parser_found,
            self.errors
        )?;
        if self.deferred > 0 {
            write!(f, ", {} deferred to the next run", self.deferred)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            ProcessingOutcome::from(IngestError::Decode("bad".into())),
            ProcessingOutcome::SkippedInvalidData { .. }
        ));
        assert!(matches!(
            ProcessingOutcome::from(IngestError::NoHtmlFound),
            ProcessingOutcome::SkippedInvalidData { .. }
        ));
        assert!(matches!(
            ProcessingOutcome::from(IngestError::InvalidDate("x".into())),
            ProcessingOutcome::SkippedInvalidData { .. }
        ));
        assert_eq!(
            ProcessingOutcome::from(IngestError::NoParserFound("a@b.c".into())),
            ProcessingOutcome::SkippedNoParserFound { sender: "a@b.c".into() }
        );
        assert!(matches!(
            ProcessingOutcome::from(IngestError::Persistence("db down".into())),
            ProcessingOutcome::Error { .. }
        ));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = BatchSummary::new(4);
        summary.record("a", ProcessingOutcome::Success { report_id: Uuid::nil() });
        summary.record("b", ProcessingOutcome::SkippedExists);
        summary.record("c", ProcessingOutcome::Error { message: "x".into() });
        summary.record("d", ProcessingOutcome::SkippedInvalidData { reason: "y".into() });

        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped_exists, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.processed(), 4);
        assert!(summary.to_string().starts_with("4 found, 1 imported, 1 already imported"));
    }
}
