/// Per-message pipeline: outcomes, the persistence seam and the orchestrator
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod store;

pub use context::{LogSink, MessageLog, NullLog};
pub use error::IngestError;
pub use orchestrator::{BatchContext, Orchestrator};
pub use outcome::{BatchSummary, MessageOutcome, ProcessingOutcome};
pub use store::{DryRunStore, ReportStore, WriteOutcome};
