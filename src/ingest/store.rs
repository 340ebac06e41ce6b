use anyhow::Result;
use futures::future::BoxFuture;
use log::{info, debug};
use std::sync::Arc;
use uuid::Uuid;

use crate::children::Child;
use crate::providers::ProviderBinding;
use crate::report::NewReport;

/// Result of the single idempotent report write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created(Uuid),
    /// A report with the same source message id is already stored
    AlreadyExists,
}

/// Persistence gateway used by the orchestrator.
///
/// Uniqueness of `source_message_id` must be enforced by the store itself
/// so that concurrent sync runs cannot both create the same report.
pub trait ReportStore: Send + Sync {
    fn report_exists<'a>(&'a self, source_message_id: &'a str) -> BoxFuture<'a, Result<bool>>;

    fn save_report<'a>(&'a self, report: &'a NewReport) -> BoxFuture<'a, Result<WriteOutcome>>;

    fn list_children(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<Child>>>;

    /// Bindings in configured order
    fn list_provider_bindings(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<ProviderBinding>>>;
}

impl<T: ReportStore + ?Sized> ReportStore for Arc<T> {
    fn report_exists<'a>(&'a self, source_message_id: &'a str) -> BoxFuture<'a, Result<bool>> {
        (**self).report_exists(source_message_id)
    }

    fn save_report<'a>(&'a self, report: &'a NewReport) -> BoxFuture<'a, Result<WriteOutcome>> {
        (**self).save_report(report)
    }

    fn list_children(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<Child>>> {
        (**self).list_children(user_id)
    }

    fn list_provider_bindings(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<ProviderBinding>>> {
        (**self).list_provider_bindings(user_id)
    }
}

/// Reads go to the wrapped store; writes are only logged
pub struct DryRunStore<S> {
    inner: S,
}

impl<S: ReportStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: ReportStore> ReportStore for DryRunStore<S> {
    fn report_exists<'a>(&'a self, source_message_id: &'a str) -> BoxFuture<'a, Result<bool>> {
        self.inner.report_exists(source_message_id)
    }

    fn save_report<'a>(&'a self, report: &'a NewReport) -> BoxFuture<'a, Result<WriteOutcome>> {
        Box::pin(async move {
            info!(
                "🧪 DRY-RUN: would save report for child {} on {} ({} nap(s), {} meal(s), {} bathroom event(s), {} activit(ies), {} photo(s))",
                report.child_id,
                report.report_date,
                report.naps.len(),
                report.meals.len(),
                report.bathroom_events.len(),
                report.activities.len(),
                report.photos.len()
            );
            debug!("{}", serde_json::to_string_pretty(report)?);
            Ok(WriteOutcome::Created(Uuid::nil()))
        })
    }

    fn list_children(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<Child>>> {
        self.inner.list_children(user_id)
    }

    fn list_provider_bindings(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<ProviderBinding>>> {
        self.inner.list_provider_bindings(user_id)
    }
}
