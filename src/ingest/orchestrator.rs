use anyhow::{Context, Result};
use futures::FutureExt;
use log::{info, warn, error};
use std::panic::AssertUnwindSafe;
use tokio::time::Instant;
use uuid::Uuid;

use crate::children::{resolve_child, Child, ChildMatch};
use crate::email::{extract_html, MessageSource};
use crate::providers::{ProviderBinding, ProviderResolver};
use crate::report::assemble_report;
use crate::report::normalize::ReportKey;

use super::{BatchSummary, IngestError, LogSink, MessageLog, ProcessingOutcome, ReportStore, WriteOutcome};

/// Roster and bindings read once per batch
#[derive(Debug, Clone, Default)]
pub struct BatchContext {
    pub user_id: Uuid,
    pub children: Vec<Child>,
    pub bindings: Vec<ProviderBinding>,
}

/// Drives each message id through dedup, fetch, extract, resolve, parse,
/// child match, assemble and persist. Every id ends in exactly one
/// [`ProcessingOutcome`]; nothing raised by one message reaches the next.
pub struct Orchestrator<M: MessageSource, S: ReportStore> {
    source: M,
    store: S,
    resolver: ProviderResolver,
}

impl<M: MessageSource, S: ReportStore> Orchestrator<M, S> {
    pub fn new(source: M, store: S) -> Self {
        Self::with_resolver(source, store, ProviderResolver::default())
    }

    pub fn with_resolver(source: M, store: S, resolver: ProviderResolver) -> Self {
        Self { source, store, resolver }
    }

    pub fn source(&self) -> &M {
        &self.source
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Search the source and import whatever it returns
    pub async fn sync(
        &self,
        user_id: Uuid,
        query: &str,
        max_results: usize,
        deadline: Option<Instant>,
    ) -> Result<BatchSummary> {
        info!("Searching {} with query '{}'", self.source.source_name(), query);
        let message_ids = self.source.search(query, max_results).await
            .with_context(|| format!("Error searching {}", self.source.source_name()))?;

        if message_ids.is_empty() {
            info!("No daily report emails found");
        }

        Ok(self.run(user_id, &message_ids, deadline).await)
    }

    /// Process `message_ids` in order for `user_id`.
    ///
    /// Ids not started before `deadline` are counted as deferred and stay
    /// eligible for the next run.
    pub async fn run(&self, user_id: Uuid, message_ids: &[String], deadline: Option<Instant>) -> BatchSummary {
        let mut summary = BatchSummary::new(message_ids.len());
        if message_ids.is_empty() {
            return summary;
        }

        let ctx = match self.load_context(user_id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                error!("❌ Unable to load children and provider bindings: {:#}", e);
                for message_id in message_ids {
                    summary.record(message_id, ProcessingOutcome::Error { message: format!("{:#}", e) });
                }
                return summary;
            }
        };

        info!(
            "Processing {} message(s) for user {} ({} child(ren), {} provider binding(s))",
            message_ids.len(),
            user_id,
            ctx.children.len(),
            ctx.bindings.len()
        );

        for (index, message_id) in message_ids.iter().enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                summary.deferred = message_ids.len() - index;
                warn!("⏱️  Deadline reached, {} message(s) deferred to the next run", summary.deferred);
                break;
            }

            let outcome = self.process_message(&ctx, message_id).await;
            info!("📧 {}/{} {}: {}", index + 1, message_ids.len(), message_id, outcome.label());
            summary.record(message_id, outcome);
        }

        info!("✅ Sync finished: {}", summary);
        summary
    }

    /// Snapshot of the user's roster and bindings
    pub async fn load_context(&self, user_id: Uuid) -> Result<BatchContext> {
        let children = self.store.list_children(user_id).await
            .context("Unable to list children")?;
        let bindings = self.store.list_provider_bindings(user_id).await
            .context("Unable to list provider bindings")?;

        Ok(BatchContext { user_id, children, bindings })
    }

    /// Process one message to its terminal outcome
    pub async fn process_message(&self, ctx: &BatchContext, message_id: &str) -> ProcessingOutcome {
        let log = MessageLog::new(message_id);

        let result = AssertUnwindSafe(self.try_process(ctx, message_id, &log))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(IngestError::Unexpected(panic_message(panic.as_ref()))));

        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.is_retryable() {
                    log.error(&err.to_string());
                } else {
                    log.warn(&err.to_string());
                }
                err.into()
            }
        }
    }

    async fn try_process(&self, ctx: &BatchContext, message_id: &str, log: &MessageLog) -> Result<ProcessingOutcome, IngestError> {
        let exists = self.store.report_exists(message_id).await
            .map_err(|e| IngestError::Persistence(format!("{:#}", e)))?;
        if exists {
            log.info("Report already imported, skipping");
            return Ok(ProcessingOutcome::SkippedExists);
        }

        let message = self.source.fetch(message_id).await
            .context("Unable to fetch message")?;

        let sender = message.sender_email();
        let log = log.with_sender(&sender);
        log.debug(&format!("Subject: {}", message.subject.as_deref().unwrap_or("(none)")));

        let html = extract_html(&message.payload, &log)?;
        if html.trim().is_empty() {
            return Err(IngestError::NoHtmlFound);
        }

        let resolution = self.resolver.resolve(&sender, &ctx.bindings, &log)
            .ok_or_else(|| IngestError::NoParserFound(sender.clone()))?;
        log.info(&format!("Using {} parser ({:?})", resolution.strategy, resolution.via));

        let parsed = resolution.strategy.parse(&html, &log)
            .ok_or_else(|| IngestError::ParseFailure(format!("not a {} daily report", resolution.strategy)))?;

        let child_id = match resolve_child(&parsed.child_name_raw, ctx.user_id, &ctx.children) {
            ChildMatch::Found { id, first_name } => {
                log.debug(&format!("'{}' resolved to {}", parsed.child_name_raw, first_name));
                id
            }
            ChildMatch::NotFound => return Err(IngestError::ChildNotFound(parsed.child_name_raw.clone())),
            ChildMatch::Ambiguous { candidates } => {
                return Err(IngestError::AmbiguousChildMatch {
                    name: parsed.child_name_raw.clone(),
                    candidates,
                })
            }
        };

        let key = ReportKey {
            user_id: ctx.user_id,
            child_id,
            message_id,
            provider: resolution.strategy.id(),
        };
        let report = assemble_report(&parsed, key, &log)?;

        match self.store.save_report(&report).await.map_err(|e| IngestError::Persistence(format!("{:#}", e)))? {
            WriteOutcome::Created(report_id) => {
                log.info(&format!("💾 Saved report {} for {}", report_id, report.report_date));
                Ok(ProcessingOutcome::Success { report_id })
            }
            WriteOutcome::AlreadyExists => {
                log.info("Report created by a concurrent run, skipping");
                Ok(ProcessingOutcome::SkippedExists)
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic while processing message".to_string()
    }
}
