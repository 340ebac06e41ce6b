use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use daycare_reports::children::Child;
use daycare_reports::email::{encode_body, EmlDirectorySource, MessageSource, MimePart, SourceMessage};
use daycare_reports::ingest::{BatchSummary, DryRunStore, Orchestrator, ProcessingOutcome, ReportStore, WriteOutcome};
use daycare_reports::providers::ProviderBinding;
use daycare_reports::report::NewReport;

const TADPOLES_SENDER: &str = "Tadpoles <noreply@tadpoles.com>";

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("data_test/{}", name))
        .unwrap_or_else(|e| panic!("Failed to read data_test/{}: {}", name, e))
}

fn html_message(id: &str, from: &str, html: &str) -> SourceMessage {
    SourceMessage {
        id: id.to_string(),
        from: from.to_string(),
        subject: Some("Daily Report".to_string()),
        payload: MimePart::multipart(
            "multipart/alternative",
            vec![
                MimePart::leaf("text/plain", encode_body(b"View in HTML")),
                MimePart::leaf("text/html", encode_body(html.as_bytes())),
            ],
        ),
    }
}

/// In-memory inbox; ids listed in insertion order
#[derive(Default)]
struct FakeInbox {
    order: Vec<String>,
    messages: HashMap<String, SourceMessage>,
    /// Ids whose fetch panics instead of returning
    panicking: HashSet<String>,
}

impl FakeInbox {
    fn with(mut self, message: SourceMessage) -> Self {
        self.order.push(message.id.clone());
        self.messages.insert(message.id.clone(), message);
        self
    }

    fn ids(&self) -> Vec<String> {
        self.order.clone()
    }
}

impl MessageSource for FakeInbox {
    fn search<'a>(&'a self, _query: &'a str, max_results: usize) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move { Ok(self.order.iter().take(max_results).cloned().collect()) })
    }

    fn fetch<'a>(&'a self, message_id: &'a str) -> BoxFuture<'a, Result<SourceMessage>> {
        Box::pin(async move {
            if self.panicking.contains(message_id) {
                panic!("mailbox decoder blew up on {}", message_id);
            }
            self.messages.get(message_id)
                .cloned()
                .ok_or_else(|| anyhow!("message {} not found", message_id))
        })
    }

    fn source_name(&self) -> &str {
        "fake inbox"
    }
}

/// In-memory store with the same uniqueness rule as the database
#[derive(Default)]
struct MemoryStore {
    children: Vec<Child>,
    bindings: Vec<ProviderBinding>,
    reports: Mutex<HashMap<String, NewReport>>,
    failing_writes: HashSet<String>,
    /// Simulates a concurrent run: the pre-check never sees stored reports
    blind_exists_check: bool,
    fail_roster: bool,
}

impl MemoryStore {
    fn report(&self, message_id: &str) -> Option<NewReport> {
        self.reports.lock().unwrap().get(message_id).cloned()
    }

    fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl ReportStore for MemoryStore {
    fn report_exists<'a>(&'a self, source_message_id: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            Ok(!self.blind_exists_check && self.reports.lock().unwrap().contains_key(source_message_id))
        })
    }

    fn save_report<'a>(&'a self, report: &'a NewReport) -> BoxFuture<'a, Result<WriteOutcome>> {
        Box::pin(async move {
            if self.failing_writes.contains(&report.source_message_id) {
                return Err(anyhow!("connection reset"));
            }
            let mut reports = self.reports.lock().unwrap();
            if reports.contains_key(&report.source_message_id) {
                return Ok(WriteOutcome::AlreadyExists);
            }
            reports.insert(report.source_message_id.clone(), report.clone());
            Ok(WriteOutcome::Created(Uuid::new_v4()))
        })
    }

    fn list_children(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<Child>>> {
        Box::pin(async move {
            if self.fail_roster {
                return Err(anyhow!("database unavailable"));
            }
            Ok(self.children.iter().filter(|c| c.user_id == user_id).cloned().collect())
        })
    }

    fn list_provider_bindings(&self, _user_id: Uuid) -> BoxFuture<'_, Result<Vec<ProviderBinding>>> {
        Box::pin(async move { Ok(self.bindings.clone()) })
    }
}

fn child(user_id: Uuid, first_name: &str) -> Child {
    Child {
        id: Uuid::new_v4(),
        user_id,
        first_name: first_name.to_string(),
        last_name: None,
    }
}

fn binding(matcher: &str, hint: Option<&str>) -> ProviderBinding {
    ProviderBinding {
        sender_matcher: matcher.to_string(),
        strategy_id: None,
        provider_name_hint: hint.map(str::to_string),
    }
}

fn store_for(user_id: Uuid, names: &[&str], bindings: Vec<ProviderBinding>) -> MemoryStore {
    MemoryStore {
        children: names.iter().map(|n| child(user_id, n)).collect(),
        bindings,
        ..Default::default()
    }
}

async fn run(inbox: FakeInbox, store: MemoryStore, user_id: Uuid) -> (BatchSummary, Orchestrator<FakeInbox, MemoryStore>) {
    let ids = inbox.ids();
    let orchestrator = Orchestrator::new(inbox, store);
    let summary = orchestrator.run(user_id, &ids, None).await;
    (summary, orchestrator)
}

fn only_outcome(summary: &BatchSummary) -> &ProcessingOutcome {
    assert_eq!(summary.outcomes.len(), 1, "expected exactly one outcome");
    &summary.outcomes[0].outcome
}

#[tokio::test]
async fn test_tadpoles_report_is_imported() {
    let user_id = Uuid::new_v4();
    let explicit = ProviderBinding {
        strategy_id: Some("tadpoles".to_string()),
        ..binding("noreply@tadpoles.com", None)
    };
    let store = store_for(user_id, &["Emma", "Noah"], vec![explicit]);
    let emma_id = store.children[0].id;
    let inbox = FakeInbox::default().with(html_message("m1", TADPOLES_SENDER, &fixture("tadpoles_daily_report.html")));

    let (summary, orchestrator) = run(inbox, store, user_id).await;

    assert!(only_outcome(&summary).is_success());
    assert_eq!(summary.imported, 1);

    let report = orchestrator.store().report("m1").expect("report should be stored");
    assert_eq!(report.child_id, emma_id);
    assert_eq!(report.user_id, user_id);
    assert_eq!(report.provider, "tadpoles");
    assert_eq!(report.report_date.to_string(), "2025-03-04");
    assert_eq!(report.naps.len(), 1);
    assert_eq!(report.meals.len(), 2);
    assert_eq!(report.bathroom_events.len(), 2);
    assert_eq!(report.activities.len(), 2);
    assert_eq!(report.photos.len(), 2);
}

#[tokio::test]
async fn test_bright_horizons_report_is_imported_via_hint() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Noah"], vec![binding("@tadpoles.com", Some("Bright Horizons Elm St"))]);
    let inbox = FakeInbox::default()
        .with(html_message("bh1", TADPOLES_SENDER, &fixture("bright_horizons_daily_report.html")));

    let (summary, orchestrator) = run(inbox, store, user_id).await;

    assert!(only_outcome(&summary).is_success());
    let report = orchestrator.store().report("bh1").unwrap();
    assert_eq!(report.provider, "bright_horizons");
    assert_eq!(report.report_date.to_string(), "2025-03-05");
    assert_eq!(report.bathroom_events.len(), 2);
}

#[tokio::test]
async fn test_second_run_skips_existing_report() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)]);
    let inbox = FakeInbox::default().with(html_message("m1", TADPOLES_SENDER, &fixture("tadpoles_daily_report.html")));
    let ids = inbox.ids();

    let orchestrator = Orchestrator::new(inbox, store);
    let first = orchestrator.run(user_id, &ids, None).await;
    let second = orchestrator.run(user_id, &ids, None).await;

    assert_eq!(first.imported, 1);
    assert_eq!(second.imported, 0);
    assert_eq!(second.skipped_exists, 1);
    assert_eq!(orchestrator.store().report_count(), 1);
}

#[tokio::test]
async fn test_lost_race_is_skipped_not_duplicated() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore {
        blind_exists_check: true,
        ..store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)])
    });
    let html = fixture("tadpoles_daily_report.html");
    let ids = vec!["m1".to_string()];

    let first = Orchestrator::new(FakeInbox::default().with(html_message("m1", TADPOLES_SENDER, &html)), store.clone());
    let second = Orchestrator::new(FakeInbox::default().with(html_message("m1", TADPOLES_SENDER, &html)), store.clone());

    let (a, b) = tokio::join!(first.run(user_id, &ids, None), second.run(user_id, &ids, None));

    assert_eq!(a.imported + b.imported, 1);
    assert_eq!(a.skipped_exists + b.skipped_exists, 1);
    assert_eq!(store.report_count(), 1);
}

#[tokio::test]
async fn test_unknown_child_is_skipped() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Olivia"], vec![binding("@tadpoles.com", None)]);
    let inbox = FakeInbox::default().with(html_message("m1", TADPOLES_SENDER, &fixture("tadpoles_daily_report.html")));

    let (summary, orchestrator) = run(inbox, store, user_id).await;

    assert_eq!(
        only_outcome(&summary),
        &ProcessingOutcome::SkippedChildNotFound { child_name: "Emma".to_string() }
    );
    assert_eq!(orchestrator.store().report_count(), 0);
}

#[tokio::test]
async fn test_ambiguous_child_is_never_guessed() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emmaline", "Emmanuelle"], vec![binding("@tadpoles.com", None)]);
    let inbox = FakeInbox::default().with(html_message("m1", TADPOLES_SENDER, &fixture("tadpoles_daily_report.html")));

    let (summary, orchestrator) = run(inbox, store, user_id).await;

    match only_outcome(&summary) {
        ProcessingOutcome::SkippedAmbiguousChildMatch { child_name, candidates } => {
            assert_eq!(child_name, "Emma");
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(summary.skipped_ambiguous_child_match, 1);
    assert_eq!(orchestrator.store().report_count(), 0);
}

#[tokio::test]
async fn test_unbound_sender_has_no_parser() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emma"], Vec::new());
    let inbox = FakeInbox::default()
        .with(html_message("m1", "Front Desk <desk@sunnydays.example>", &fixture("tadpoles_daily_report.html")));

    let (summary, _) = run(inbox, store, user_id).await;

    assert_eq!(
        only_outcome(&summary),
        &ProcessingOutcome::SkippedNoParserFound { sender: "desk@sunnydays.example".to_string() }
    );
}

#[tokio::test]
async fn test_plain_text_message_is_invalid_data() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)]);
    let message = SourceMessage {
        id: "m1".to_string(),
        from: TADPOLES_SENDER.to_string(),
        subject: None,
        payload: MimePart::leaf("text/plain", encode_body(b"DAILY REPORT - March 4, 2025")),
    };

    let (summary, _) = run(FakeInbox::default().with(message), store, user_id).await;

    assert!(matches!(only_outcome(&summary), ProcessingOutcome::SkippedInvalidData { .. }));
}

#[tokio::test]
async fn test_unreadable_date_writes_nothing() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)]);
    let html = fixture("tadpoles_daily_report.html").replace("Tuesday, March 4th, 2025", "sometime last week");

    let (summary, orchestrator) = run(FakeInbox::default().with(html_message("m1", TADPOLES_SENDER, &html)), store, user_id).await;

    match only_outcome(&summary) {
        ProcessingOutcome::SkippedInvalidData { reason } => assert!(reason.contains("sometime last week")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(orchestrator.store().report_count(), 0);
}

#[tokio::test]
async fn test_markerless_html_is_invalid_data() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)]);
    let html = "<html><body><p>Emma</p><p>Spring picture day is next week!</p></body></html>";

    let (summary, orchestrator) = run(FakeInbox::default().with(html_message("m1", TADPOLES_SENDER, html)), store, user_id).await;

    assert!(matches!(only_outcome(&summary), ProcessingOutcome::SkippedInvalidData { .. }));
    assert_eq!(summary.skipped_invalid_data, 1);
    assert_eq!(orchestrator.store().report_count(), 0);
}

#[tokio::test]
async fn test_procare_sender_ends_unparsed() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emma"], vec![binding("@procareconnect.com", None)]);
    let inbox = FakeInbox::default()
        .with(html_message("p1", "Procare <reports@procareconnect.com>", &fixture("tadpoles_daily_report.html")));

    let (summary, _) = run(inbox, store, user_id).await;

    assert!(matches!(only_outcome(&summary), ProcessingOutcome::SkippedInvalidData { .. }));
}

#[tokio::test]
async fn test_failures_stay_isolated_to_their_message() {
    let user_id = Uuid::new_v4();
    let mut store = store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)]);
    store.failing_writes.insert("broken".to_string());
    let html = fixture("tadpoles_daily_report.html");

    let inbox = FakeInbox::default()
        .with(html_message("broken", TADPOLES_SENDER, &html))
        .with(html_message("unknown-sender", "someone@elsewhere.example", &html))
        .with(html_message("good", TADPOLES_SENDER, &html));
    let mut ids = inbox.ids();
    ids.insert(1, "missing".to_string());

    let orchestrator = Orchestrator::new(inbox, store);
    let summary = orchestrator.run(user_id, &ids, None).await;

    assert_eq!(summary.total_found, 4);
    assert_eq!(summary.processed(), 4);
    assert_eq!(summary.errors, 2);
    assert_eq!(summary.skipped_no_parser_found, 1);
    assert_eq!(summary.imported, 1);

    let by_id: HashMap<&str, &ProcessingOutcome> = summary.outcomes.iter()
        .map(|o| (o.message_id.as_str(), &o.outcome))
        .collect();
    assert!(matches!(by_id["broken"], ProcessingOutcome::Error { .. }));
    assert!(matches!(by_id["missing"], ProcessingOutcome::Error { .. }));
    assert!(by_id["good"].is_success());
    assert!(orchestrator.store().report("broken").is_none());
}

#[tokio::test]
async fn test_panic_in_one_message_does_not_stop_the_batch() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)]);
    let html = fixture("tadpoles_daily_report.html");
    let mut inbox = FakeInbox::default()
        .with(html_message("exploding", TADPOLES_SENDER, &html))
        .with(html_message("good", TADPOLES_SENDER, &html));
    inbox.panicking.insert("exploding".to_string());

    let (summary, orchestrator) = run(inbox, store, user_id).await;

    assert_eq!(summary.processed(), 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.imported, 1);
    match &summary.outcomes[0].outcome {
        ProcessingOutcome::Error { message } => assert!(message.contains("mailbox decoder blew up")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(summary.outcomes[1].outcome.is_success());
    assert!(orchestrator.store().report("exploding").is_none());
}

#[tokio::test]
async fn test_passed_deadline_defers_everything() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)]);
    let html = fixture("tadpoles_daily_report.html");
    let inbox = FakeInbox::default()
        .with(html_message("m1", TADPOLES_SENDER, &html))
        .with(html_message("m2", TADPOLES_SENDER, &html));
    let ids = inbox.ids();

    let orchestrator = Orchestrator::new(inbox, store);
    let deadline = Instant::now() - Duration::from_millis(1);
    let summary = orchestrator.run(user_id, &ids, Some(deadline)).await;

    assert_eq!(summary.total_found, 2);
    assert_eq!(summary.deferred, 2);
    assert!(summary.outcomes.is_empty());
    assert_eq!(orchestrator.store().report_count(), 0);

    // deferred ids are picked up by the next run
    let next = orchestrator.run(user_id, &ids, None).await;
    assert_eq!(next.imported, 2);
}

#[tokio::test]
async fn test_roster_failure_marks_every_message_as_error() {
    let user_id = Uuid::new_v4();
    let store = MemoryStore { fail_roster: true, ..Default::default() };
    let html = fixture("tadpoles_daily_report.html");
    let inbox = FakeInbox::default()
        .with(html_message("m1", TADPOLES_SENDER, &html))
        .with(html_message("m2", TADPOLES_SENDER, &html));

    let (summary, _) = run(inbox, store, user_id).await;

    assert_eq!(summary.errors, 2);
    assert_eq!(summary.processed(), 2);
}

#[tokio::test]
async fn test_dry_run_store_writes_nothing() {
    let user_id = Uuid::new_v4();
    let inner = Arc::new(store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)]));
    let inbox = FakeInbox::default().with(html_message("m1", TADPOLES_SENDER, &fixture("tadpoles_daily_report.html")));
    let ids = inbox.ids();

    let orchestrator = Orchestrator::new(inbox, DryRunStore::new(inner.clone()));
    let summary = orchestrator.run(user_id, &ids, None).await;

    assert_eq!(summary.imported, 1);
    assert_eq!(inner.report_count(), 0);
}

#[tokio::test]
async fn test_sync_from_eml_directory() {
    let user_id = Uuid::new_v4();
    let store = store_for(user_id, &["Emma"], vec![binding("@tadpoles.com", None)]);

    let orchestrator = Orchestrator::new(EmlDirectorySource::new("data_test/eml"), store);
    let summary = orchestrator.sync(user_id, "from:(@tadpoles.com)", 10, None).await
        .expect("eml directory should be readable");

    assert_eq!(summary.total_found, 1);
    assert_eq!(summary.imported, 1);
    assert!(orchestrator.store().report("tadpoles-emma-20250304").is_some());
}
