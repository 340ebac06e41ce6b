use anyhow::{Result, Context};
use log::{info, warn, error};
use clap::Parser;
use std::path::PathBuf;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use daycare_reports::config::Config;
use daycare_reports::database::Database;
use daycare_reports::email::{EmlDirectorySource, MessageSource};
use daycare_reports::gmail_client::GmailClient;
use daycare_reports::ingest::{BatchSummary, DryRunStore, Orchestrator, ReportStore};
use daycare_reports::slack_notifier::SlackNotifier;

#[derive(Parser, Clone)]
#[command(name = "daycare-reports")]
#[command(about = "Imports daycare daily report emails into structured records")]
#[command(version = "0.1.0")]
struct Args {
    /// Dry-run mode: run the whole pipeline but only log what would be saved
    #[arg(short, long)]
    dry_run: bool,

    /// Daemon mode: run on the SCHEDULER_TIMES schedule
    #[arg(long)]
    daemon: bool,

    /// Maximum number of emails to process (default: SYNC_MAX_RESULTS)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,

    /// Read .eml files from this directory instead of Gmail
    #[arg(long)]
    eml_dir: Option<PathBuf>,

    /// User whose children and provider bindings are used (overrides SYNC_USER_ID)
    #[arg(long)]
    user_id: Option<Uuid>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::init();

    if args.dry_run {
        info!("🧪 Starting daycare report sync in DRY-RUN mode");
    } else {
        info!("🚀 Starting daycare report sync");
    }

    let config = Config::new(args.eml_dir.is_none())?;

    if args.check_config {
        println!("✅ Configuration is valid!");
        match &args.eml_dir {
            Some(dir) => println!("📁 Source: .eml files in {}", dir.display()),
            None => {
                println!("📧 Source: Gmail API OAuth2");
                println!("🔑 Credentials: {}", config.gmail.credentials_path);
                println!("💾 Token cache: {}", config.gmail.token_cache_path);
                println!("🔎 Query: {}", config.sync.gmail_query());
            }
        }
        println!("🗄️  Database: {}@{}:{}/{}",
                 config.database.username, config.database.host,
                 config.database.port, config.database.database);
        match args.user_id.or(config.sync.user_id) {
            Some(user_id) => println!("👤 User: {}", user_id),
            None => println!("⚠️  No user set (SYNC_USER_ID or --user-id)"),
        }
        return Ok(());
    }

    if args.daemon {
        info!("🔄 Starting in daemon mode");
        run_daemon_mode(config, args).await?;
        return Ok(());
    }

    match run_once(&config, &args).await {
        Ok(summary) => {
            print_summary(&summary, args.dry_run);
            if summary.errors > 0 {
                warn!("⚠️  {} message(s) failed and will be retried on the next run", summary.errors);
            }
        }
        Err(e) => {
            error!("❌ Error while syncing daily reports: {:#}", e);
            return Err(e);
        }
    }

    Ok(())
}

/// One sync run: connect, search, process, notify
async fn run_once(config: &Config, args: &Args) -> Result<BatchSummary> {
    let user_id = args.user_id
        .or(config.sync.user_id)
        .context("No user configured: set SYNC_USER_ID or pass --user-id")?;

    let database = Database::new(&config.database).await
        .context("Unable to initialize database")?;

    let summary = match (&args.eml_dir, args.dry_run) {
        (Some(dir), true) => sync_with(EmlDirectorySource::new(dir), DryRunStore::new(database), config, args, user_id).await?,
        (Some(dir), false) => sync_with(EmlDirectorySource::new(dir), database, config, args, user_id).await?,
        (None, dry_run) => {
            let gmail = GmailClient::new(&config.gmail).await
                .context("Unable to connect to Gmail API")?;
            if dry_run {
                sync_with(gmail, DryRunStore::new(database), config, args, user_id).await?
            } else {
                sync_with(gmail, database, config, args, user_id).await?
            }
        }
    };

    // Dry runs stay quiet on Slack
    if !args.dry_run {
        notify_slack(config, &summary).await;
    }

    Ok(summary)
}

async fn sync_with<M: MessageSource, S: ReportStore>(
    source: M,
    store: S,
    config: &Config,
    args: &Args,
    user_id: Uuid,
) -> Result<BatchSummary> {
    let max_results = args.limit
        .map(|limit| limit.min(config.sync.max_results))
        .unwrap_or(config.sync.max_results);
    let deadline = config.sync.deadline_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    let orchestrator = Orchestrator::new(source, store);
    orchestrator.sync(user_id, &config.sync.gmail_query(), max_results, deadline).await
}

async fn notify_slack(config: &Config, summary: &BatchSummary) {
    let Some(slack_config) = &config.slack else {
        info!("ℹ️  Slack notifications not configured");
        return;
    };

    match SlackNotifier::new(slack_config) {
        Ok(notifier) => {
            if let Err(e) = notifier.notify_batch_summary(summary).await {
                warn!("⚠️  Unable to send Slack summary: {}", e);
            }
        }
        Err(e) => warn!("⚠️  Unable to initialize Slack notifier: {} - notifications disabled", e),
    }
}

fn print_summary(summary: &BatchSummary, is_dry_run: bool) {
    println!("\n{}", "=".repeat(80));
    if is_dry_run {
        println!("🧪 DRY-RUN SUMMARY (nothing was saved)");
    } else {
        println!("📊 SYNC SUMMARY");
    }
    println!("{}", "=".repeat(80));
    println!("{}", summary);

    for entry in &summary.outcomes {
        println!("  {:<24} {}", entry.message_id, entry.outcome);
    }
    println!();
}

async fn run_daemon_mode(config: Config, args: Args) -> Result<()> {
    use tokio_cron_scheduler::{JobScheduler, Job};
    use chrono::{Local, Timelike};

    if !config.scheduler.enabled {
        error!("❌ Daemon mode requires SCHEDULER_ENABLED=true");
        anyhow::bail!("Scheduler not enabled in configuration");
    }

    if config.scheduler.schedule_times.is_empty() {
        error!("❌ No schedule defined (SCHEDULER_TIMES)");
        anyhow::bail!("No schedule defined");
    }

    info!("📅 Configured sync times: {:?}", config.scheduler.schedule_times);

    let scheduler = JobScheduler::new().await?;

    for schedule_time in &config.scheduler.schedule_times {
        let Some((hour, minute)) = schedule_time.split_once(':') else {
            error!("❌ Invalid schedule time: {}. Use the HH:MM format", schedule_time);
            continue;
        };

        // cron: "sec minute hour * * *", every day
        let cron_expr = format!("0 {} {} * * *", minute, hour);
        info!("📆 Adding scheduled job: {} (cron: {})", schedule_time, cron_expr);

        let config_clone = config.clone();
        let args_clone = args.clone();
        let schedule_time_clone = schedule_time.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let config = config_clone.clone();
            let args = args_clone.clone();
            let schedule_time = schedule_time_clone.clone();

            Box::pin(async move {
                info!("⏰ Scheduled run at {} - syncing daily reports...", schedule_time);

                match run_once(&config, &args).await {
                    Ok(summary) => {
                        info!("✅ Scheduled run at {} finished: {}", schedule_time, summary);
                    }
                    Err(e) => {
                        error!("❌ Scheduled run at {} failed: {:#}", schedule_time, e);
                        if let Some(slack_config) = &config.slack {
                            if let Ok(notifier) = SlackNotifier::new(slack_config) {
                                let _ = notifier.notify_error(&format!("{:#}", e)).await;
                            }
                        }
                    }
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    scheduler.start().await?;

    info!("✅ Daemon started. Waiting for scheduled times...");
    info!("⏸️  Press Ctrl+C to stop the daemon");

    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;

        let now = Local::now();
        if now.minute() == 0 {
            info!("💓 Daemon alive - {}", now.format("%Y-%m-%d %H:%M"));
        }
    }
}
