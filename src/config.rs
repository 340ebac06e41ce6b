use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gmail: GmailConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub scheduler: SchedulerConfig,
    pub slack: Option<SlackConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub schedule_times: Vec<String>, // "HH:MM", e.g. ["02:00", "14:00"]
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    pub credentials_path: String,
    pub token_cache_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Owner of the roster and provider bindings, `None` until set
    pub user_id: Option<Uuid>,
    pub sender_domains: Vec<String>,
    pub max_results: usize,
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub channel_id: String,
}

impl SyncConfig {
    /// Inbox search query for the configured sender domains
    pub fn gmail_query(&self) -> String {
        let senders: Vec<String> = self.sender_domains.iter()
            .map(|d| format!("@{}", d.trim_start_matches('@')))
            .collect();
        format!("from:({})", senders.join(" OR "))
    }
}

impl Config {
    /// Load from the environment. `require_gmail` is false when reading `.eml` files.
    pub fn new(require_gmail: bool) -> Result<Self> {
        Self::check_required_env_vars(require_gmail)?;

        Ok(Config {
            gmail: GmailConfig {
                credentials_path: std::env::var("GMAIL_CREDENTIALS_PATH")
                    .unwrap_or_default(),
                token_cache_path: std::env::var("GMAIL_TOKEN_CACHE_PATH")
                    .unwrap_or_else(|_| "./gmail-token-cache.json".to_string()),
            },
            database: DatabaseConfig {
                host: std::env::var("DB_HOST")
                    .unwrap_or_else(|_| "localhost".to_string()),
                port: std::env::var("DB_PORT")
                    .unwrap_or_else(|_| "5432".to_string())
                    .parse()
                    .unwrap_or(5432),
                database: std::env::var("DB_NAME")
                    .unwrap_or_else(|_| "daycare".to_string()),
                username: std::env::var("DB_USERNAME")
                    .unwrap_or_else(|_| "postgres".to_string()),
                password: std::env::var("DB_PASSWORD")
                    .context("DB_PASSWORD must be set")?,
            },
            sync: SyncConfig {
                user_id: match std::env::var("SYNC_USER_ID") {
                    Ok(raw) => Some(raw.trim().parse()
                        .with_context(|| format!("SYNC_USER_ID is not a valid UUID: '{}'", raw))?),
                    Err(_) => None,
                },
                sender_domains: parse_list(
                    &std::env::var("SYNC_SENDER_DOMAINS")
                        .unwrap_or_else(|_| "tadpoles.com,procareconnect.com".to_string()),
                ),
                max_results: std::env::var("SYNC_MAX_RESULTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(50),
                deadline_secs: std::env::var("SYNC_DEADLINE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
            scheduler: SchedulerConfig {
                enabled: std::env::var("SCHEDULER_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                schedule_times: parse_list(
                    &std::env::var("SCHEDULER_TIMES").unwrap_or_else(|_| "02:00".to_string()),
                ),
            },
            slack: match (std::env::var("SLACK_BOT_TOKEN"), std::env::var("SLACK_CHANNEL_ID")) {
                (Ok(bot_token), Ok(channel_id)) => Some(SlackConfig {
                    bot_token,
                    channel_id,
                }),
                _ => {
                    log::warn!("SLACK_BOT_TOKEN or SLACK_CHANNEL_ID not set - Slack notifications disabled");
                    None
                }
            },
        })
    }

    fn check_required_env_vars(require_gmail: bool) -> Result<()> {
        let mut required_vars = vec!["DB_PASSWORD"];
        if require_gmail {
            required_vars.push("GMAIL_CREDENTIALS_PATH");
        }

        let missing_vars: Vec<&str> = required_vars.into_iter()
            .filter(|var| std::env::var(var).is_err())
            .collect();

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Missing environment variables: {}\n\
                 \n\
                 💡 Solutions:\n\
                 1. Create a .env file with your credentials:\n\
                    cp .env.example .env\n\
                 \n\
                 2. Or export them manually:\n\
                    export GMAIL_CREDENTIALS_PATH=/path/to/client_credentials.json\n\
                    export DB_PASSWORD=...\n\
                    export SYNC_USER_ID=<uuid>\n\
                    daycare-reports --dry-run",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
