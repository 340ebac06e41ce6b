use anyhow::{Result, Context};
use log::{info, error};
use slack_morphism::prelude::*;

use crate::config::SlackConfig;
use crate::ingest::{BatchSummary, ProcessingOutcome};

pub struct SlackNotifier {
    client: SlackClient<SlackClientHyperHttpsConnector>,
    token: SlackApiToken,
    channel_id: SlackChannelId,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        info!("Initializing Slack notifier");

        let client = SlackClient::new(SlackClientHyperHttpsConnector::new()?);
        let token = SlackApiToken::new(config.bot_token.clone().into());
        let channel_id = SlackChannelId::new(config.channel_id.clone());

        Ok(SlackNotifier {
            client,
            token,
            channel_id,
        })
    }

    /// Post the outcome of one sync run
    pub async fn notify_batch_summary(&self, summary: &BatchSummary) -> Result<()> {
        info!("Sending Slack summary for {} message(s)", summary.total_found);

        let message_text = format_summary(summary);

        let post_chat_req = SlackApiChatPostMessageRequest::new(
            self.channel_id.clone(),
            SlackMessageContent::new().with_text(message_text),
        );

        let session = self.client.open_session(&self.token);

        match session.chat_post_message(&post_chat_req).await {
            Ok(response) => {
                info!("✅ Slack message sent: {:?}", response.ts);
                Ok(())
            }
            Err(e) => {
                error!("❌ Error sending Slack message: {}", e);
                Err(anyhow::anyhow!("Unable to send Slack message: {}", e))
            }
        }
    }

    /// Report a run that could not start at all
    pub async fn notify_error(&self, error_message: &str) -> Result<()> {
        let message_text = format!(
            "❌ *Daily report sync failed*\n\n\
             • Error: ```{}```",
            error_message
        );

        let post_chat_req = SlackApiChatPostMessageRequest::new(
            self.channel_id.clone(),
            SlackMessageContent::new().with_text(message_text),
        );

        let session = self.client.open_session(&self.token);

        session.chat_post_message(&post_chat_req)
            .await
            .context("Unable to send Slack error message")?;

        Ok(())
    }
}

/// Slack-formatted text: the counters, then one line per message that did not import cleanly
pub fn format_summary(summary: &BatchSummary) -> String {
    let icon = if summary.errors > 0 { "⚠️" } else { "✅" };
    let mut text = format!(
        "{} *Daily report sync*\n\n\
         • Found: {}\n\
         • Imported: *{}*\n\
         • Skipped: {}\n\
         • Errors: {}\n",
        icon,
        summary.total_found,
        summary.imported,
        summary.skipped(),
        summary.errors
    );

    if summary.deferred > 0 {
        text.push_str(&format!("• Deferred: {}\n", summary.deferred));
    }

    let notable: Vec<_> = summary.outcomes.iter()
        .filter(|o| !matches!(o.outcome, ProcessingOutcome::Success { .. } | ProcessingOutcome::SkippedExists))
        .collect();
    if !notable.is_empty() {
        text.push_str("• Details:\n");
        for entry in notable {
            text.push_str(&format!("  - `{}`: {}\n", entry.message_id, entry.outcome));
        }
    }

    text
}
