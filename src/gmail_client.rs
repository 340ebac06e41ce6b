use anyhow::{Result, Context};
use futures::future::BoxFuture;
use google_gmail1::{Gmail, api::MessagePart, hyper, hyper_rustls, oauth2};
use log::{info, debug};

use crate::config::GmailConfig;
use crate::email::{encode_body, MessageSource, MimePart, SourceMessage};

/// Gmail caps a single list page at this many ids
const MAX_PAGE_SIZE: usize = 500;

pub struct GmailClient {
    hub: Gmail<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>,
}

impl GmailClient {
    pub async fn new(config: &GmailConfig) -> Result<Self> {
        info!("Connecting to Gmail API via OAuth2");

        let secret = oauth2::read_application_secret(&config.credentials_path)
            .await
            .context("Unable to read OAuth2 client credentials file")?;

        // Tokens persist across runs so the consent flow only happens once
        let auth = oauth2::InstalledFlowAuthenticator::builder(
            secret,
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&config.token_cache_path)
        .build()
        .await
        .context("Unable to create OAuth2 authenticator")?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        let client = hyper::Client::builder().build(connector);
        let hub = Gmail::new(client, auth);

        info!("✅ Gmail API connection established successfully");

        Ok(GmailClient { hub })
    }

    /// Message ids matching `query`, newest first, following page tokens up to `max_results`
    pub async fn search_messages(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        info!("Searching Gmail for '{}'", query);

        let mut message_ids = Vec::new();
        let mut page_token: Option<String> = None;

        while message_ids.len() < max_results {
            let page_size = (max_results - message_ids.len()).min(MAX_PAGE_SIZE);

            let mut call = self.hub
                .users()
                .messages_list("me")
                .q(query)
                .max_results(page_size as u32)
                .add_scope(google_gmail1::api::Scope::Readonly);
            if let Some(token) = &page_token {
                call = call.page_token(token);
            }

            let (_, response) = call.doit()
                .await
                .context("Error searching for emails")?;

            message_ids.extend(
                response.messages
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|msg| msg.id),
            );

            match response.next_page_token {
                Some(token) if !token.is_empty() => {
                    debug!("Fetching next result page");
                    page_token = Some(token);
                }
                _ => break,
            }
        }

        message_ids.truncate(max_results);
        info!("Found {} email(s)", message_ids.len());

        Ok(message_ids)
    }

    /// Full part tree and headers of one message
    pub async fn fetch_message(&self, message_id: &str) -> Result<SourceMessage> {
        debug!("Retrieving email {}", message_id);

        let (_, message) = self.hub
            .users()
            .messages_get("me", message_id)
            .format("full")
            .add_scope(google_gmail1::api::Scope::Readonly)
            .doit()
            .await
            .with_context(|| format!("Unable to retrieve email {}", message_id))?;

        let payload = message.payload.context("Email has no payload")?;

        let mut from = String::from("Unknown sender");
        let mut subject = None;
        for header in payload.headers.iter().flatten() {
            if let (Some(name), Some(value)) = (&header.name, &header.value) {
                if name.eq_ignore_ascii_case("From") {
                    from = value.clone();
                } else if name.eq_ignore_ascii_case("Subject") {
                    subject = Some(value.clone());
                }
            }
        }

        Ok(SourceMessage {
            id: message.id.unwrap_or_else(|| message_id.to_string()),
            from,
            subject,
            payload: to_mime_part(payload),
        })
    }
}

/// The client library hands over decoded body bytes; re-encode them to the wire form
fn to_mime_part(part: MessagePart) -> MimePart {
    MimePart {
        mime_type: part.mime_type,
        body: part.body
            .and_then(|body| body.data)
            .map(|data| encode_body(&data)),
        parts: part.parts
            .unwrap_or_default()
            .into_iter()
            .map(to_mime_part)
            .collect(),
    }
}

impl MessageSource for GmailClient {
    fn search<'a>(&'a self, query: &'a str, max_results: usize) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(self.search_messages(query, max_results))
    }

    fn fetch<'a>(&'a self, message_id: &'a str) -> BoxFuture<'a, Result<SourceMessage>> {
        Box::pin(self.fetch_message(message_id))
    }

    fn source_name(&self) -> &str {
        "Gmail"
    }
}
