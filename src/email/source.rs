use anyhow::{Result, Context};
use futures::future::BoxFuture;
use log::{info, debug, warn};
use mail_parser::{MessageParser, MimeHeaders, PartType};
use std::path::{Path, PathBuf};

use crate::email::common::{MimePart, SourceMessage};
use crate::email::html_extractor::encode_body;

/// Read-only inbox: search for candidate ids, fetch one message by id
pub trait MessageSource: Send + Sync {
    /// Search for messages matching `query`, returning at most `max_results` ids
    fn search<'a>(&'a self, query: &'a str, max_results: usize) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Fetch the full part tree and headers of one message
    fn fetch<'a>(&'a self, message_id: &'a str) -> BoxFuture<'a, Result<SourceMessage>>;

    /// Name of this source (for logging)
    fn source_name(&self) -> &str;
}

/// Message source backed by a directory of `.eml` files.
///
/// Each file stem is the message id. The query is ignored: every `.eml`
/// file in the directory is a candidate.
pub struct EmlDirectorySource {
    dir: PathBuf,
}

impl EmlDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn list_ids(&self, max_results: usize) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Unable to read directory {}", self.dir.display()))?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("eml"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();

        ids.sort();
        ids.truncate(max_results);

        info!("Found {} .eml file(s) in {}", ids.len(), self.dir.display());
        Ok(ids)
    }

    fn read_message(&self, message_id: &str) -> Result<SourceMessage> {
        let path = self.dir.join(format!("{}.eml", message_id));
        debug!("Reading email file {}", path.display());

        let raw = std::fs::read(&path)
            .with_context(|| format!("Unable to read {}", path.display()))?;

        parse_eml(message_id, &raw)
    }
}

impl MessageSource for EmlDirectorySource {
    fn search<'a>(&'a self, _query: &'a str, max_results: usize) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move { self.list_ids(max_results) })
    }

    fn fetch<'a>(&'a self, message_id: &'a str) -> BoxFuture<'a, Result<SourceMessage>> {
        Box::pin(async move { self.read_message(message_id) })
    }

    fn source_name(&self) -> &str {
        "eml directory"
    }
}

/// Parse a raw RFC822 message into a [`SourceMessage`].
///
/// mail-parser decodes every body; leaves are re-encoded to the inbox wire
/// form so the HTML extractor sees the same shape as from the Gmail API.
pub fn parse_eml(message_id: &str, raw: &[u8]) -> Result<SourceMessage> {
    let parsed = MessageParser::default()
        .parse(raw)
        .context("Unable to parse email")?;

    let from = parsed.from()
        .and_then(|addrs| addrs.first())
        .map(|addr| {
            match (&addr.name, &addr.address) {
                (Some(name), Some(email)) => format!("{} <{}>", name, email),
                (None, Some(email)) => email.to_string(),
                _ => "Unknown sender".to_string(),
            }
        })
        .unwrap_or_else(|| "Unknown sender".to_string());

    let subject = parsed.subject().map(str::to_string);

    let payload = if parsed.parts.is_empty() {
        warn!("Email {} has no MIME parts", message_id);
        MimePart::default()
    } else {
        build_part(&parsed, 0, 0)
    };

    Ok(SourceMessage {
        id: message_id.to_string(),
        from,
        subject,
        payload,
    })
}

const MAX_PART_DEPTH: usize = 32;

fn build_part(message: &mail_parser::Message<'_>, index: usize, depth: usize) -> MimePart {
    let Some(part) = message.parts.get(index) else {
        return MimePart::default();
    };

    let mime_type = part.content_type().map(|ct| match ct.subtype() {
        Some(sub) => format!("{}/{}", ct.ctype(), sub).to_lowercase(),
        None => ct.ctype().to_lowercase(),
    });

    match &part.body {
        PartType::Multipart(children) if depth < MAX_PART_DEPTH => MimePart {
            mime_type,
            body: None,
            parts: children.iter().map(|&child| build_part(message, child, depth + 1)).collect(),
        },
        PartType::Multipart(_) => MimePart { mime_type, body: None, parts: Vec::new() },
        PartType::Html(_) => MimePart {
            mime_type: mime_type.or_else(|| Some("text/html".to_string())),
            body: Some(encode_body(part.contents())),
            parts: Vec::new(),
        },
        _ => MimePart {
            mime_type,
            body: Some(encode_body(part.contents())),
            parts: Vec::new(),
        },
    }
}

/// Convenience for tools and tests: load a single `.eml` file
pub fn load_eml_file(path: &Path) -> Result<SourceMessage> {
    let raw = std::fs::read(path)
        .with_context(|| format!("Unable to read {}", path.display()))?;
    let id = path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    parse_eml(id, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::html_extractor::decode_body;

    const MULTIPART: &str = "From: \"Sunny Days\" <Reports@SunnyDays.example>\r\n\
        Subject: Daily Report\r\n\
        MIME-Version: 1.0\r\n\
        Content-Type: multipart/alternative; boundary=\"xyz\"\r\n\
        \r\n\
        --xyz\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        plain body\r\n\
        --xyz\r\n\
        Content-Type: text/html; charset=utf-8\r\n\
        \r\n\
        <p>html body</p>\r\n\
        --xyz--\r\n";

    #[test]
    fn test_parse_eml_rebuilds_part_tree() {
        let message = parse_eml("m1", MULTIPART.as_bytes()).unwrap();

        assert_eq!(message.sender_email(), "reports@sunnydays.example");
        assert_eq!(message.payload.mime_type.as_deref(), Some("multipart/alternative"));
        assert_eq!(message.payload.parts.len(), 2);

        let html = &message.payload.parts[1];
        assert!(html.is_html());
        let body = decode_body(html.body.as_deref().unwrap()).unwrap();
        assert!(String::from_utf8(body).unwrap().contains("<p>html body</p>"));
    }

    #[test]
    fn test_eml_directory_lists_sorted_stems() {
        let source = EmlDirectorySource::new("data_test/eml");
        let ids = tokio_test::block_on(source.search("ignored", 10)).unwrap();
        assert_eq!(ids, vec!["tadpoles-emma-20250304".to_string()]);

        let none = tokio_test::block_on(source.search("ignored", 0)).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let source = EmlDirectorySource::new("data_test/does-not-exist");
        assert!(tokio_test::block_on(source.search("", 10)).is_err());
    }
}
