/// Common structures and utilities for email processing
use regex::Regex;
use std::sync::OnceLock;

/// One node of a MIME part tree as handed over by a message source.
///
/// `body` carries the transport-encoded data (URL-safe base64), exactly as
/// the inbox API delivers it. Multipart containers have no body and one or
/// more `parts`.
#[derive(Debug, Clone, Default)]
pub struct MimePart {
    pub mime_type: Option<String>,
    pub body: Option<String>,
    pub parts: Vec<MimePart>,
}

impl MimePart {
    pub fn leaf(mime_type: &str, body: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.to_string()),
            body: Some(body.into()),
            parts: Vec::new(),
        }
    }

    pub fn multipart(mime_type: &str, parts: Vec<MimePart>) -> Self {
        Self {
            mime_type: Some(mime_type.to_string()),
            body: None,
            parts,
        }
    }

    pub fn is_html(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|t| t.trim().eq_ignore_ascii_case("text/html"))
            .unwrap_or(false)
    }

    pub fn has_body(&self) -> bool {
        self.body.as_deref().map(|b| !b.is_empty()).unwrap_or(false)
    }
}

/// A fully fetched message: id, raw `From` header and its part tree
#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub id: String,
    pub from: String,
    pub subject: Option<String>,
    pub payload: MimePart,
}

impl SourceMessage {
    /// Lowercased sender address derived from the `From` header
    pub fn sender_email(&self) -> String {
        sender_address(&self.from)
    }
}

fn angle_address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<\s*([^<>\s]+@[^<>\s]+)\s*>").expect("valid address regex"))
}

/// Extract the bare address from a `From` header value.
///
/// Handles `Name <user@host>`, `"Quoted, Name" <user@host>` and a bare
/// `user@host`. The result is lowercased; an unparseable header is returned
/// trimmed and lowercased so resolution fails on it rather than on an empty
/// string.
pub fn sender_address(from_header: &str) -> String {
    if let Some(caps) = angle_address_regex().captures(from_header) {
        if let Some(addr) = caps.get(1) {
            return addr.as_str().to_lowercase();
        }
    }

    from_header
        .split_whitespace()
        .find(|token| token.contains('@'))
        .map(|token| token.trim_matches(|c| c == '"' || c == '\'' || c == ',').to_lowercase())
        .unwrap_or_else(|| from_header.trim().to_lowercase())
}

/// Domain part of an address (after the last `@`), lowercased
pub fn sender_domain(email: &str) -> Option<String> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
        .filter(|domain| !domain.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_address_formats() {
        assert_eq!(sender_address("Tadpoles <NoReply@Tadpoles.com>"), "noreply@tadpoles.com");
        assert_eq!(sender_address("\"Smith, Ann\" <ann@example.org>"), "ann@example.org");
        assert_eq!(sender_address("reports@procareconnect.com"), "reports@procareconnect.com");
        assert_eq!(sender_address("  Unknown sender "), "unknown sender");
    }

    #[test]
    fn test_sender_domain() {
        assert_eq!(sender_domain("noreply@tadpoles.com"), Some("tadpoles.com".to_string()));
        assert_eq!(sender_domain("no-at-sign"), None);
        assert_eq!(sender_domain("trailing@"), None);
    }

    #[test]
    fn test_is_html_ignores_case() {
        assert!(MimePart::leaf("TEXT/HTML", "PGI-").is_html());
        assert!(!MimePart::leaf("text/plain", "aGk").is_html());
        assert!(!MimePart::default().is_html());
    }
}
