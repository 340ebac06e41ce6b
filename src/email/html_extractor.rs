use base64::{Engine as _, engine::general_purpose};

use crate::email::common::MimePart;
use crate::ingest::{IngestError, LogSink};

/// Find the first HTML leaf of a part tree and decode it.
///
/// The top-level part wins when it is itself HTML; otherwise the tree is
/// searched depth-first. Returns an empty string when the message carries
/// no HTML at all.
pub fn extract_html(payload: &MimePart, log: &dyn LogSink) -> Result<String, IngestError> {
    let Some(part) = find_html_part(payload) else {
        log.debug("No text/html part in message");
        return Ok(String::new());
    };

    let encoded = part.body.as_deref().unwrap_or_default();
    let bytes = decode_body(encoded)?;
    log.debug(&format!("Decoded HTML body: {} bytes", bytes.len()));

    match String::from_utf8(bytes) {
        Ok(html) => Ok(html),
        Err(e) => {
            log.warn("HTML body is not valid UTF-8, replacing invalid sequences");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Depth-first search for the first HTML node that has a body
pub fn find_html_part(part: &MimePart) -> Option<&MimePart> {
    if part.is_html() && part.has_body() {
        return Some(part);
    }

    part.parts.iter().find_map(find_html_part)
}

/// Decode the URL-safe base64 variant used by the inbox API.
///
/// Accepts the standard alphabet as well, with or without padding. A length
/// of 1 mod 4 (after stripping padding) cannot come from any byte sequence.
pub fn decode_body(encoded: &str) -> Result<Vec<u8>, IngestError> {
    let mut normalized: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    while normalized.ends_with('=') {
        normalized.pop();
    }

    match normalized.len() % 4 {
        1 => {
            return Err(IngestError::Decode(format!(
                "base64 body length {} is not recoverable",
                normalized.len()
            )))
        }
        2 => normalized.push_str("=="),
        3 => normalized.push('='),
        _ => {}
    }

    general_purpose::STANDARD
        .decode(normalized.as_bytes())
        .map_err(|e| IngestError::Decode(e.to_string()))
}

/// Inverse of [`decode_body`]: encode bytes in the inbox API wire form
pub fn encode_body(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
