pub mod common;
pub mod html_extractor;
pub mod source;

// Re-export commonly used items
pub use common::{MimePart, SourceMessage, sender_address, sender_domain};
pub use html_extractor::{extract_html, decode_body, encode_body};
pub use source::{MessageSource, EmlDirectorySource, parse_eml, load_eml_file};
