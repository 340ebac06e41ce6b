//! Procare daily report template
//!
//! Not implemented yet: no sample of this template has been captured, so
//! every message routed here ends as unparsed. The warning below is what
//! tells it apart from a genuine parse failure.

use crate::ingest::LogSink;
use crate::report::ParsedReport;

pub fn parse(html: &str, log: &dyn LogSink) -> Option<ParsedReport> {
    log.warn(&format!(
        "Procare template parser is not implemented; {} byte(s) of HTML left unparsed",
        html.len()
    ));
    None
}
