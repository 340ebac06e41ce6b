/// Daily report model: what a parser strategy extracts from one email
pub mod dom;
pub mod grammar;
pub mod normalize;
pub mod record;

use serde::Serialize;

pub use normalize::{normalize_report_date, normalize_time, format_time, assemble_report};
pub use record::NewReport;

/// Literal marker preceding the report date in every supported template
pub const DATE_MARKER: &str = "DAILY REPORT -";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Nap {
    pub duration_text: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Line as printed, kept when none of the fields above could be read
    pub raw_text: Option<String>,
}

impl Nap {
    pub fn is_empty(&self) -> bool {
        self.duration_text.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.raw_text.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Meal {
    pub time: Option<String>,
    pub food: String,
    pub details: Option<String>,
    pub initials: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BathroomEvent {
    pub time: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: Option<String>,
    pub initials: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Photo {
    pub src: String,
    pub description: Option<String>,
}

/// Structured content of one daily report email.
///
/// Strategies only return reports that passed [`ParsedReport::validated`],
/// so a parsed report handed to the pipeline has both critical fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedReport {
    pub child_name_raw: String,
    pub report_date_raw: String,
    pub teacher_notes: String,
    pub naps: Vec<Nap>,
    pub meals: Vec<Meal>,
    pub bathroom_events: Vec<BathroomEvent>,
    pub activities: Vec<Activity>,
    pub photos: Vec<Photo>,
}

impl ParsedReport {
    /// Critical-field gate: `None` unless child name and report date are both present
    pub fn validated(mut self) -> Option<Self> {
        self.child_name_raw = self.child_name_raw.trim().to_string();
        self.report_date_raw = self.report_date_raw.trim().to_string();

        if self.child_name_raw.is_empty() || self.report_date_raw.is_empty() {
            return None;
        }

        self.teacher_notes = self.teacher_notes.trim().to_string();
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_rejects_missing_critical_fields() {
        let missing_date = ParsedReport {
            child_name_raw: "Emma".into(),
            meals: vec![Meal { food: "Lunch".into(), ..Default::default() }],
            ..Default::default()
        };
        assert!(missing_date.validated().is_none());

        let blank_name = ParsedReport {
            child_name_raw: "   ".into(),
            report_date_raw: "March 4, 2025".into(),
            ..Default::default()
        };
        assert!(blank_name.validated().is_none());
    }

    #[test]
    fn test_gate_trims_fields() {
        let report = ParsedReport {
            child_name_raw: " Emma ".into(),
            report_date_raw: " March 4, 2025\n".into(),
            teacher_notes: "\n Great day ".into(),
            ..Default::default()
        };
        let report = report.validated().unwrap();
        assert_eq!(report.child_name_raw, "Emma");
        assert_eq!(report.report_date_raw, "March 4, 2025");
        assert_eq!(report.teacher_notes, "Great day");
    }
}
