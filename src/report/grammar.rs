//! Line grammars shared by the template strategies
//!
//! Each function takes one flattened text line of a section and returns the
//! structured entry, or `None` when the line does not follow the grammar.

use regex::Regex;
use std::sync::OnceLock;

use super::{Activity, BathroomEvent, Meal, Nap};

const TIME: &str = r"\d{1,2}:\d{2}(?:\s*[AaPp]\.?[Mm]\.?)?";

fn nap_full_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)slept\s+for\s+(.+?)\s+from\s+({TIME})\s+to\s+({TIME})"))
            .expect("valid nap regex")
    })
}

fn nap_duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)slept\s+for\s+(.+?)\.?\s*$").expect("valid nap duration regex"))
}

fn nap_range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)({TIME})\s*(?:-|–|to)\s*({TIME})")).expect("valid nap range regex")
    })
}

fn timed_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^\s*({TIME})\s*[-–]\s*(.+?)\s*$")).expect("valid timed line regex"))
}

fn initials_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s+([A-Z]{2,3}(?:\s*,\s*[A-Z]{2,3})*)\s*$").expect("valid initials regex")
    })
}

fn goals_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|\s+)-\s+goals:.*$").expect("valid goals regex"))
}

/// `"slept for <duration> from <start> to <end>"`, with partial forms
/// accepted. A non-blank line matching nothing is kept as raw text.
pub fn parse_nap_line(line: &str) -> Option<Nap> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(caps) = nap_full_regex().captures(line) {
        return Some(Nap {
            duration_text: Some(caps[1].trim().to_string()),
            start_time: Some(caps[2].trim().to_string()),
            end_time: Some(caps[3].trim().to_string()),
            raw_text: None,
        });
    }

    let mut nap = Nap::default();
    if let Some(caps) = nap_duration_regex().captures(line) {
        nap.duration_text = Some(caps[1].trim().to_string());
    }
    if let Some(caps) = nap_range_regex().captures(line) {
        nap.start_time = Some(caps[1].trim().to_string());
        nap.end_time = Some(caps[2].trim().to_string());
    }

    if nap.is_empty() {
        nap.raw_text = Some(line.to_string());
    }
    Some(nap)
}

/// `"<time> - <description>"` split into time and description
pub fn parse_timed_line(line: &str) -> Option<(String, String)> {
    let caps = timed_line_regex().captures(line)?;
    Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
}

/// All-caps words that show up as entry text rather than staff initials
const NOT_INITIALS: &[&str] = &["BM", "ALL", "AM", "PM"];

/// Strip trailing all-caps staff initials (`"ate most AB, CD"`).
///
/// A trailing token is left in place when it is a known word or the only
/// text after the last `:`/`;` separator (`"Diaper: BM"`).
pub fn strip_initials(description: &str) -> (String, Vec<String>) {
    let unchanged = || (description.trim().to_string(), Vec::new());

    let Some(caps) = initials_regex().captures(description) else {
        return unchanged();
    };

    let initials: Vec<String> = caps[1]
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if initials.iter().any(|s| NOT_INITIALS.contains(&s.as_str())) {
        return unchanged();
    }

    let start = caps.get(0).map(|m| m.start()).unwrap_or(description.len());
    let rest = description[..start].trim();
    let last_segment = rest.rsplit([':', ';']).next().unwrap_or_default();
    if last_segment.trim().is_empty() {
        return unchanged();
    }

    (rest.to_string(), initials)
}

/// Comma-separated staff initials from a cell of their own
pub fn parse_initials(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_uppercase() || c == '.'))
        .map(|s| s.trim_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Meal line: `"<time> - <food>[; <details>]  <INITIALS>"`.
///
/// Details are whatever follows the first `;`, or a trailing parenthesised
/// remark.
pub fn parse_meal_line(line: &str) -> Option<Meal> {
    let (time, description) = parse_timed_line(line)?;
    let (description, initials) = strip_initials(&description);

    let (food, details) = split_details(&description);
    if food.is_empty() {
        return None;
    }

    Some(Meal {
        time: Some(time),
        food,
        details,
        initials,
    })
}

/// Bathroom line: `"<time> - <type>[: <status>]  <INITIALS>"`
pub fn parse_bathroom_line(line: &str) -> Option<BathroomEvent> {
    let (time, description) = parse_timed_line(line)?;
    let (description, initials) = strip_initials(&description);

    let (kind, status) = match description.split_once(':') {
        Some((kind, status)) => (kind.trim().to_string(), non_empty(status)),
        None => (description.trim().to_string(), None),
    };
    if kind.is_empty() {
        return None;
    }

    Some(BathroomEvent {
        time: Some(time),
        kind,
        status,
        initials,
    })
}

/// Activity line with any `" - Goals: ..."` suffix removed
pub fn parse_activity_line(line: &str) -> Option<Activity> {
    let description = goals_suffix_regex().replace(line.trim(), "").trim().to_string();
    if description.is_empty() {
        return None;
    }
    Some(Activity { description })
}

fn split_details(description: &str) -> (String, Option<String>) {
    if let Some((food, details)) = description.split_once(';') {
        return (food.trim().to_string(), non_empty(details));
    }

    let trimmed = description.trim();
    if trimmed.ends_with(')') {
        if let Some(open) = trimmed.rfind('(') {
            let details = &trimmed[open + 1..trimmed.len() - 1];
            return (trimmed[..open].trim().to_string(), non_empty(details));
        }
    }

    (trimmed.to_string(), None)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
