use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::ingest::{IngestError, LogSink};
use super::ParsedReport;
use super::record::{ActivityRecord, BathroomRecord, MealRecord, NapRecord, NewReport, PhotoRecord};

const DATE_FORMATS: &[&str] = &[
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y-%m-%d",
    "%d %B %Y",
    "%d %b %Y",
];

/// Years outside this range come from broken templates or epoch defaults
const MIN_REPORT_YEAR: i32 = 1971;
const MAX_REPORT_YEAR: i32 = 2100;

fn weekday_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+").expect("valid weekday regex")
    })
}

fn ordinal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d)(?:st|nd|rd|th)\b").expect("valid ordinal regex"))
}

fn clock_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,2}):(\d{2})(?::(\d{2}))?\s*(?:([AaPp])\.?\s*[Mm]\.?)?\s*$")
            .expect("valid clock regex")
    })
}

fn hours_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:hours?|hrs?|h)\b").expect("valid hours regex"))
}

fn minutes_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*(?:minutes?|mins?|m)\b").expect("valid minutes regex"))
}

/// Free-text report date to a calendar date.
///
/// Accepts an optional leading weekday and ordinal day suffixes. Anything
/// that does not parse to a plausible year is `InvalidDate`; there is no
/// fallback date.
pub fn normalize_report_date(raw: &str) -> Result<NaiveDate, IngestError> {
    let cleaned = raw.trim().trim_end_matches(|c: char| c == '.' || c == ',').trim();
    let cleaned = weekday_prefix_regex().replace(cleaned, "");
    let cleaned = ordinal_regex().replace_all(&cleaned, "$1");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
        .find(|date| (MIN_REPORT_YEAR..=MAX_REPORT_YEAR).contains(&date.year()))
        .ok_or_else(|| IngestError::InvalidDate(raw.trim().to_string()))
}

/// `"2:23 PM"`, `"2:23pm"`, `"14:30"` or `"14:30:15"` to a time of day
pub fn normalize_time(raw: &str) -> Option<NaiveTime> {
    let caps = clock_regex().captures(raw)?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let second: u32 = caps.get(3).map(|m| m.as_str().parse::<u32>()).transpose().ok()?.unwrap_or(0);

    if let Some(meridiem) = caps.get(4) {
        if !(1..=12).contains(&hour) {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("p");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    NaiveTime::from_hms_opt(hour, minute, second)
}

/// [`normalize_time`] rendered as `HH:MM:SS`
pub fn format_time(raw: &str) -> Option<String> {
    normalize_time(raw).map(|t| t.format("%H:%M:%S").to_string())
}

/// Nap length in minutes from the duration text, else from the start/end times
pub fn nap_minutes(duration_text: Option<&str>, start: Option<NaiveTime>, end: Option<NaiveTime>) -> Option<i32> {
    if let Some(text) = duration_text {
        let hours = hours_regex()
            .captures(text)
            .and_then(|c| c[1].parse::<f64>().ok());
        let minutes = minutes_regex()
            .captures(text)
            .and_then(|c| c[1].parse::<f64>().ok());

        if hours.is_some() || minutes.is_some() {
            let total = hours.unwrap_or(0.0) * 60.0 + minutes.unwrap_or(0.0);
            return Some(total.round() as i32);
        }
    }

    match (start, end) {
        (Some(start), Some(end)) if end >= start => {
            let secs = end.num_seconds_from_midnight() - start.num_seconds_from_midnight();
            Some((secs / 60) as i32)
        }
        _ => None,
    }
}

/// First word, lowercased, without trailing punctuation
pub fn first_word_category(text: &str) -> Option<String> {
    text.split_whitespace()
        .next()
        .map(|w| w.trim_end_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
}

/// First three words as printed
pub fn first_three_words(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().take(3).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Identity of the report being assembled
#[derive(Debug, Clone)]
pub struct ReportKey<'a> {
    pub user_id: Uuid,
    pub child_id: Uuid,
    pub message_id: &'a str,
    pub provider: &'a str,
}

/// Turn a parsed report into the persistence payload.
///
/// Fails only on the report date; unreadable times become `None`.
pub fn assemble_report(parsed: &ParsedReport, key: ReportKey<'_>, log: &dyn LogSink) -> Result<NewReport, IngestError> {
    let report_date = normalize_report_date(&parsed.report_date_raw)?;
    log.debug(&format!("Report date '{}' normalized to {}", parsed.report_date_raw, report_date));

    let time_of = |raw: &Option<String>, what: &str| -> Option<NaiveTime> {
        let raw = raw.as_deref()?;
        let time = normalize_time(raw);
        if time.is_none() {
            log.debug(&format!("Unreadable {} time '{}'", what, raw));
        }
        time
    };

    let naps = parsed.naps.iter()
        .map(|nap| {
            let start_time = time_of(&nap.start_time, "nap start");
            let end_time = time_of(&nap.end_time, "nap end");
            NapRecord {
                start_time,
                end_time,
                duration_minutes: nap_minutes(nap.duration_text.as_deref(), start_time, end_time),
                duration_text: nap.duration_text.clone(),
                raw_text: nap.raw_text.clone(),
            }
        })
        .collect();

    let meals = parsed.meals.iter()
        .map(|meal| MealRecord {
            time: time_of(&meal.time, "meal"),
            food: meal.food.clone(),
            food_category: first_word_category(&meal.food),
            details: meal.details.clone(),
            initials: meal.initials.clone(),
        })
        .collect();

    let bathroom_events = parsed.bathroom_events.iter()
        .map(|event| BathroomRecord {
            time: time_of(&event.time, "bathroom"),
            kind: event.kind.clone(),
            status: event.status.clone(),
            initials: event.initials.clone(),
        })
        .collect();

    let activities = parsed.activities.iter()
        .map(|activity| ActivityRecord {
            description: activity.description.clone(),
            category: first_three_words(&activity.description),
        })
        .collect();

    let photos = parsed.photos.iter()
        .filter(|photo| {
            let keep = photo.src.starts_with("https://") || photo.src.starts_with("http://");
            if !keep {
                log.debug(&format!("Dropping photo with non-http address '{}'", photo.src));
            }
            keep
        })
        .map(|photo| PhotoRecord {
            url: photo.src.clone(),
            description: photo.description.clone(),
        })
        .collect();

    let teacher_notes = Some(parsed.teacher_notes.trim().to_string()).filter(|n| !n.is_empty());

    Ok(NewReport {
        user_id: key.user_id,
        child_id: key.child_id,
        report_date,
        teacher_notes,
        source_message_id: key.message_id.to_string(),
        provider: key.provider.to_string(),
        naps,
        meals,
        bathroom_events,
        activities,
        photos,
    })
}
