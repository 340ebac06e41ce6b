use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

/// Fully assembled report payload handed to the persistence gateway in one write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReport {
    pub user_id: Uuid,
    pub child_id: Uuid,
    pub report_date: NaiveDate,
    pub teacher_notes: Option<String>,
    /// Dedup key: the source message id
    pub source_message_id: String,
    /// Strategy id that produced the report
    pub provider: String,
    pub naps: Vec<NapRecord>,
    pub meals: Vec<MealRecord>,
    pub bathroom_events: Vec<BathroomRecord>,
    pub activities: Vec<ActivityRecord>,
    pub photos: Vec<PhotoRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NapRecord {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub duration_text: Option<String>,
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealRecord {
    pub time: Option<NaiveTime>,
    pub food: String,
    /// First word of `food`, lowercased. A rough grouping, not a classifier.
    pub food_category: Option<String>,
    pub details: Option<String>,
    pub initials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BathroomRecord {
    pub time: Option<NaiveTime>,
    pub kind: String,
    pub status: Option<String>,
    pub initials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub description: String,
    /// First three words of `description`. Same caveat as `MealRecord::food_category`.
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoRecord {
    pub url: String,
    pub description: Option<String>,
}
