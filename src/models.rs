// Data models for the family agenda

use chrono::{NaiveDate, NaiveTime};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::record::{IndexValue, Record};

/// Member id meaning "no member filter"; never a real person
pub const ALL_MEMBERS: &str = "all";

/// Start time used for ordering when an event has none
pub const DEFAULT_START_TIME: &str = "00:00";

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// A single agenda entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO `YYYY-MM-DD`
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub member_id: String,
    #[serde(default)]
    pub category: EventCategory,
    #[serde(default)]
    pub is_reminder: bool,
    /// Milliseconds since epoch, stamped by the store
    #[serde(default)]
    pub updated_at: i64,
}

impl Event {
    pub fn new(title: impl Into<String>, date: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            description: None,
            date: date.into(),
            start_time: None,
            end_time: None,
            member_id: member_id.into(),
            category: EventCategory::default(),
            is_reminder: false,
            updated_at: 0,
        }
    }

    /// Start time for ordering, midnight when absent
    pub fn sort_time(&self) -> &str {
        self.start_time.as_deref().unwrap_or(DEFAULT_START_TIME)
    }

    /// Parsed calendar date, `None` when `date` is malformed
    pub fn naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).ok()
    }

    /// Check the event is well-formed enough to be stored
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(eyre!("Event title cannot be empty"));
        }
        if self.member_id.trim().is_empty() {
            return Err(eyre!("Event member id cannot be empty"));
        }
        parse_iso_date(&self.date)?;
        for time in [&self.start_time, &self.end_time].into_iter().flatten() {
            parse_hhmm(time)?;
        }
        Ok(())
    }
}

/// Parse a zero-padded `YYYY-MM-DD` date.
///
/// chrono accepts `2024-6-5` for `%Y-%m-%d`; only the padded form keeps
/// string order equal to calendar order, so anything else is rejected.
pub fn parse_iso_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .filter(|d| d.format(DATE_FORMAT).to_string() == s)
        .ok_or_else(|| eyre!("Invalid date '{}' (expected YYYY-MM-DD)", s))
}

/// Parse a zero-padded 24h `HH:MM` time
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .ok()
        .filter(|t| t.format(TIME_FORMAT).to_string() == s)
        .ok_or_else(|| eyre!("Invalid time '{}' (expected HH:MM)", s))
}

impl Record for Event {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "events"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("memberId".to_string(), IndexValue::String(self.member_id.clone()));
        fields.insert("date".to_string(), IndexValue::String(self.date.clone()));
        fields.insert("category".to_string(), IndexValue::String(self.category.to_string()));
        fields.insert("isReminder".to_string(), IndexValue::Bool(self.is_reminder));
        fields
    }
}

/// Closed set of event labels; the serialized form is the Spanish label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    #[serde(rename = "Salud")]
    Health,
    #[serde(rename = "Colegio")]
    School,
    #[serde(rename = "Ocio")]
    Leisure,
    #[serde(rename = "Trabajo")]
    Work,
    #[serde(rename = "Hogar")]
    Home,
    #[default]
    #[serde(rename = "Otro")]
    Other,
}

impl EventCategory {
    pub const ALL: [EventCategory; 6] = [
        EventCategory::Health,
        EventCategory::School,
        EventCategory::Leisure,
        EventCategory::Work,
        EventCategory::Home,
        EventCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EventCategory::Health => "Salud",
            EventCategory::School => "Colegio",
            EventCategory::Leisure => "Ocio",
            EventCategory::Work => "Trabajo",
            EventCategory::Home => "Hogar",
            EventCategory::Other => "Otro",
        }
    }

    fn english_name(self) -> &'static str {
        match self {
            EventCategory::Health => "health",
            EventCategory::School => "school",
            EventCategory::Leisure => "leisure",
            EventCategory::Work => "work",
            EventCategory::Home => "home",
            EventCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for EventCategory {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        EventCategory::ALL
            .into_iter()
            .find(|c| c.label().to_lowercase() == needle || c.english_name() == needle)
            .ok_or_else(|| eyre!("Unknown category: {}", s))
    }
}

/// A person events can be assigned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: String,
    pub name: String,
    /// Terminal color name used when rendering
    pub color: String,
    pub avatar: String,
}

impl FamilyMember {
    pub fn new(id: &str, name: &str, color: &str, avatar: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            avatar: avatar.to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == ALL_MEMBERS
    }
}

/// The sentinel "whole family" entry
pub fn everyone() -> FamilyMember {
    FamilyMember::new(
        ALL_MEMBERS,
        "Toda la Familia",
        "white",
        "https://picsum.photos/seed/family/100",
    )
}

/// Roster used when no configuration overrides it
pub fn default_members() -> Vec<FamilyMember> {
    vec![
        everyone(),
        FamilyMember::new("papa", "Papá", "blue", "https://picsum.photos/seed/papa/100"),
        FamilyMember::new("mama", "Mamá", "red", "https://picsum.photos/seed/mama/100"),
        FamilyMember::new("ahsoka", "Ahsoka", "yellow", "https://picsum.photos/seed/ahsoka/100"),
    ]
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
