// Selection of the events visible for a member, search text and time range

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{ALL_MEMBERS, DATE_FORMAT, Event};

/// Date window of the visible agenda
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    /// Today only
    #[default]
    Day,
    /// This week and next, Monday to Sunday
    Week,
    /// This calendar month and next
    Month,
    /// This calendar year
    Year,
    /// No date restriction
    All,
}

impl TimeRange {
    pub fn label(self) -> &'static str {
        match self {
            TimeRange::Day => "Hoy",
            TimeRange::Week => "Esta + Próxima Semana",
            TimeRange::Month => "Este + Próximo Mes",
            TimeRange::Year => "Este Año",
            TimeRange::All => "Todo",
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
            TimeRange::All => "all",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TimeRange {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "day" => Ok(TimeRange::Day),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "year" => Ok(TimeRange::Year),
            "all" => Ok(TimeRange::All),
            other => Err(eyre!("Unknown time range: {} (expected day|week|month|year|all)", other)),
        }
    }
}

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Monday of the current week through Sunday of the next one (14 days)
pub fn week_window(today: NaiveDate) -> DateWindow {
    // Sunday counts as the last day of its week
    let start = today - Days::new(u64::from(today.weekday().num_days_from_monday()));
    DateWindow {
        start,
        end: start + Days::new(13),
    }
}

/// First day of the current month through the last day of the next one
pub fn month_window(today: NaiveDate) -> DateWindow {
    let start = today.with_day(1).unwrap_or(today);
    let end = start
        .checked_add_months(Months::new(2))
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    DateWindow { start, end }
}

pub fn matches_member(event: &Event, member_id: &str) -> bool {
    member_id == ALL_MEMBERS || event.member_id == member_id
}

/// Case-insensitive substring test on the title; empty query matches all
pub fn matches_search(event: &Event, query: &str) -> bool {
    event.title.to_lowercase().contains(&query.to_lowercase())
}

/// Whether the event date falls in `range` relative to `today`.
///
/// Day and year compare the ISO string directly; week and month parse the
/// date, so a malformed date never matches those two.
pub fn matches_time(event: &Event, range: TimeRange, today: NaiveDate) -> bool {
    match range {
        TimeRange::Day => event.date == today.format(DATE_FORMAT).to_string(),
        TimeRange::Week => event.naive_date().is_some_and(|d| week_window(today).contains(d)),
        TimeRange::Month => event.naive_date().is_some_and(|d| month_window(today).contains(d)),
        TimeRange::Year => event.date.split('-').next() == Some(format!("{:04}", today.year()).as_str()),
        TimeRange::All => true,
    }
}

/// Ordered subset of `events` to display.
///
/// Keeps events passing the member, search and time predicates, then sorts
/// them by `(date, startTime)` ascending with a missing start time read as
/// `00:00`. The sort is stable, so ties keep input order.
pub fn select_visible_events<'a>(
    events: &'a [Event],
    member_id: &str,
    query: &str,
    range: TimeRange,
    now: NaiveDateTime,
) -> Vec<&'a Event> {
    let today = now.date();
    let mut visible: Vec<&Event> = events
        .iter()
        .filter(|e| matches_member(e, member_id) && matches_search(e, query) && matches_time(e, range, today))
        .collect();
    sort_events(&mut visible);
    visible
}

/// Events dated exactly `date`, in display order
pub fn events_on<'a>(events: &'a [Event], date: &str) -> Vec<&'a Event> {
    let mut day: Vec<&Event> = events.iter().filter(|e| e.date == date).collect();
    sort_events(&mut day);
    day
}

pub fn sort_events(events: &mut [&Event]) {
    events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.sort_time().cmp(b.sort_time())));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        date(s).and_hms_opt(17, 45, 0).unwrap()
    }

    fn event(id: &str, title: &str, day: &str, member: &str) -> Event {
        let mut event = Event::new(title, day, member);
        event.id = id.to_string();
        event
    }

    fn ids(events: &[&Event]) -> Vec<String> {
        events.iter().map(|e| e.id.clone()).collect()
    }

    fn sample() -> Vec<Event> {
        let mut swim = event("swim", "Piscina", "2024-06-15", "ahsoka");
        swim.start_time = Some("18:00".to_string());
        let mut dentist = event("dentist", "Dentist Visit", "2024-06-15", "mama");
        dentist.start_time = Some("09:30".to_string());
        vec![
            event("later", "Reunión de padres", "2024-07-02", "papa"),
            swim,
            event("allday", "Mercadillo", "2024-06-15", "papa"),
            dentist,
            event("before", "Compra", "2024-06-14", "mama"),
        ]
    }

    #[test]
    fn test_week_window_on_sunday() {
        let window = week_window(date("2024-06-16"));
        assert_eq!(window.start, date("2024-06-10"));
        assert_eq!(window.end, date("2024-06-23"));
    }

    #[test]
    fn test_week_window_midweek_and_monday() {
        let window = week_window(date("2024-06-12"));
        assert_eq!(window.start, date("2024-06-10"));
        assert_eq!(window.end, date("2024-06-23"));

        let window = week_window(date("2024-06-10"));
        assert_eq!(window.start, date("2024-06-10"));
    }

    #[test]
    fn test_week_window_across_year_end() {
        let window = week_window(date("2025-01-01"));
        assert_eq!(window.start, date("2024-12-30"));
        assert_eq!(window.end, date("2025-01-12"));
    }

    #[test]
    fn test_month_window() {
        let window = month_window(date("2024-06-15"));
        assert_eq!(window.start, date("2024-06-01"));
        assert_eq!(window.end, date("2024-07-31"));
    }

    #[test]
    fn test_month_window_wraps_year_and_leap_february() {
        let window = month_window(date("2023-12-31"));
        assert_eq!(window.start, date("2023-12-01"));
        assert_eq!(window.end, date("2024-01-31"));

        let window = month_window(date("2024-01-31"));
        assert_eq!(window.end, date("2024-02-29"));
    }

    #[test]
    fn test_day_range() {
        let events = vec![
            event("a", "Today", "2024-06-15", "papa"),
            event("b", "Yesterday", "2024-06-14", "papa"),
            event("c", "Tomorrow", "2024-06-16", "papa"),
        ];
        let visible = select_visible_events(&events, ALL_MEMBERS, "", TimeRange::Day, at("2024-06-15"));
        assert_eq!(ids(&visible), vec!["a"]);
    }

    #[test]
    fn test_week_range_boundaries() {
        let events = vec![
            event("before", "x", "2024-06-09", "papa"),
            event("first", "x", "2024-06-10", "papa"),
            event("last", "x", "2024-06-23", "papa"),
            event("after", "x", "2024-06-24", "papa"),
        ];
        let visible = select_visible_events(&events, ALL_MEMBERS, "", TimeRange::Week, at("2024-06-16"));
        assert_eq!(ids(&visible), vec!["first", "last"]);
    }

    #[test]
    fn test_month_range_boundaries() {
        let events = vec![
            event("may", "x", "2024-05-31", "papa"),
            event("june", "x", "2024-06-01", "papa"),
            event("july", "x", "2024-07-31", "papa"),
            event("august", "x", "2024-08-01", "papa"),
        ];
        let visible = select_visible_events(&events, ALL_MEMBERS, "", TimeRange::Month, at("2024-06-15"));
        assert_eq!(ids(&visible), vec!["june", "july"]);
    }

    #[test]
    fn test_year_range() {
        let events = vec![
            event("old", "x", "2023-12-31", "papa"),
            event("jan", "x", "2024-01-01", "papa"),
            event("dec", "x", "2024-12-31", "papa"),
            event("next", "x", "2025-01-01", "papa"),
        ];
        let visible = select_visible_events(&events, ALL_MEMBERS, "", TimeRange::Year, at("2024-06-15"));
        assert_eq!(ids(&visible), vec!["jan", "dec"]);
    }

    #[test]
    fn test_malformed_date_never_in_week_or_month() {
        let events = vec![event("bad", "x", "15/06/2024", "papa")];
        let now = at("2024-06-15");
        assert!(select_visible_events(&events, ALL_MEMBERS, "", TimeRange::Week, now).is_empty());
        assert!(select_visible_events(&events, ALL_MEMBERS, "", TimeRange::Month, now).is_empty());
        assert_eq!(select_visible_events(&events, ALL_MEMBERS, "", TimeRange::All, now).len(), 1);
    }

    #[test]
    fn test_all_range_keeps_every_event_sorted() {
        let events = sample();
        let visible = select_visible_events(&events, ALL_MEMBERS, "", TimeRange::All, at("2024-06-15"));
        assert_eq!(ids(&visible), vec!["before", "allday", "dentist", "swim", "later"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let events = vec![
            event("first", "x", "2024-06-15", "papa"),
            event("second", "y", "2024-06-15", "mama"),
        ];
        let visible = select_visible_events(&events, ALL_MEMBERS, "", TimeRange::All, at("2024-06-15"));
        assert_eq!(ids(&visible), vec!["first", "second"]);
    }

    #[test]
    fn test_member_filter_is_exact() {
        let events = sample();
        let visible = select_visible_events(&events, "mama", "", TimeRange::All, at("2024-06-15"));
        assert_eq!(ids(&visible), vec!["before", "dentist"]);
        assert!(visible.iter().all(|e| e.member_id == "mama"));
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let events = sample();
        let now = at("2024-06-15");
        for query in ["dentist", "DENTIST", "ist vis"] {
            let visible = select_visible_events(&events, ALL_MEMBERS, query, TimeRange::All, now);
            assert_eq!(ids(&visible), vec!["dentist"], "query {:?}", query);
        }
        let visible = select_visible_events(&events, ALL_MEMBERS, "dentista", TimeRange::All, now);
        assert!(visible.is_empty());
    }

    #[test]
    fn test_predicates_combine() {
        let events = sample();
        let visible = select_visible_events(&events, "ahsoka", "pisc", TimeRange::Day, at("2024-06-15"));
        assert_eq!(ids(&visible), vec!["swim"]);
        let visible = select_visible_events(&events, "papa", "pisc", TimeRange::Day, at("2024-06-15"));
        assert!(visible.is_empty());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let events = sample();
        let now = at("2024-06-15");
        let first = ids(&select_visible_events(&events, ALL_MEMBERS, "", TimeRange::Month, now));
        let second = ids(&select_visible_events(&events, ALL_MEMBERS, "", TimeRange::Month, now));
        assert_eq!(first, second);
    }

    #[test]
    fn test_events_on_date() {
        let events = sample();
        assert_eq!(ids(&events_on(&events, "2024-06-15")), vec!["allday", "dentist", "swim"]);
        assert!(events_on(&events, "2024-06-20").is_empty());
    }

    #[test]
    fn test_time_range_parse_and_display() {
        for range in [TimeRange::Day, TimeRange::Week, TimeRange::Month, TimeRange::Year, TimeRange::All] {
            assert_eq!(range.to_string().parse::<TimeRange>().unwrap(), range);
        }
        assert!("fortnight".parse::<TimeRange>().is_err());
        assert_eq!(TimeRange::default(), TimeRange::Day);
    }
}
