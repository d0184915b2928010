// Application state and the controller driving it from store results

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::agenda::{self, TimeRange};
use crate::import::{EventImporter, EventParser};
use crate::models::{ALL_MEMBERS, Event};
use crate::store::EventStore;

/// Top-level screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Calendar,
    List,
    Import,
}

/// Everything the agenda screens render from.
///
/// Fields are read-only from outside; changes go through the transition
/// methods so the memoized visible list stays consistent.
#[derive(Debug, Clone)]
pub struct AppState {
    view: View,
    events: Vec<Event>,
    selected_member: String,
    time_range: TimeRange,
    search_query: String,
    loading: bool,
    selected_date: Option<String>,
    /// Bumped whenever `events` changes
    revision: u64,
    visible_cache: Option<(SelectionKey, Vec<Event>)>,
}

/// Inputs the visible list depends on
#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectionKey {
    revision: u64,
    member: String,
    query: String,
    range: TimeRange,
    today: NaiveDate,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(TimeRange::Day)
    }
}

impl AppState {
    pub fn new(time_range: TimeRange) -> Self {
        Self {
            view: View::Calendar,
            events: Vec::new(),
            selected_member: ALL_MEMBERS.to_string(),
            time_range,
            search_query: String::new(),
            loading: true,
            selected_date: None,
            revision: 0,
            visible_cache: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn selected_member(&self) -> &str {
        &self.selected_member
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Date whose day panel is open, if any
    pub fn selected_date(&self) -> Option<&str> {
        self.selected_date.as_deref()
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    /// Replace the whole collection with a fresh fetch
    pub fn finish_load(&mut self, events: Vec<Event>) {
        self.events = events;
        self.revision += 1;
        self.loading = false;
    }

    /// A fetch failed: keep what we had, stop the spinner
    pub fn load_failed(&mut self) {
        self.loading = false;
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn select_member(&mut self, member_id: &str) {
        self.selected_member = member_id.to_string();
    }

    pub fn set_query(&mut self, query: &str) {
        self.search_query = query.to_string();
    }

    pub fn set_time_range(&mut self, range: TimeRange) {
        self.time_range = range;
    }

    /// Drop an event locally; only call after the store confirmed the delete
    pub fn remove_event(&mut self, id: &str) {
        self.events.retain(|e| e.id != id);
        self.revision += 1;
    }

    /// A calendar day was picked.
    ///
    /// Opens the day panel when something is scheduled that day, otherwise
    /// jumps to the list searching for the date across all time.
    pub fn click_date(&mut self, date: &str) {
        if self.events.iter().any(|e| e.date == date) {
            self.selected_date = Some(date.to_string());
        } else {
            self.search_query = date.to_string();
            self.time_range = TimeRange::All;
            self.view = View::List;
        }
    }

    pub fn close_day(&mut self) {
        self.selected_date = None;
    }

    /// Events for the open day panel, in display order
    pub fn day_events(&self) -> Vec<&Event> {
        match &self.selected_date {
            Some(date) => agenda::events_on(&self.events, date),
            None => Vec::new(),
        }
    }

    /// "Show the whole agenda"
    pub fn reset_filters(&mut self) {
        self.time_range = TimeRange::All;
        self.selected_member = ALL_MEMBERS.to_string();
        self.search_query.clear();
    }

    /// Events to list for the current selection, memoized on its inputs
    pub fn visible_events(&mut self, now: NaiveDateTime) -> &[Event] {
        let key = self.selection_key(now.date());
        let fresh = matches!(&self.visible_cache, Some((cached, _)) if *cached == key);
        if !fresh {
            debug!(member = %self.selected_member, range = %self.time_range, "Recomputing visible events");
            let visible: Vec<Event> = agenda::select_visible_events(
                &self.events,
                &self.selected_member,
                &self.search_query,
                self.time_range,
                now,
            )
            .into_iter()
            .cloned()
            .collect();
            self.visible_cache = Some((key, visible));
        }
        match &self.visible_cache {
            Some((_, visible)) => visible.as_slice(),
            None => &[],
        }
    }

    fn selection_key(&self, today: NaiveDate) -> SelectionKey {
        SelectionKey {
            revision: self.revision,
            member: self.selected_member.clone(),
            query: self.search_query.clone(),
            range: self.time_range,
            today,
        }
    }
}

/// Drives `AppState` from user actions and store results.
///
/// Store errors are logged and otherwise swallowed; each method reports
/// whether the local state changed because of the operation.
pub struct App<S: EventStore> {
    store: S,
    state: AppState,
}

impl<S: EventStore> App<S> {
    pub fn new(store: S, default_range: TimeRange) -> Self {
        Self {
            store,
            state: AppState::new(default_range),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Reload the full collection from the store
    pub fn load(&mut self) -> bool {
        self.state.begin_load();
        match self.store.fetch_events() {
            Ok(events) => {
                debug!(count = events.len(), "Loaded events");
                self.state.finish_load(events);
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to load events");
                self.state.load_failed();
                false
            }
        }
    }

    /// Save one event and reload on success
    pub fn add_event(&mut self, event: Event) -> bool {
        match self.store.save_event(event) {
            Ok(true) => self.load(),
            Ok(false) => {
                warn!("Store did not save the event");
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to save event");
                false
            }
        }
    }

    /// Turn free text into an event via `parser` and save it
    pub fn submit_text<P: EventParser>(&mut self, parser: &P, text: &str) -> bool {
        match parser.parse(text) {
            Ok(Some(event)) => self.add_event(event),
            Ok(None) => {
                info!("Nothing to add from text input");
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to parse text input");
                false
            }
        }
    }

    /// Bulk-save everything `importer` yields, then show the list
    pub fn import<I: EventImporter>(&mut self, importer: &I) -> bool {
        let events = match importer.import() {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Failed to read import source");
                return false;
            }
        };
        let count = events.len();
        match self.store.save_bulk_events(events) {
            Ok(true) => {
                info!(count, "Import saved");
                self.load();
                self.state.set_view(View::List);
                true
            }
            Ok(false) => {
                warn!(count, "Store rejected the import");
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to save imported events");
                false
            }
        }
    }

    /// Delete remotely, then locally only if the store confirmed it
    pub fn delete(&mut self, id: &str) -> bool {
        match self.store.delete_event(id) {
            Ok(true) => {
                self.state.remove_event(id);
                true
            }
            Ok(false) => {
                warn!(id, "Store did not delete the event");
                false
            }
            Err(e) => {
                error!(id, error = %e, "Failed to delete event");
                false
            }
        }
    }
}
