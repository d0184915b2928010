// famcal - Family agenda with a JSONL+SQLite event store

pub mod agenda;
pub mod app;
pub mod config;
pub mod filter;
pub mod import;
pub mod jsonl;
pub mod models;
pub mod record;
pub mod store;

// Re-export main types for convenience
pub use agenda::{DateWindow, TimeRange, select_visible_events};
pub use app::{App, AppState, View};
pub use config::Config;
pub use filter::Filter;
pub use import::{EventImporter, EventParser, FileImporter, ImportFormat};
pub use models::{ALL_MEMBERS, Event, EventCategory, FamilyMember, now_ms};
pub use record::{IndexValue, Record};
pub use store::{EventStore, Store};
